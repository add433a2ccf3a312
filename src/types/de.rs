//! Lenient field decoders for service payloads.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
}

/// Accept an identifier sent either as a JSON string or as an integer.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Integer(value) => value.to_string(),
    })
}

/// Optional variant of [`string_or_number`]; pair with `#[serde(default)]`.
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(value) => value,
            StringOrNumber::Integer(value) => value.to_string(),
        }),
    )
}
