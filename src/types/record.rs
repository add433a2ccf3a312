use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One cached history entry.
///
/// `id` is unique across cache and remote. Records are presented newest
/// first by the instant `timestamp` denotes, ties broken by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub timestamp: String,
    pub classification: String,
    #[serde(default, alias = "heartRate", alias = "heart_rate")]
    pub measurement: Option<f64>,
}

impl Record {
    /// Ordering key: UTC epoch milliseconds. Unparseable timestamps sort last.
    pub fn sort_key(&self) -> i64 {
        timestamp_millis(&self.timestamp).unwrap_or(i64::MIN)
    }
}

/// Parse an ISO-8601 timestamp into UTC epoch milliseconds.
///
/// Any offset and any fractional precision are accepted. A timestamp
/// without an offset, with `T` or a space between date and time, is read
/// as UTC.
pub fn timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// A single reading with its raw samples, fetched on demand and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingDetail {
    pub id: i64,
    pub timestamp: String,
    pub classification: String,
    #[serde(default, alias = "heartRate", alias = "heart_rate")]
    pub measurement: Option<f64>,
    #[serde(default)]
    pub ecg_data: Vec<f64>,
}

/// One monitored person on the dashboard: the signed-in user ("self") or a
/// correlative whose readings they follow.
///
/// The service supplies `device_id` directly; it is never derived from the
/// display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "super::de::string_or_number")]
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(
        default,
        alias = "device_id_str",
        alias = "deviceId",
        deserialize_with = "super::de::opt_string_or_number"
    )]
    pub device_id: Option<String>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "super::de::string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The signed-in user with the people monitoring them and the people they monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserProfile,
    #[serde(default, rename = "correlatives_who_monitor_me")]
    pub monitored_by: Vec<UserProfile>,
    #[serde(default, rename = "patients_i_monitor")]
    pub patients: Vec<UserProfile>,
}
