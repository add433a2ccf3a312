use serde::{Deserialize, Serialize};

/// Optional history filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageFilters {
    /// Calendar day, `YYYY-MM-DD`.
    pub day: Option<String>,
    pub classification: Option<String>,
}

impl PageFilters {
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.classification.is_none()
    }
}

/// A paged history query. Each distinct query is its own cache scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub subject_id: String,
    #[serde(default)]
    pub filters: PageFilters,
}

impl HistoryQuery {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            filters: PageFilters::default(),
        }
    }

    pub fn with_day(mut self, day: impl Into<String>) -> Self {
        self.filters.day = Some(day.into());
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.filters.classification = Some(classification.into());
        self
    }

    /// Cache scope: the subject alone, or the subject followed by each
    /// filter that is set.
    pub fn scope_key(&self) -> String {
        let mut key = self.subject_id.clone();
        if let Some(day) = &self.filters.day {
            key.push_str("|day=");
            key.push_str(day);
        }
        if let Some(class) = &self.filters.classification {
            key.push_str("|class=");
            key.push_str(class);
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_scope_is_subject() {
        assert_eq!(HistoryQuery::new("user7").scope_key(), "user7");
    }

    #[test]
    fn filtered_scopes_are_distinct() {
        let day = HistoryQuery::new("user7").with_day("2024-05-01");
        let both = day.clone().with_classification("Normal");
        assert_eq!(day.scope_key(), "user7|day=2024-05-01");
        assert_eq!(both.scope_key(), "user7|day=2024-05-01|class=Normal");
        assert_eq!(
            HistoryQuery::new("user7").with_classification("AFib").scope_key(),
            "user7|class=AFib"
        );
    }
}
