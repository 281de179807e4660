use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a repository's plugin count.
///
/// Serialized as one JSON object per line in the history log. Unknown
/// fields are ignored on read so newer writers can add fields without
/// breaking older readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSample {
    pub repository_name: String,
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

impl CountSample {
    /// Creates a sample, truncating `timestamp` to whole seconds.
    pub fn new(repository_name: impl Into<String>, timestamp: DateTime<Utc>, count: u64) -> Self {
        Self {
            repository_name: repository_name.into(),
            timestamp: timestamp.trunc_subsecs(0),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_truncates_subseconds() {
        let ts = Utc.timestamp_opt(1_760_000_000, 999_000_000).unwrap();
        let sample = CountSample::new("community", ts, 120);
        assert_eq!(sample.timestamp.timestamp_subsec_nanos(), 0);
        assert_eq!(sample.timestamp.timestamp(), 1_760_000_000);
    }

    #[test]
    fn serializes_as_flat_object() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let sample = CountSample::new("community", ts, 120);
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"repository_name":"community","timestamp":"2026-10-16T08:00:00Z","count":120}"#
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"repository_name":"official","timestamp":"2026-10-16T08:00:00Z","count":7,"host":"runner-3"}"#;
        let sample: CountSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.repository_name, "official");
        assert_eq!(sample.count, 7);
    }
}
