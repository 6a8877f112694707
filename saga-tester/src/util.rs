pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Durations serialize as whole milliseconds.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" smoke, ,help-budget,  reload ");
        assert_eq!(parts, vec!["smoke", "help-budget", "reload"]);
    }

    #[derive(Serialize, Deserialize)]
    struct Timed {
        #[serde(with = "duration_serde")]
        took: Duration,
    }

    #[test]
    fn durations_are_written_as_millis() {
        let text = serde_json::to_string(&Timed {
            took: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(text, r#"{"took":1500}"#);
        let back: Timed = serde_json::from_str(&text).unwrap();
        assert_eq!(back.took, Duration::from_millis(1500));
    }
}
