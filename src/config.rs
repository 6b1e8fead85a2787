use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::schedule::ArrivalState;

/// Thresholds and labels the normalizer works with. Nothing in `schedule`
/// reads a tunable from anywhere else.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// How far past its estimated time a departure still shows as "Due".
    pub due_grace_minutes: i64,
    /// Upper bound for rendering a departure as a countdown.
    pub next_bus_window_minutes: i64,
    pub labels: Labels,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            due_grace_minutes: 1,
            next_bus_window_minutes: 15,
            labels: Labels::default(),
        }
    }
}

impl NormalizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Labels {
    pub ok: String,
    pub late: String,
    pub early: String,
    pub cancelled: String,
    pub due: String,
    pub am: String,
    pub pm: String,
    pub minutes: String,
    pub ago: String,
    /// Joins the four fields of a flattened arrival row.
    pub separator: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            ok: "Ok".to_string(),
            late: "Late".to_string(),
            early: "Early".to_string(),
            cancelled: "Cancelled".to_string(),
            due: "Due".to_string(),
            am: "AM".to_string(),
            pm: "PM".to_string(),
            minutes: "min.".to_string(),
            ago: "ago".to_string(),
            separator: "----".to_string(),
        }
    }
}

impl Labels {
    pub fn state(&self, state: ArrivalState) -> &str {
        match state {
            ArrivalState::Ok => &self.ok,
            ArrivalState::Late => &self.late,
            ArrivalState::Early => &self.early,
            ArrivalState::Cancelled => &self.cancelled,
        }
    }

    pub fn parse_state(&self, label: &str) -> Option<ArrivalState> {
        [
            ArrivalState::Ok,
            ArrivalState::Late,
            ArrivalState::Early,
            ArrivalState::Cancelled,
        ]
        .into_iter()
        .find(|&state| self.state(state) == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NormalizerConfig::from_json_str(r#"{ "due_grace_minutes": 3 }"#).unwrap();
        assert_eq!(config.due_grace_minutes, 3);
        assert_eq!(config.next_bus_window_minutes, 15);
        assert_eq!(config.labels, Labels::default());
    }

    #[test]
    fn nested_labels_override_individually() {
        let config =
            NormalizerConfig::from_json_str(r#"{ "labels": { "due": "Now", "separator": "|" } }"#)
                .unwrap();
        assert_eq!(config.labels.due, "Now");
        assert_eq!(config.labels.separator, "|");
        assert_eq!(config.labels.am, "AM");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = NormalizerConfig::from_json_str(r#"{ "grace": 3 }"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = NormalizerConfig::load("/nonexistent/stop-schedule.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stop-schedule.json"));
    }

    #[test]
    fn state_labels_round_trip() {
        let labels = Labels::default();
        assert_eq!(labels.state(ArrivalState::Late), "Late");
        assert_eq!(labels.parse_state("Early"), Some(ArrivalState::Early));
        assert_eq!(labels.parse_state("Delayed"), None);
    }
}
