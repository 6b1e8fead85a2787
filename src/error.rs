use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("schedule payload has no \"stop-schedule\" object")]
    MissingStopSchedule,

    #[error("schedule payload is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stop {stop} returned status {status}")]
    Status {
        stop: String,
        status: reqwest::StatusCode,
    },
}

/// Why a single scheduled-stop record was left out of a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("unparseable {field} timestamp {value:?}")]
    BadTimestamp { field: &'static str, value: String },

    #[error("unrecognized cancelled flag {0:?}")]
    BadCancelledFlag(String),

    #[error("malformed entry: {0}")]
    Malformed(String),
}
