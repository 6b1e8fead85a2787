pub mod client;
pub mod config;
pub mod error;
pub mod schedule;

pub use client::TransitClient;
pub use config::{Labels, NormalizerConfig};
pub use error::{ConfigError, EntryError, FetchError, ScheduleError};
pub use schedule::{ArrivalEntry, ArrivalState, ScheduleNormalizer, ScheduledStop, TimeFormat};
