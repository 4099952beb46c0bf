//! Bi-temporal stamping, invalidation, and point-in-time queries (C4).

pub mod engine;
pub mod event_log;
pub mod stamp;

pub use engine::{CollectionKind, TemporalEngine};
pub use stamp::stamp_new;
