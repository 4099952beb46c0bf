mod community;
mod compaction;
mod confidence;
mod contradiction;
mod document;
mod entity;
mod episode;
mod memory;
mod message;
mod relationship;
mod search;
mod temporal;

pub use compaction::CompactionRecord;
pub use confidence::{reinforce, Confidence};
pub use contradiction::{
    ContradictionAction, ContradictionLogEntry, ContradictionSummary, ResolutionPolicy,
};
pub use document::Document;
pub use entity::{Entity, MAX_ENTITY_FIELD_LEN};
pub use episode::{CloseOutcome, Episode};
pub use memory::Memory;
pub use message::{Message, Role};
pub use relationship::{
    base_weight_for_category, Relationship, ReviewStatus, WeightCategory,
    AUTO_APPROVE_CONFIDENCE_FLOOR, DEFAULT_BASE_WEIGHT, MIN_RATIONALE_LEN,
};
pub use search::{
    Engine, FilterPredicate, FuzzyFilter, QueryPreset, RerankStrategy, SearchEnvelope,
    SearchHit, TagMode, ViewPolicy,
};
pub use community::Community;
pub use temporal::TemporalStamp;
