use super::{CompactionRecord, Entity, Memory, Message, Relationship};

/// Duck-typed "search result" unified into one sum type (§9): every search
/// method returns hits whose `doc` is one of these variants rather than a
/// dynamically-shaped map.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind")]
pub enum Document {
    Message(Message),
    Memory(Memory),
    Entity(Entity),
    Relationship(Relationship),
    Compaction(CompactionRecord),
}

impl Document {
    /// The underlying record's storage key, used to identify "the same
    /// document" across independently-fetched search hits regardless of
    /// mutable fields like timestamps.
    pub fn key(&self) -> Option<&str> {
        match self {
            Document::Message(m) => m.key.as_deref(),
            Document::Memory(m) => m.key.as_deref(),
            Document::Entity(e) => e.key.as_deref(),
            Document::Relationship(r) => r.key.as_deref(),
            Document::Compaction(c) => c.key.as_deref(),
        }
    }
}
