//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (the five closed memory categories), [`Memory`] (a full
//! record as stored and returned over the API), and [`NewMemory`] (store input).

use serde::{Deserialize, Serialize};

/// Longest content accepted at the API boundary, in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Default and maximum number of results for a recall.
pub const DEFAULT_RECALL_LIMIT: usize = 10;
pub const MAX_RECALL_LIMIT: usize = 100;

/// Importance assigned when the caller does not provide one.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// The closed set of memory categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Standalone facts. The default.
    #[default]
    Factual,
    /// Preferences and relationships between people and things.
    Relational,
    /// Workflows and how-to knowledge.
    Procedural,
    /// Events and session logs.
    Episodic,
    /// General knowledge and concepts.
    Semantic,
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        Self::Factual,
        Self::Relational,
        Self::Procedural,
        Self::Episodic,
        Self::Semantic,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Relational => "relational",
            Self::Procedural => "procedural",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "factual" => Ok(Self::Factual),
            "relational" => Ok(Self::Relational),
            "procedural" => Ok(Self::Procedural),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// UUID v7 primary key.
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Caller-assigned weight in `[0.0, 1.0]`. Never changed after creation.
    pub importance: f64,
    /// Recency/frequency weight in `[0.0, 1.0]`. Boosted on recall, decayed on consolidate.
    pub activation: f64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last recall, or `None` if never recalled.
    pub last_accessed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Input to [`crate::memory::store::store_memory`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: f64,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NewMemory {
    /// A factual memory with default importance and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type: MemoryType::default(),
            importance: DEFAULT_IMPORTANCE,
            metadata: None,
        }
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }
}
