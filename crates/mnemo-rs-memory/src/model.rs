//! Record, query, and result models shared by every backend.

use crate::error::MemoryError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use uuid::Uuid;

/// Lowest allowed importance value.
pub const IMPORTANCE_MIN: u8 = 1;
/// Highest allowed importance value.
pub const IMPORTANCE_MAX: u8 = 10;

/// Durable unit of memory.
///
/// A record without an embedding is degraded: it is searchable only through
/// metadata filters and is never returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier, assigned at creation, immutable.
    pub id: Uuid,
    /// Text payload.
    pub content: String,
    /// Fixed-dimension embedding; absent when embedding failed.
    pub embedding: Option<Vec<f32>>,
    /// Semantic tags and scoring metadata.
    pub metadata: MemoryMetadata,
    /// Adapter holding the authoritative durable copy.
    pub origin_backend: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Build a new record with a fresh id and the current timestamp.
    pub fn new(
        content: impl Into<String>,
        metadata: MemoryMetadata,
        embedding: Option<Vec<f32>>,
        origin_backend: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            embedding,
            metadata: metadata.clamped(),
            origin_backend: origin_backend.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the record lacks an embedding.
    pub fn is_degraded(&self) -> bool {
        self.embedding.is_none()
    }
}

/// Metadata attached to a record, usable as filter predicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetadata {
    /// Optional category label.
    #[serde(default)]
    pub category: Option<String>,
    /// Importance from 1 (lowest) to 10 (highest).
    #[serde(default = "default_importance")]
    pub importance: u8,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Optional owner identifier.
    #[serde(default)]
    pub owner: Option<String>,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self {
            category: None,
            importance: default_importance(),
            tags: BTreeSet::new(),
            owner: None,
        }
    }
}

/// Default importance when none is supplied.
fn default_importance() -> u8 {
    IMPORTANCE_MIN
}

impl MemoryMetadata {
    /// Return a copy with importance clamped into the valid range.
    pub fn clamped(mut self) -> Self {
        self.importance = self.importance.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX);
        self
    }

    /// Check this metadata against an exact-match filter set.
    ///
    /// Scalar keys (`category`, `owner`, `importance`) match when any of the
    /// required values matches; `tags` requires every listed tag to be
    /// present. Unknown keys never match.
    pub fn matches(&self, filters: &MetadataFilters) -> bool {
        filters.iter().all(|(key, value)| match key.as_str() {
            "category" => match &self.category {
                Some(category) => value.values().any(|v| v == category),
                None => false,
            },
            "owner" => match &self.owner {
                Some(owner) => value.values().any(|v| v == owner),
                None => false,
            },
            "importance" => {
                let importance = self.importance.to_string();
                value.values().any(|v| *v == importance)
            }
            "tags" => value.values().all(|v| self.tags.contains(v)),
            _ => false,
        })
    }
}

/// One-or-many required values for a single filter key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// A single required value.
    One(String),
    /// Alternative values for scalar keys; conjunctive for `tags`.
    Many(Vec<String>),
}

impl FilterValue {
    /// Iterate the required values regardless of arity.
    pub fn values(&self) -> impl Iterator<Item = &String> {
        match self {
            FilterValue::One(value) => std::slice::from_ref(value).iter(),
            FilterValue::Many(values) => values.iter(),
        }
    }
}

/// Exact-match metadata predicates keyed by metadata field name.
pub type MetadataFilters = BTreeMap<String, FilterValue>;

/// Similarity retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Text to embed into a query vector.
    #[serde(default)]
    pub query_text: Option<String>,
    /// Pre-computed query vector; mutually exclusive with `query_text`.
    #[serde(default)]
    pub query_embedding: Option<Vec<f32>>,
    /// Result count ceiling.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity score; candidates strictly below are excluded.
    #[serde(default)]
    pub similarity_threshold: f32,
    /// Metadata predicates applied before ranking.
    #[serde(default)]
    pub filters: MetadataFilters,
}

/// Default result count ceiling.
fn default_top_k() -> usize {
    10
}

impl SearchQuery {
    /// Build a text query with default limits.
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query_text: Some(query.into()),
            query_embedding: None,
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            filters: MetadataFilters::new(),
        }
    }

    /// Build a query from a pre-computed embedding.
    pub fn embedding(embedding: Vec<f32>) -> Self {
        Self {
            query_text: None,
            query_embedding: Some(embedding),
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            filters: MetadataFilters::new(),
        }
    }

    /// Build a metadata-only query served by the durable store scan.
    pub fn filters_only(filters: MetadataFilters) -> Self {
        Self {
            query_text: None,
            query_embedding: None,
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            filters,
        }
    }

    /// Set the result count ceiling.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Add a filter predicate.
    pub fn with_filter(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    /// Reject malformed queries before any backend call is made.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.query_text.is_some() && self.query_embedding.is_some() {
            return Err(MemoryError::InvalidQuery(
                "query_text and query_embedding are mutually exclusive".to_string(),
            ));
        }
        if self.query_text.is_none() && self.query_embedding.is_none() && self.filters.is_empty() {
            return Err(MemoryError::InvalidQuery(
                "one of query_text, query_embedding, or filters is required".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(MemoryError::InvalidQuery(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(MemoryError::InvalidQuery(
                "similarity_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single ranked search hit.
///
/// `similarity_score` is `None` when no similarity was computed (metadata
/// fallback), which is distinct from a score of exactly zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Matched record id.
    pub record_id: Uuid,
    /// Record content.
    pub content: String,
    /// Similarity in [0, 1]; absent for unscored fallback results.
    pub similarity_score: Option<f32>,
    /// Record metadata.
    pub metadata: MemoryMetadata,
    /// Record creation timestamp, used for recency tie-breaks.
    pub created_at: DateTime<Utc>,
}

impl SearchResult {
    /// Build a scored result from a vector-store candidate.
    pub fn scored(candidate: ScoredCandidate) -> Self {
        Self {
            record_id: candidate.record_id,
            content: candidate.content,
            similarity_score: Some(candidate.similarity_score),
            metadata: candidate.metadata,
            created_at: candidate.created_at,
        }
    }

    /// Build an unscored result from a durable-store record.
    pub fn unscored(record: MemoryRecord) -> Self {
        Self {
            record_id: record.id,
            content: record.content,
            similarity_score: None,
            metadata: record.metadata,
            created_at: record.created_at,
        }
    }
}

/// Search results plus the explicit partial-result marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOutcome {
    /// Ranked results, non-increasing by similarity score.
    pub results: Vec<SearchResult>,
    /// Whether the caller deadline expired before every backend answered.
    pub deadline_exceeded: bool,
}

/// A nearest-neighbor hit returned by a vector adapter.
///
/// Content and metadata ride along as opaque payload; the vector store never
/// interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Record id the vector belongs to.
    pub record_id: Uuid,
    /// Similarity in [0, 1].
    pub similarity_score: f32,
    /// Opaque content payload.
    pub content: String,
    /// Opaque metadata payload.
    pub metadata: MemoryMetadata,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Ephemeral cache entry; may vanish at any time without being data loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Cached value blob.
    pub value: serde_json::Value,
    /// Instant after which the entry reads as absent.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry expiring `ttl` from now.
    pub fn new(value: serde_json::Value, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            value,
            expires_at: Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterValue, MemoryMetadata, MemoryRecord, MetadataFilters, SearchQuery};
    use crate::error::MemoryError;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn metadata(category: &str, importance: u8, tags: &[&str]) -> MemoryMetadata {
        MemoryMetadata {
            category: Some(category.to_string()),
            importance,
            tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
            owner: Some("user-1".to_string()),
        }
    }

    #[test]
    fn filters_match_scalar_any_of() {
        let meta = metadata("pref", 8, &["lang"]);
        let mut filters = MetadataFilters::new();
        filters.insert(
            "category".to_string(),
            FilterValue::Many(vec!["pref".to_string(), "fact".to_string()]),
        );
        assert!(meta.matches(&filters));

        filters.insert("owner".to_string(), FilterValue::One("user-2".to_string()));
        assert!(!meta.matches(&filters));
    }

    #[test]
    fn filters_require_all_tags() {
        let meta = metadata("pref", 8, &["lang", "fast"]);
        let mut filters = MetadataFilters::new();
        filters.insert(
            "tags".to_string(),
            FilterValue::Many(vec!["lang".to_string(), "fast".to_string()]),
        );
        assert!(meta.matches(&filters));

        filters.insert(
            "tags".to_string(),
            FilterValue::Many(vec!["lang".to_string(), "missing".to_string()]),
        );
        assert!(!meta.matches(&filters));
    }

    #[test]
    fn filters_match_importance_as_string() {
        let meta = metadata("pref", 8, &[]);
        let mut filters = MetadataFilters::new();
        filters.insert("importance".to_string(), FilterValue::One("8".to_string()));
        assert!(meta.matches(&filters));
    }

    #[test]
    fn unknown_filter_key_never_matches() {
        let meta = metadata("pref", 8, &[]);
        let mut filters = MetadataFilters::new();
        filters.insert("color".to_string(), FilterValue::One("blue".to_string()));
        assert!(!meta.matches(&filters));
    }

    #[test]
    fn record_clamps_importance() {
        let record = MemoryRecord::new(
            "hello",
            MemoryMetadata {
                importance: 42,
                ..MemoryMetadata::default()
            },
            None,
            "sqlite",
        );
        assert_eq!(record.metadata.importance, 10);
        assert!(record.is_degraded());
    }

    #[test]
    fn query_validation_rejects_bad_input() {
        let err = SearchQuery::text("x")
            .with_top_k(0)
            .validate()
            .expect_err("zero top_k");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));

        let mut both = SearchQuery::text("x");
        both.query_embedding = Some(vec![0.0]);
        assert!(matches!(
            both.validate(),
            Err(MemoryError::InvalidQuery(_))
        ));

        let neither = SearchQuery::filters_only(MetadataFilters::new());
        assert!(matches!(
            neither.validate(),
            Err(MemoryError::InvalidQuery(_))
        ));

        let err = SearchQuery::text("x")
            .with_threshold(1.5)
            .validate()
            .expect_err("threshold range");
        assert!(matches!(err, MemoryError::InvalidQuery(_)));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let meta = metadata("pref", 8, &["lang"]);
        let json = serde_json::to_string(&meta).expect("serialize");
        let back: MemoryMetadata = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(meta, back);
    }
}
