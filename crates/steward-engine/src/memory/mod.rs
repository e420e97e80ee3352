//! Memory engine: CRUD over project memories with deduplication, tagging,
//! clustering, decay and protected categories.

mod cleanup;
mod similarity;
mod tagging;

pub use similarity::{SimilarityScorer, TokenJaccard};
pub use tagging::auto_tags;

use crate::{EngineError, MemoryPolicy, Outcome, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use similarity::tokenize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use steward_store::{Concern, ProjectScope, StateStore};
use tagging::normalize_tags;
use uuid::Uuid;

/// Upper bound of the relevance scale.
pub const MAX_RELEVANCE: u8 = 10;

/// Relevance of rules added without an explicit value.
const RULE_RELEVANCE: u8 = 9;

/// Memories returned by [`MemoryEngine::recent`] without a limit.
const RECENT_LIMIT: usize = 10;

/// Memory classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Rule,
    Mistake,
    Discovery,
    Context,
}

impl Category {
    /// Protected categories are never decayed or deleted by cleanup.
    pub fn is_protected(&self) -> bool {
        matches!(self, Category::Rule | Category::Mistake)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Rule => "rule",
            Category::Mistake => "mistake",
            Category::Discovery => "discovery",
            Category::Context => "context",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rule" => Ok(Category::Rule),
            "mistake" => Ok(Category::Mistake),
            "discovery" => Ok(Category::Discovery),
            "context" => Ok(Category::Context),
            other => Err(EngineError::validation(format!(
                "unrecognized category '{}' (expected rule, mistake, discovery or context)",
                other
            ))),
        }
    }
}

/// A remembered fact, mistake, decision or rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub relevance: u8,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    /// Decay steps already applied for the current period of disuse
    #[serde(default)]
    pub decay_steps: u32,
    /// Times the memory was returned by search or edited
    #[serde(default)]
    pub access_count: u32,
}

impl MemoryRecord {
    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.decay_steps = 0;
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Derived grouping of non-protected memories sharing a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCluster {
    pub id: String,
    pub tag: String,
    pub name: String,
    pub memory_ids: Vec<String>,
}

/// Persisted memory record set for one project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct MemoryBook {
    #[serde(default)]
    pub records: Vec<MemoryRecord>,
    #[serde(default)]
    pub clusters: Vec<MemoryCluster>,
}

impl MemoryBook {
    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("memory {}", id)))
    }
}

/// Input for [`MemoryEngine::remember`].
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub relevance: Option<u8>,
    pub source_file: Option<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn relevance(mut self, relevance: u8) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }
}

/// Field updates for [`MemoryEngine::modify`]. Only present fields apply.
#[derive(Debug, Clone, Default)]
pub struct MemoryChanges {
    pub relevance: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
    pub category: Option<String>,
}

/// Search filters. At least one of file, tags or query is required.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub file_path: Option<String>,
    pub tags: Vec<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

/// Options for [`MemoryEngine::cleanup`].
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub dry_run: bool,
    pub min_relevance: Option<u8>,
    pub max_age_days: Option<u32>,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            min_relevance: None,
            max_age_days: None,
        }
    }
}

/// What a cleanup pass did, or would do when `dry_run` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Ids absorbed into a near-duplicate
    pub merged: Vec<String>,
    /// Ids whose relevance was reduced
    pub decayed: Vec<String>,
    /// Ids removed because they were empty or decayed below the minimum
    pub deleted: Vec<String>,
    /// Clusters after the pass
    pub clusters: usize,
    pub total_before: usize,
    pub total_after: usize,
}

impl CleanupReport {
    /// Whether the pass changed anything besides cluster membership.
    pub fn is_noop(&self) -> bool {
        self.merged.is_empty() && self.decayed.is_empty() && self.deleted.is_empty()
    }
}

/// Per-project memory counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub clusters: usize,
    pub stale: usize,
}

/// Memory CRUD and consolidation over the memory record set.
pub struct MemoryEngine {
    store: Arc<StateStore>,
    policy: MemoryPolicy,
    scorer: Arc<dyn SimilarityScorer>,
}

impl MemoryEngine {
    /// Create an engine using token-overlap similarity.
    pub fn new(store: Arc<StateStore>, policy: MemoryPolicy) -> Self {
        Self {
            store,
            policy,
            scorer: Arc::new(TokenJaccard),
        }
    }

    /// Replace the similarity function used for deduplication.
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn policy(&self) -> &MemoryPolicy {
        &self.policy
    }

    /// Store a new memory. Caller tags are merged with keyword-derived ones.
    pub fn remember(
        &self,
        scope: &ProjectScope,
        memory: NewMemory,
    ) -> Result<Outcome<MemoryRecord>> {
        let content = memory.content.trim().to_string();
        if content.is_empty() {
            return Err(EngineError::validation("memory content cannot be empty"));
        }
        let category: Category = memory.category.parse()?;
        let relevance = clamp_relevance(memory.relevance.unwrap_or(self.policy.default_relevance));
        let tags = normalize_tags(memory.tags.iter().cloned().chain(auto_tags(&content)));
        let source_file = memory
            .source_file
            .map(|f| normalize_path(&f).to_string())
            .filter(|f| !f.is_empty());

        let now = Utc::now();
        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            content,
            category,
            tags,
            relevance,
            created_at: now,
            last_accessed: now,
            cluster_id: None,
            source_file,
            decay_steps: 0,
            access_count: 0,
        };

        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| {
                book.records.push(record.clone());
                Ok::<_, EngineError>(record)
            })?;

        tracing::debug!(project = ?scope.path(), category = %category, "Remembered memory");

        Ok(outcome.into())
    }

    /// All memories in insertion order.
    pub fn recall(&self, scope: &ProjectScope) -> Outcome<Vec<MemoryRecord>> {
        self.load(scope).map(|book| book.records)
    }

    /// Ranked memories matching a file, tags or free-text query.
    ///
    /// Returned memories count as accessed: their `last_accessed` is
    /// refreshed, which restarts their decay clock.
    pub fn search(
        &self,
        scope: &ProjectScope,
        query: &SearchQuery,
    ) -> Result<Outcome<Vec<MemoryRecord>>> {
        let file = query
            .file_path
            .as_deref()
            .map(normalize_path)
            .filter(|f| !f.is_empty());
        let tags = normalize_tags(&query.tags);
        let text = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        if file.is_none() && tags.is_empty() && text.is_none() {
            return Err(EngineError::validation(
                "search requires at least one of file_path, tags or query",
            ));
        }
        let limit = query.limit.unwrap_or(self.policy.search_limit);

        let ranked = self.load(scope).map(|book| {
            let mut scored: Vec<(SearchScore, MemoryRecord)> = book
                .records
                .into_iter()
                .filter_map(|record| {
                    let score = SearchScore {
                        file: file.map_or(0, |f| file_match(&record, f)),
                        tags: tag_overlap(&record, &tags),
                        keywords: text.as_deref().map_or(0, |q| keyword_overlap(&record, q)),
                    };
                    score.is_match().then_some((score, record))
                })
                .collect();

            scored.sort_by(|(left_score, left), (right_score, right)| {
                compare_ranked(left_score, left, right_score, right)
            });
            scored.into_iter().take(limit).map(|(_, r)| r).collect::<Vec<_>>()
        });
        if ranked.value.is_empty() {
            return Ok(ranked);
        }

        let now = Utc::now();
        let ids: Vec<&str> = ranked.value.iter().map(|r| r.id.as_str()).collect();
        let touched = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| {
                let mut touched = BTreeMap::new();
                for record in book.records.iter_mut().filter(|r| ids.contains(&r.id.as_str())) {
                    record.touch(now);
                    touched.insert(record.id.clone(), record.clone());
                }
                Ok::<_, EngineError>(touched)
            })?;

        let mut outcome = ranked.map(|records| {
            records
                .into_iter()
                .map(|r| touched.data.get(&r.id).cloned().unwrap_or(r))
                .collect()
        });
        outcome.warnings.extend(touched.warning);
        Ok(outcome)
    }

    /// All clusters, or just the one named.
    pub fn clusters(
        &self,
        scope: &ProjectScope,
        cluster_id: Option<&str>,
    ) -> Result<Outcome<Vec<MemoryCluster>>> {
        let outcome = self.load(scope);
        match cluster_id {
            None => Ok(outcome.map(|book| book.clusters)),
            Some(id) => {
                if !outcome.value.clusters.iter().any(|c| c.id == id) {
                    return Err(EngineError::NotFound(format!("cluster {}", id)));
                }
                Ok(outcome.map(|book| book.clusters.into_iter().filter(|c| c.id == id).collect()))
            }
        }
    }

    /// Merge near-duplicates, decay old memories and rebuild clusters.
    ///
    /// With `dry_run` the report is computed against a copy and nothing is
    /// written.
    pub fn cleanup(
        &self,
        scope: &ProjectScope,
        options: CleanupOptions,
    ) -> Result<Outcome<CleanupReport>> {
        let params = cleanup::CleanupParams {
            similarity_threshold: self.policy.similarity_threshold,
            max_age_days: options.max_age_days.unwrap_or(self.policy.max_age_days),
            min_relevance: options.min_relevance.unwrap_or(self.policy.min_relevance),
            decay_per_week: self.policy.decay_per_week,
            decay_exempt_relevance: self.policy.decay_exempt_relevance,
        };
        let now = Utc::now();

        if options.dry_run {
            return Ok(self.load(scope).map(|mut book| {
                cleanup::run(&mut book, self.scorer.as_ref(), &params, now, true)
            }));
        }

        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| {
                Ok::<_, EngineError>(cleanup::run(book, self.scorer.as_ref(), &params, now, false))
            })?;

        let report = &outcome.data;
        tracing::info!(
            project = ?scope.path(),
            scorer = self.scorer.name(),
            merged = report.merged.len(),
            decayed = report.decayed.len(),
            deleted = report.deleted.len(),
            clusters = report.clusters,
            "Memory cleanup applied"
        );

        Ok(outcome.into())
    }

    /// Delete every memory of the project, protected ones included.
    /// Returns how many were removed.
    pub fn forget(&self, scope: &ProjectScope) -> Result<Outcome<usize>> {
        let outcome = self.load(scope);
        let count = outcome.value.records.len();
        self.store.remove(scope, Concern::Memory)?;

        tracing::info!(project = ?scope.path(), removed = count, "Forgot project memories");

        Ok(Outcome {
            value: count,
            warnings: outcome.warnings,
        })
    }

    /// Update relevance, tags, content or category of one memory.
    pub fn modify(
        &self,
        scope: &ProjectScope,
        id: &str,
        changes: MemoryChanges,
    ) -> Result<Outcome<MemoryRecord>> {
        if changes.relevance.is_none()
            && changes.tags.is_none()
            && changes.content.is_none()
            && changes.category.is_none()
        {
            return Err(EngineError::validation("modify requires at least one field to change"));
        }
        let content = match changes.content.as_deref().map(str::trim) {
            Some("") => return Err(EngineError::validation("memory content cannot be empty")),
            Some(content) => Some(content.to_string()),
            None => None,
        };
        let category = changes
            .category
            .as_deref()
            .map(Category::from_str)
            .transpose()?;

        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| -> Result<MemoryRecord> {
                let index = book.position(id)?;
                let record = &mut book.records[index];
                if let Some(relevance) = changes.relevance {
                    record.relevance = clamp_relevance(relevance);
                }
                if let Some(tags) = changes.tags {
                    record.tags = normalize_tags(tags);
                }
                if let Some(content) = content {
                    record.content = content;
                }
                if let Some(category) = category {
                    record.category = category;
                }
                record.touch(Utc::now());
                Ok(record.clone())
            })?;

        Ok(outcome.into())
    }

    /// Remove one memory, returning it.
    pub fn delete(&self, scope: &ProjectScope, id: &str) -> Result<Outcome<MemoryRecord>> {
        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| -> Result<MemoryRecord> {
                let index = book.position(id)?;
                let removed = book.records.remove(index);
                for cluster in &mut book.clusters {
                    cluster.memory_ids.retain(|m| m != id);
                }
                Ok(removed)
            })?;

        Ok(outcome.into())
    }

    /// Reclassify a memory as a rule, recording why.
    pub fn promote(
        &self,
        scope: &ProjectScope,
        id: &str,
        reason: &str,
    ) -> Result<Outcome<MemoryRecord>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("promotion requires a reason"));
        }

        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| -> Result<MemoryRecord> {
                let index = book.position(id)?;
                let record = &mut book.records[index];
                if record.category == Category::Rule {
                    return Err(EngineError::State(format!("memory {} is already a rule", id)));
                }
                record.category = Category::Rule;
                record.relevance = record.relevance.max(8);
                record.content = format!("{} (Promoted to rule: {})", record.content, reason);
                if !record.tags.iter().any(|t| t == "rule") {
                    record.tags.push("rule".to_string());
                }
                record.cluster_id = None;
                record.touch(Utc::now());
                let promoted = record.clone();
                for cluster in &mut book.clusters {
                    cluster.memory_ids.retain(|m| m != id);
                }
                Ok(promoted)
            })?;

        tracing::info!(project = ?scope.path(), id = %id, "Promoted memory to rule");

        Ok(outcome.into())
    }

    /// Store a rule directly. The reason, when given, is kept in the
    /// content. Rules too similar to an existing one are refused.
    pub fn add_rule(
        &self,
        scope: &ProjectScope,
        content: &str,
        reason: Option<&str>,
        relevance: Option<u8>,
    ) -> Result<Outcome<MemoryRecord>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::validation("rule content cannot be empty"));
        }
        let content = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("{} (Reason: {})", content, reason),
            None => content.to_string(),
        };
        let tags = normalize_tags(auto_tags(&content).into_iter().chain(["rule".to_string()]));

        let now = Utc::now();
        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            tags,
            relevance: clamp_relevance(relevance.unwrap_or(RULE_RELEVANCE)),
            category: Category::Rule,
            content,
            created_at: now,
            last_accessed: now,
            cluster_id: None,
            source_file: None,
            decay_steps: 0,
            access_count: 0,
        };

        let outcome = self
            .store
            .update(scope, Concern::Memory, |book: &mut MemoryBook| -> Result<MemoryRecord> {
                let duplicate = book.records.iter().find(|r| {
                    r.category == Category::Rule
                        && self.scorer.score(&r.content, &record.content)
                            >= self.policy.similarity_threshold
                });
                if let Some(existing) = duplicate {
                    return Err(EngineError::State(format!(
                        "a similar rule already exists (id={})",
                        existing.id
                    )));
                }
                book.records.push(record.clone());
                Ok(record)
            })?;

        tracing::info!(project = ?scope.path(), id = %outcome.data.id, "Rule added");

        Ok(outcome.into())
    }

    /// Every rule, most relevant first.
    pub fn rules(&self, scope: &ProjectScope) -> Outcome<Vec<MemoryRecord>> {
        self.load(scope).map(|book| {
            let mut rules: Vec<MemoryRecord> = book
                .records
                .into_iter()
                .filter(|r| r.category == Category::Rule)
                .collect();
            rules.sort_by(|a, b| b.relevance.cmp(&a.relevance));
            rules
        })
    }

    /// Newest memories first, optionally of one category.
    pub fn recent(
        &self,
        scope: &ProjectScope,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Outcome<Vec<MemoryRecord>>> {
        let category = category.map(Category::from_str).transpose()?;
        let limit = limit.unwrap_or(RECENT_LIMIT);

        Ok(self.load(scope).map(|book| {
            let mut records: Vec<MemoryRecord> = book
                .records
                .into_iter()
                .filter(|r| category.map_or(true, |c| r.category == c))
                .collect();
            // Stable sort keeps later insertions first among equal timestamps
            records.reverse();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            records.truncate(limit);
            records
        }))
    }

    /// Counts by category, cluster count and stale memories.
    pub fn stats(&self, scope: &ProjectScope) -> Outcome<MemoryStats> {
        let stale_cutoff = Utc::now() - Duration::days(i64::from(self.policy.stale_after_days));
        self.load(scope).map(|book| {
            let mut by_category = BTreeMap::new();
            for record in &book.records {
                *by_category.entry(record.category.to_string()).or_insert(0) += 1;
            }
            MemoryStats {
                total: book.records.len(),
                by_category,
                clusters: book.clusters.len(),
                stale: book
                    .records
                    .iter()
                    .filter(|r| !r.category.is_protected() && r.last_accessed < stale_cutoff)
                    .count(),
            }
        })
    }

    fn load(&self, scope: &ProjectScope) -> Outcome<MemoryBook> {
        self.store.load(scope, Concern::Memory).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SearchScore {
    file: u8,
    tags: usize,
    keywords: usize,
}

impl SearchScore {
    fn is_match(&self) -> bool {
        self.file > 0 || self.tags > 0 || self.keywords > 0
    }
}

/// Best match first: score, then relevance, then most recent access.
fn compare_ranked(
    left_score: &SearchScore,
    left: &MemoryRecord,
    right_score: &SearchScore,
    right: &MemoryRecord,
) -> Ordering {
    right_score
        .cmp(left_score)
        .then_with(|| right.relevance.cmp(&left.relevance))
        .then_with(|| right.last_accessed.cmp(&left.last_accessed))
}

/// 2 for the same file, 1 for a same-named file or a mention in content.
fn file_match(record: &MemoryRecord, file: &str) -> u8 {
    if let Some(source) = record.source_file.as_deref() {
        if source == file
            || Path::new(file).ends_with(source)
            || Path::new(source).ends_with(file)
        {
            return 2;
        }
        if file_name(source) == file_name(file) {
            return 1;
        }
    }
    let name = file_name(file);
    if name.len() >= 3 && record.content.contains(name) {
        return 1;
    }
    0
}

fn tag_overlap(record: &MemoryRecord, tags: &[String]) -> usize {
    tags.iter().filter(|t| record.tags.contains(t)).count()
}

fn keyword_overlap(record: &MemoryRecord, query: &str) -> usize {
    let content = record.content.to_lowercase();
    let words = tokenize(&content);
    let hits = tokenize(query).iter().filter(|w| words.contains(*w)).count();
    let phrase = usize::from(content.contains(query));
    hits + phrase
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

pub(crate) fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("./").unwrap_or(path)
}

fn clamp_relevance(relevance: u8) -> u8 {
    relevance.min(MAX_RELEVANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn engine() -> (TempDir, MemoryEngine, ProjectScope) {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(StateStore::new(temp_dir.path().join("state")));
        let engine = MemoryEngine::new(store, MemoryPolicy::default());
        let scope = ProjectScope::new(temp_dir.path().join("project"));
        (temp_dir, engine, scope)
    }

    #[test]
    fn test_remember_validates_input() {
        let (_dir, engine, scope) = engine();

        let err = engine
            .remember(&scope, NewMemory::new("   ", "context"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = engine
            .remember(&scope, NewMemory::new("Something useful", "opinion"))
            .unwrap_err();
        assert!(err.to_string().contains("unrecognized category 'opinion'"));

        assert!(engine.recall(&scope).value.is_empty());
    }

    #[test]
    fn test_remember_defaults_and_tags() {
        let (_dir, engine, scope) = engine();

        let record = engine
            .remember(
                &scope,
                NewMemory::new("Login fails when the session cookie expires", "Discovery")
                    .tags(["Session", "auth"])
                    .source_file("./src/auth.rs"),
            )
            .unwrap()
            .value;

        assert_eq!(record.category, Category::Discovery);
        assert_eq!(record.relevance, 5);
        assert_eq!(record.tags, vec!["session", "auth"]);
        assert_eq!(record.source_file.as_deref(), Some("src/auth.rs"));

        let capped = engine
            .remember(&scope, NewMemory::new("Never push to main", "rule").relevance(42))
            .unwrap()
            .value;
        assert_eq!(capped.relevance, MAX_RELEVANCE);

        let recalled = engine.recall(&scope).value;
        assert_eq!(recalled.len(), 2);
        assert_eq!(recalled[0].id, record.id);
        assert_eq!(recalled[1].id, capped.id);
    }

    #[test]
    fn test_search_requires_a_filter() {
        let (_dir, engine, scope) = engine();
        let err = engine
            .search(&scope, &SearchQuery { limit: Some(3), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_search_ranking() {
        let (_dir, engine, scope) = engine();

        let by_file = engine
            .remember(
                &scope,
                NewMemory::new("Off-by-one in pagination cursor", "mistake")
                    .source_file("src/api/pages.rs"),
            )
            .unwrap()
            .value;
        let by_name = engine
            .remember(
                &scope,
                NewMemory::new("pages.rs mirrors the legacy cursor format", "context").relevance(9),
            )
            .unwrap()
            .value;
        engine
            .remember(&scope, NewMemory::new("Unrelated note about logging", "context"))
            .unwrap();

        let results = engine
            .search(
                &scope,
                &SearchQuery {
                    file_path: Some("src/api/pages.rs".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![by_file.id.as_str(), by_name.id.as_str()]);

        // Keyword query, ties broken by relevance
        let results = engine
            .search(
                &scope,
                &SearchQuery {
                    query: Some("cursor".into()),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, by_name.id);
    }

    #[test]
    fn test_modify_delete_promote() {
        let (_dir, engine, scope) = engine();
        let record = engine
            .remember(&scope, NewMemory::new("Cache keys include the locale", "discovery"))
            .unwrap()
            .value;

        let modified = engine
            .modify(
                &scope,
                &record.id,
                MemoryChanges {
                    relevance: Some(7),
                    tags: Some(vec!["cache".into(), "i18n".into()]),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(modified.relevance, 7);
        assert_eq!(modified.tags, vec!["cache", "i18n"]);
        assert_eq!(modified.id, record.id);

        let err = engine
            .modify(&scope, &record.id, MemoryChanges::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let promoted = engine
            .promote(&scope, &record.id, "bit us twice")
            .unwrap()
            .value;
        assert_eq!(promoted.category, Category::Rule);
        assert_eq!(promoted.relevance, 8);
        assert!(promoted.content.ends_with("(Promoted to rule: bit us twice)"));
        assert!(promoted.tags.contains(&"rule".to_string()));

        let err = engine.promote(&scope, &record.id, "again").unwrap_err();
        assert!(matches!(err, EngineError::State(_)));

        let removed = engine.delete(&scope, &record.id).unwrap().value;
        assert_eq!(removed.id, record.id);

        for err in [
            engine.delete(&scope, &record.id).unwrap_err(),
            engine.promote(&scope, "missing", "why").unwrap_err(),
            engine
                .modify(
                    &scope,
                    "missing",
                    MemoryChanges {
                        relevance: Some(1),
                        ..Default::default()
                    },
                )
                .unwrap_err(),
        ] {
            assert!(matches!(err, EngineError::NotFound(_)));
        }
    }

    #[test]
    fn test_cleanup_merges_and_clusters() {
        let (_dir, engine, scope) = engine();
        let first = engine
            .remember(
                &scope,
                NewMemory::new("Always run cargo fmt before committing changes", "context")
                    .tags(["style"]),
            )
            .unwrap()
            .value;
        engine
            .remember(
                &scope,
                NewMemory::new("Always run cargo fmt before committing the changes", "context")
                    .tags(["workflow"])
                    .relevance(7),
            )
            .unwrap();
        for note in [
            "Reports endpoint is paginated",
            "Users endpoint is cached",
            "Admin endpoint needs a token",
        ] {
            engine.remember(&scope, NewMemory::new(note, "discovery")).unwrap();
        }

        let preview = engine.cleanup(&scope, CleanupOptions::default()).unwrap().value;
        assert!(preview.dry_run);
        assert_eq!(preview.merged.len(), 1);
        assert_eq!(engine.recall(&scope).value.len(), 5);

        let applied = engine
            .cleanup(&scope, CleanupOptions { dry_run: false, ..Default::default() })
            .unwrap()
            .value;
        assert_eq!(applied.merged, preview.merged);
        assert_eq!(applied.total_after, 4);

        let records = engine.recall(&scope).value;
        let survivor = records.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(survivor.relevance, 7);
        assert_eq!(survivor.content, "Always run cargo fmt before committing the changes");
        assert_eq!(survivor.tags, vec!["style", "workflow"]);

        let clusters = engine.clusters(&scope, None).unwrap().value;
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, "cluster-api");
        assert_eq!(clusters[0].memory_ids.len(), 3);
        assert!(engine.clusters(&scope, Some("cluster-api")).is_ok());
        assert!(matches!(
            engine.clusters(&scope, Some("cluster-nope")).unwrap_err(),
            EngineError::NotFound(_)
        ));

        let again = engine
            .cleanup(&scope, CleanupOptions { dry_run: false, ..Default::default() })
            .unwrap()
            .value;
        assert!(again.is_noop());
    }

    #[test]
    fn test_search_refreshes_access() {
        let (_dir, engine, scope) = engine();
        let long_ago = Utc::now() - Duration::days(400);
        let aged = |id: &str, content: &str| MemoryRecord {
            id: id.to_string(),
            content: content.to_string(),
            category: Category::Context,
            tags: vec!["deploy".to_string()],
            relevance: 3,
            created_at: long_ago,
            last_accessed: long_ago,
            cluster_id: None,
            source_file: None,
            decay_steps: 0,
            access_count: 0,
        };
        let book = MemoryBook {
            records: vec![
                aged("used", "Deploys go through the blue green switch"),
                aged("idle", "Staging database is refreshed every Monday"),
            ],
            clusters: Vec::new(),
        };
        engine.store.save(&scope, Concern::Memory, &book).unwrap();

        let found = engine
            .search(
                &scope,
                &SearchQuery {
                    query: Some("blue green".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].access_count, 1);
        assert!(found[0].last_accessed > long_ago);

        // Only the searched memory escapes decay
        let report = engine
            .cleanup(&scope, CleanupOptions { dry_run: false, ..Default::default() })
            .unwrap()
            .value;
        assert_eq!(report.deleted, vec!["idle"]);
        let kept = engine.recall(&scope).value;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "used");
        assert_eq!(kept[0].relevance, 3);
    }

    #[test]
    fn test_rules_and_recent() {
        let (_dir, engine, scope) = engine();
        let note = engine
            .remember(&scope, NewMemory::new("Staging deploys need a VPN session", "context"))
            .unwrap()
            .value;
        let rule = engine
            .add_rule(
                &scope,
                "Never commit generated protobuf code",
                Some("CI regenerates it"),
                None,
            )
            .unwrap()
            .value;
        assert_eq!(rule.category, Category::Rule);
        assert_eq!(rule.relevance, 9);
        assert_eq!(
            rule.content,
            "Never commit generated protobuf code (Reason: CI regenerates it)"
        );
        assert!(rule.tags.contains(&"rule".to_string()));

        let err = engine
            .add_rule(
                &scope,
                "Never commit generated protobuf code",
                Some("CI regenerates it"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::State(_)));
        assert!(matches!(
            engine.add_rule(&scope, "  ", None, None).unwrap_err(),
            EngineError::Validation(_)
        ));

        engine
            .add_rule(&scope, "Keep migrations reversible", None, Some(10))
            .unwrap();
        let rules: Vec<u8> = engine.rules(&scope).value.iter().map(|r| r.relevance).collect();
        assert_eq!(rules, vec![10, 9]);

        let recent = engine.recent(&scope, None, Some(2)).unwrap().value;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "Keep migrations reversible");
        assert_eq!(recent[1].id, rule.id);

        let context = engine.recent(&scope, Some("context"), None).unwrap().value;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].id, note.id);
        assert!(matches!(
            engine.recent(&scope, Some("gossip"), None).unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[test]
    fn test_forget_and_stats() {
        let (_dir, engine, scope) = engine();
        engine.remember(&scope, NewMemory::new("Forgot null check", "mistake")).unwrap();
        engine.remember(&scope, NewMemory::new("Uses tokio everywhere", "context")).unwrap();

        let stats = engine.stats(&scope).value;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_category.get("mistake"), Some(&1));
        assert_eq!(stats.stale, 0);

        assert_eq!(engine.forget(&scope).unwrap().value, 2);
        assert!(engine.recall(&scope).value.is_empty());
        assert_eq!(engine.forget(&scope).unwrap().value, 0);
    }

    #[test]
    fn test_corrupt_memory_file_surfaces_warning() {
        let (_dir, engine, scope) = engine();
        engine.remember(&scope, NewMemory::new("Uses tokio everywhere", "context")).unwrap();

        let path = engine.store.record_path(&scope, Concern::Memory);
        std::fs::write(&path, "[1, 2").unwrap();

        let recalled = engine.recall(&scope);
        assert!(recalled.value.is_empty());
        assert_eq!(recalled.warnings.len(), 1);

        // Writes proceed from the empty state
        let outcome = engine
            .remember(&scope, NewMemory::new("Fresh start after corruption", "context"))
            .unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(engine.recall(&scope).value.len(), 1);
    }

    struct AlwaysSame;

    impl SimilarityScorer for AlwaysSame {
        fn name(&self) -> &'static str {
            "always-same"
        }

        fn score(&self, _left: &str, _right: &str) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_custom_scorer_drives_merging() {
        let (_dir, engine, scope) = engine();
        let engine = engine.with_scorer(Arc::new(AlwaysSame));

        for note in ["Cache keys include the tenant id", "Billing webhooks retry five times"] {
            engine
                .remember(&scope, NewMemory::new(note, "context"))
                .unwrap();
        }

        let report = engine
            .cleanup(
                &scope,
                CleanupOptions {
                    dry_run: false,
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(report.merged.len(), 1);
        assert_eq!(engine.recall(&scope).value.len(), 1);
    }
}
