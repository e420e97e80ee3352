//! Consolidation pass over a project's memories.

use super::{CleanupReport, MemoryBook, MemoryCluster, MemoryRecord, SimilarityScorer};
use chrono::{DateTime, Utc};

/// Non-protected memories sharing a tag at which a cluster forms.
const MIN_CLUSTER_SIZE: usize = 3;

/// Trimmed content shorter than this carries no usable knowledge.
const MIN_CONTENT_CHARS: usize = 20;

/// Content that is nothing but a placeholder.
const PLACEHOLDERS: &[&str] = &["TODO:", "FIXME:", "...", "[placeholder]", "[TBD]"];

pub(crate) struct CleanupParams {
    pub similarity_threshold: f64,
    pub max_age_days: u32,
    pub min_relevance: u8,
    pub decay_per_week: u8,
    pub decay_exempt_relevance: u8,
}

/// Apply one cleanup pass to `book` in place.
///
/// Order: drop broken memories, merge near-duplicates until none remain,
/// decay memories unused past the age limit, rebuild clusters. Running it
/// twice at the same instant changes nothing the second time.
pub(crate) fn run(
    book: &mut MemoryBook,
    scorer: &dyn SimilarityScorer,
    params: &CleanupParams,
    now: DateTime<Utc>,
    dry_run: bool,
) -> CleanupReport {
    let mut report = CleanupReport {
        dry_run,
        total_before: book.records.len(),
        ..Default::default()
    };

    book.records.retain(|record| {
        if !record.category.is_protected() && is_broken(&record.content) {
            report.deleted.push(record.id.clone());
            false
        } else {
            true
        }
    });

    merge_duplicates(
        &mut book.records,
        scorer,
        params.similarity_threshold,
        &mut report.merged,
    );

    let expired = apply_decay(&mut book.records, params, now, &mut report.decayed);
    book.records.retain(|record| !expired.contains(&record.id));
    report.deleted.extend(expired);

    book.clusters = build_clusters(&mut book.records);
    report.clusters = book.clusters.len();
    report.total_after = book.records.len();

    report
}

fn is_broken(content: &str) -> bool {
    let content = content.trim();
    content.chars().count() < MIN_CONTENT_CHARS
        || PLACEHOLDERS.contains(&content)
        || content.ends_with("[TBD]")
        || content.ends_with("[placeholder]")
}

/// Merge same-category pairs scoring at or above `threshold` until no such
/// pair is left. The earlier record survives.
fn merge_duplicates(
    records: &mut Vec<MemoryRecord>,
    scorer: &dyn SimilarityScorer,
    threshold: f64,
    merged: &mut Vec<String>,
) {
    loop {
        let mut changed = false;
        let mut i = 0;
        while i < records.len() {
            let mut j = i + 1;
            while j < records.len() {
                let duplicate = records[i].category == records[j].category
                    && scorer.score(&records[i].content, &records[j].content) >= threshold;
                if duplicate {
                    let absorbed = records.remove(j);
                    merged.push(absorbed.id.clone());
                    absorb(&mut records[i], absorbed);
                    changed = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !changed {
            break;
        }
    }
}

/// Higher relevance, union of tags, newer content.
fn absorb(survivor: &mut MemoryRecord, other: MemoryRecord) {
    if other.created_at >= survivor.created_at {
        survivor.content = other.content;
    } else {
        survivor.created_at = other.created_at;
    }
    survivor.relevance = survivor.relevance.max(other.relevance);
    for tag in other.tags {
        if !survivor.tags.contains(&tag) {
            survivor.tags.push(tag);
        }
    }
    if survivor.source_file.is_none() {
        survivor.source_file = other.source_file;
    }
    if other.last_accessed > survivor.last_accessed {
        survivor.last_accessed = other.last_accessed;
        survivor.decay_steps = other.decay_steps;
    }
}

/// Linear decay per full week past `max_age_days`. Returns ids that fell
/// below `min_relevance`.
fn apply_decay(
    records: &mut [MemoryRecord],
    params: &CleanupParams,
    now: DateTime<Utc>,
    decayed: &mut Vec<String>,
) -> Vec<String> {
    let mut expired = Vec::new();

    for record in records.iter_mut() {
        if record.category.is_protected() || record.relevance >= params.decay_exempt_relevance {
            continue;
        }

        let overdue_days = (now - record.last_accessed).num_days() - i64::from(params.max_age_days);
        if overdue_days <= 0 {
            continue;
        }

        let due_steps = u32::try_from(overdue_days / 7)
            .unwrap_or(u32::MAX)
            .saturating_mul(u32::from(params.decay_per_week));
        if due_steps <= record.decay_steps {
            continue;
        }

        let step = u8::try_from(due_steps - record.decay_steps).unwrap_or(u8::MAX);
        record.relevance = record.relevance.saturating_sub(step);
        record.decay_steps = due_steps;
        decayed.push(record.id.clone());

        if record.relevance < params.min_relevance {
            expired.push(record.id.clone());
        }
    }

    expired
}

/// One cluster per tag shared by enough non-protected memories. Each such
/// memory points at the cluster of its first clustered tag.
fn build_clusters(records: &mut [MemoryRecord]) -> Vec<MemoryCluster> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for record in records.iter().filter(|r| !r.category.is_protected()) {
        for tag in &record.tags {
            match groups.iter_mut().find(|(t, _)| t == tag) {
                Some((_, ids)) => ids.push(record.id.clone()),
                None => groups.push((tag.clone(), vec![record.id.clone()])),
            }
        }
    }

    let clusters: Vec<MemoryCluster> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() >= MIN_CLUSTER_SIZE)
        .map(|(tag, memory_ids)| MemoryCluster {
            id: format!("cluster-{}", tag),
            name: format!("{} memories", title_case(&tag)),
            tag,
            memory_ids,
        })
        .collect();

    for record in records.iter_mut() {
        record.cluster_id = if record.category.is_protected() {
            None
        } else {
            record.tags.iter().find_map(|tag| {
                clusters
                    .iter()
                    .find(|c| &c.tag == tag)
                    .map(|c| c.id.clone())
            })
        };
    }

    clusters
}

fn title_case(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
