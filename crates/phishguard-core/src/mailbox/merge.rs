//! Pure merge/dedupe engine for email collections.

use std::collections::HashSet;

use super::model::EmailRecord;

/// Folds an incoming batch into an existing collection.
///
/// The result is the union of both slices, unique by id with the
/// **existing** record kept on collision (a record already classified is
/// never overwritten by a later fetch of the same id), sorted by timestamp
/// descending with id-ascending tie-break.
///
/// Pure and idempotent: `merge(x, &[])` returns `x` unchanged in content,
/// and re-merging the same batch is a no-op. Persistence is the caller's
/// job.
#[must_use]
pub fn merge(existing: &[EmailRecord], incoming: &[EmailRecord]) -> Vec<EmailRecord> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut result = Vec::with_capacity(existing.len() + incoming.len());

    for record in existing.iter().chain(incoming) {
        if seen.insert(record.id.as_str()) {
            result.push(record.clone());
        }
    }

    result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    result
}

/// Returns the collection without the record of the given id.
///
/// Removal is whole-record only; record content is never edited in place.
#[must_use]
pub fn remove(existing: &[EmailRecord], id: &str) -> Vec<EmailRecord> {
    existing
        .iter()
        .filter(|record| record.id != id)
        .cloned()
        .collect()
}
