//! Priority queue of in-flight entries, retired results, and the
//! cross-entity artifact cache.

use procgen_types::ast::Transformation;
use procgen_types::{Progress, Raw, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Entries
// ══════════════════════════════════════════════════════════════════════════════

/// One computation: its value, its pending work, its seed and its id.
///
/// Ids are branch-derived: fission of entry `P` into `n` entries yields
/// `P0 … P(n-1)`, so ids are unique and reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: String,
    pub value: Value,
    pub seed: String,
    /// Pending transformations; the next one to run is the LAST element.
    pub stack: Vec<Arc<Transformation>>,
}

impl QueueEntry {
    /// Create an entry whose pending work is `pending`, in execution order.
    pub fn new(
        id: impl Into<String>,
        value: Value,
        seed: impl Into<String>,
        pending: Vec<Arc<Transformation>>,
    ) -> Self {
        let mut entry = Self {
            id: id.into(),
            value,
            seed: seed.into(),
            stack: Vec::new(),
        };
        entry.prepend(pending);
        entry
    }

    /// `true` once no work is left.
    pub fn is_terminal(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn raw(&self) -> &Raw {
        &self.value.raw
    }

    /// The transformation that runs next.
    pub fn next_transformation(&self) -> Option<&Arc<Transformation>> {
        self.stack.last()
    }

    /// Pending transformations in execution order.
    pub fn pending(&self) -> impl Iterator<Item = &Arc<Transformation>> {
        self.stack.iter().rev()
    }

    /// Schedule `transformations` (in order) ahead of the remaining work.
    pub fn prepend(&mut self, transformations: Vec<Arc<Transformation>>) {
        self.stack.extend(transformations.into_iter().rev());
    }

    /// Child `index` of a fission: derived id, copied variables with its own
    /// `index`, same seed, and the same remaining stack.
    pub fn branch(&self, index: usize, raw: Raw) -> QueueEntry {
        QueueEntry {
            id: format!("{}{}", self.id, index),
            value: self.value.branch(raw, index),
            seed: self.seed.clone(),
            stack: self.stack.clone(),
        }
    }
}

/// Where [`Queue::find`] located an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    InFlight,
    Finished,
}

// ══════════════════════════════════════════════════════════════════════════════
// Queue
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct Slot {
    progress: Progress,
    sequence: u64,
    entry: QueueEntry,
}

#[derive(Debug)]
struct CachedArtifact {
    /// Number of results already checked against the key's filter.
    scanned: usize,
    artifact: Option<Arc<dyn Any + Send + Sync>>,
}

/// In-flight entries ordered by `(progress, insertion sequence)`, lowest
/// first, plus the retired results.
#[derive(Debug, Default)]
pub struct Queue {
    /// Sorted descending so the next entry sits at the end.
    in_flight: Vec<Slot>,
    results: Vec<QueueEntry>,
    results_version: u64,
    max_result_progress: Option<Progress>,
    sequence: u64,
    cache: BTreeMap<String, CachedArtifact>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at `progress`, or retire it to the results if its
    /// stack is empty. Equal progress is served first-in first-out.
    pub fn push(&mut self, entry: QueueEntry, progress: Progress) {
        if entry.is_terminal() {
            self.results.push(entry);
            self.results_version += 1;
            self.max_result_progress = Some(match self.max_result_progress {
                Some(max) => max.max(progress),
                None => progress,
            });
            return;
        }
        let sequence = self.sequence;
        self.sequence += 1;
        let position = self
            .in_flight
            .partition_point(|slot| (slot.progress, slot.sequence) > (progress, sequence));
        self.in_flight.insert(
            position,
            Slot {
                progress,
                sequence,
                entry,
            },
        );
    }

    /// Remove and return the entry with the lowest progress.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.in_flight.pop().map(|slot| slot.entry)
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.in_flight.last().map(|slot| &slot.entry)
    }

    /// `true` while any entry still has pending work.
    pub fn has_work(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// In-flight entries in priority order.
    pub fn in_flight(&self) -> impl Iterator<Item = &QueueEntry> {
        self.in_flight.iter().rev().map(|slot| &slot.entry)
    }

    /// Retired entries in retirement order.
    pub fn results(&self) -> &[QueueEntry] {
        &self.results
    }

    /// Bumped every time an entry retires.
    pub fn results_version(&self) -> u64 {
        self.results_version
    }

    /// Look an entry up by id across both collections.
    pub fn find(&self, id: &str) -> Option<(&QueueEntry, EntryState)> {
        self.in_flight()
            .find(|entry| entry.id == id)
            .map(|entry| (entry, EntryState::InFlight))
            .or_else(|| {
                self.results
                    .iter()
                    .find(|entry| entry.id == id)
                    .map(|entry| (entry, EntryState::Finished))
            })
    }

    /// Aggregate progress: the head's progress while work remains (every
    /// in-flight entry has reached at least that), otherwise the furthest
    /// retired progress.
    pub fn current_progress(&self) -> Option<Progress> {
        match self.in_flight.last() {
            Some(slot) => Some(slot.progress),
            None => self.max_result_progress,
        }
    }

    /// Memoized artifact derived from the results that `matches` selects.
    ///
    /// `build` runs over the matching results only when a new matching
    /// entry retired since the artifact for `key` was last built; otherwise
    /// the prior `Arc` is returned as is. Results the filter rejects never
    /// invalidate the artifact. `None` from `build` means "not ready yet"
    /// and is remembered like any other artifact. A key must always be used
    /// with the same filter and artifact type.
    pub fn get_cached<A, M, F>(&mut self, key: &str, matches: M, build: F) -> Option<Arc<A>>
    where
        A: Any + Send + Sync,
        M: Fn(&QueueEntry) -> bool,
        F: FnOnce(&[&QueueEntry]) -> Option<A>,
    {
        let retired = self.results.len();
        if let Some(cached) = self.cache.get_mut(key) {
            let changed = self.results[cached.scanned..].iter().any(&matches);
            cached.scanned = retired;
            if !changed {
                return cached
                    .artifact
                    .clone()
                    .and_then(|artifact| artifact.downcast::<A>().ok());
            }
        }
        let snapshot: Vec<&QueueEntry> = self.results.iter().filter(|entry| matches(*entry)).collect();
        let artifact = build(&snapshot).map(Arc::new);
        self.cache.insert(
            key.to_string(),
            CachedArtifact {
                scanned: retired,
                artifact: artifact
                    .clone()
                    .map(|a| a as Arc<dyn Any + Send + Sync>),
            },
        );
        artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen_types::Variables;

    fn entry(id: &str, raw: f64, pending: usize) -> QueueEntry {
        let stack = (0..pending)
            .map(|i| Transformation::this(format!("{id}-{i}")))
            .collect();
        QueueEntry::new(id, Value::new(Raw::Number(raw), Variables::new()), "0", stack)
    }

    #[test]
    fn pops_lowest_progress_first_and_fifo_on_ties() {
        let mut queue = Queue::new();
        queue.push(entry("a", 0.0, 1), Progress(3.0));
        queue.push(entry("b", 0.0, 1), Progress(1.0));
        queue.push(entry("c", 0.0, 1), Progress(3.0));
        queue.push(entry("d", 0.0, 1), Progress(-1.0));

        let order: Vec<&str> = queue.in_flight().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "a", "c"]);
        assert_eq!(queue.peek().map(|e| e.id.as_str()), Some("d"));
        assert_eq!(queue.current_progress(), Some(Progress(-1.0)));

        let popped: Vec<String> = std::iter::from_fn(|| queue.pop().map(|e| e.id)).collect();
        assert_eq!(popped, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn terminal_entries_retire_to_results() {
        let mut queue = Queue::new();
        queue.push(entry("0", 1.0, 0), Progress(4.0));
        assert!(!queue.has_work());
        assert_eq!(queue.results().len(), 1);
        assert_eq!(queue.results_version(), 1);
        assert_eq!(queue.current_progress(), Some(Progress(4.0)));
        assert_eq!(queue.find("0").map(|(_, s)| s), Some(EntryState::Finished));
    }

    #[test]
    fn current_progress_is_none_for_an_empty_queue() {
        assert_eq!(Queue::new().current_progress(), None);
    }

    #[test]
    fn find_prefers_in_flight_entries() {
        let mut queue = Queue::new();
        queue.push(entry("1", 0.0, 2), Progress(0.0));
        queue.push(entry("2", 0.0, 0), Progress(0.0));
        assert_eq!(queue.find("1").map(|(_, s)| s), Some(EntryState::InFlight));
        assert_eq!(queue.find("2").map(|(_, s)| s), Some(EntryState::Finished));
        assert!(queue.find("3").is_none());
    }

    #[test]
    fn branch_derives_ids_and_keeps_the_stack() {
        let parent = entry("5", 2.0, 2);
        let child = parent.branch(1, Raw::Number(9.0));
        assert_eq!(child.id, "51");
        assert_eq!(child.stack, parent.stack);
        assert_eq!(child.value.variables.get("index"), Some(&Raw::Number(1.0)));
        assert_eq!(child.raw(), &Raw::Number(9.0));
    }

    #[test]
    fn prepend_runs_in_order_before_remaining_work() {
        let mut e = entry("0", 0.0, 1);
        e.prepend(vec![Transformation::this("x"), Transformation::this("y")]);
        let order: Vec<&str> = e.pending().map(|t| t.ast_id.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "0-0"]);
        assert_eq!(e.next_transformation().map(|t| t.ast_id.as_str()), Some("x"));
    }

    fn number_sum(queue: &mut Queue, builds: &mut usize) -> Option<Arc<f64>> {
        queue.get_cached(
            "sum",
            |entry| entry.raw().as_number().is_some(),
            |results| {
                *builds += 1;
                if results.is_empty() {
                    return None;
                }
                Some(results.iter().filter_map(|e| e.raw().as_number()).sum::<f64>())
            },
        )
    }

    #[test]
    fn cache_is_reference_stable_until_matching_results_change() {
        let mut queue = Queue::new();
        let mut builds = 0;

        assert!(number_sum(&mut queue, &mut builds).is_none());
        assert!(number_sum(&mut queue, &mut builds).is_none());
        assert_eq!(builds, 1);

        queue.push(entry("0", 2.0, 0), Progress(0.0));
        let first = number_sum(&mut queue, &mut builds).unwrap();
        let again = number_sum(&mut queue, &mut builds).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(*first, 2.0);
        assert_eq!(builds, 2);

        queue.push(entry("1", 3.0, 0), Progress(0.0));
        let rebuilt = number_sum(&mut queue, &mut builds).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(*rebuilt, 5.0);
        assert_eq!(builds, 3);
    }

    #[test]
    fn unrelated_results_keep_the_cached_instance() {
        let mut queue = Queue::new();
        let mut builds = 0;
        queue.push(entry("0", 2.0, 0), Progress(0.0));
        let first = number_sum(&mut queue, &mut builds).unwrap();

        let text = QueueEntry::new("1", Value::new(Raw::from("walker"), Variables::new()), "0", vec![]);
        queue.push(text, Progress(1.0));
        let again = number_sum(&mut queue, &mut builds).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(builds, 1);

        // A later matching result still invalidates after the skipped one.
        queue.push(entry("2", 4.0, 0), Progress(2.0));
        let rebuilt = number_sum(&mut queue, &mut builds).unwrap();
        assert_eq!(*rebuilt, 6.0);
        assert_eq!(builds, 2);
    }
}
