//! Multi-check bookkeeping for bundles that may be rendered more than once.
//!
//! One bundle can appear in several tables. Each rendering (an *instance*,
//! identified by its `"bi,si"` coordinate) checks and unchecks independently
//! and carries its own reset callback, so clearing the selection can visually
//! clear every checkbox that contributed to it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Invoked when a checked instance is cleared in bulk. Must be idempotent.
pub type ResetFn = Box<dyn Fn() + Send + Sync>;

pub fn instance_id(block: i64, sub: usize) -> String {
    format!("{block},{sub}")
}

/// Inverse of [`instance_id`].
pub fn parse_instance_id(instance: &str) -> Option<(i64, usize)> {
    let (block, sub) = instance.split_once(',')?;
    Some((block.trim().parse().ok()?, sub.trim().parse().ok()?))
}

#[derive(Default)]
struct Entry {
    instances: HashMap<String, ResetFn>,
    /// Mirrors `instances.len()`; kept separately so the two can be checked
    /// against each other.
    count: usize,
}

#[derive(Default)]
pub struct SelectionModel {
    /// First-check order of the selected uuids.
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for SelectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionModel")
            .field("order", &self.order)
            .field("counts", &self.counts())
            .finish()
    }
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on `(uuid, instance)`.
    pub fn check(&mut self, uuid: &str, instance: &str, reset: ResetFn) {
        if !self.entries.contains_key(uuid) {
            self.order.push(uuid.to_string());
        }
        let entry = self.entries.entry(uuid.to_string()).or_default();
        if entry.instances.contains_key(instance) {
            return;
        }
        entry.instances.insert(instance.to_string(), reset);
        entry.count += 1;
    }

    pub fn uncheck(&mut self, uuid: &str, instance: &str) {
        let Some(entry) = self.entries.get_mut(uuid) else {
            return;
        };
        if entry.instances.remove(instance).is_none() {
            return;
        }
        entry.count -= 1;
        if entry.count == 0 {
            self.entries.remove(uuid);
            self.order.retain(|existing| existing != uuid);
        }
    }

    /// Returns whether the instance ended up checked.
    pub fn toggle(&mut self, uuid: &str, instance: &str, reset: ResetFn) -> bool {
        if self.is_checked(uuid, instance) {
            self.uncheck(uuid, instance);
            false
        } else {
            self.check(uuid, instance, reset);
            true
        }
    }

    /// Run every stored reset callback and forget everything.
    pub fn clear(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.order.clear();
        for (_, entry) in entries {
            for (_, reset) in entry.instances {
                reset();
            }
        }
    }

    /// Drop uuids that are no longer rendered anywhere.
    pub fn retain_uuids(&mut self, present: &HashSet<String>) -> usize {
        let vanished: Vec<String> = self
            .order
            .iter()
            .filter(|uuid| !present.contains(*uuid))
            .cloned()
            .collect();
        for uuid in &vanished {
            if let Some(entry) = self.entries.remove(uuid) {
                for (_, reset) in entry.instances {
                    reset();
                }
            }
        }
        self.order.retain(|uuid| present.contains(uuid));
        if !vanished.is_empty() {
            debug!(dropped = vanished.len(), "Pruned selection after reload");
        }
        vanished.len()
    }

    /// Move checked instances onto the instance ids their uuid renders at
    /// now. Instances still on a current id stay; stale ones take the
    /// unclaimed ids in order, and are reset and dropped once none remain.
    /// Returns how many instances moved or were dropped.
    pub fn relocate_instances<F>(&mut self, mut current: F) -> usize
    where
        F: FnMut(&str) -> Vec<String>,
    {
        let mut changed = 0;
        let mut emptied = Vec::new();
        for uuid in &self.order {
            let Some(entry) = self.entries.get_mut(uuid) else {
                continue;
            };
            let places = current(uuid);
            let mut stale: Vec<String> = entry
                .instances
                .keys()
                .filter(|instance| !places.contains(*instance))
                .cloned()
                .collect();
            if stale.is_empty() {
                continue;
            }
            stale.sort_by_key(|instance| parse_instance_id(instance));
            let free: Vec<String> = places
                .into_iter()
                .filter(|place| !entry.instances.contains_key(place))
                .collect();
            let mut free = free.into_iter();
            for instance in stale {
                let Some(reset) = entry.instances.remove(&instance) else {
                    continue;
                };
                changed += 1;
                match free.next() {
                    Some(place) => {
                        debug!(%uuid, from = %instance, to = %place, "Moved checked instance");
                        entry.instances.insert(place, reset);
                    }
                    None => {
                        reset();
                        entry.count -= 1;
                    }
                }
            }
            if entry.count == 0 {
                emptied.push(uuid.clone());
            }
        }
        for uuid in &emptied {
            self.entries.remove(uuid);
        }
        self.order.retain(|uuid| !emptied.contains(uuid));
        changed
    }

    pub fn selected_uuids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Every checked `(uuid, instance)` pair, uuids in selection order.
    pub fn checked_instances(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|uuid| self.entries.get(uuid).map(|entry| (uuid, entry)))
            .flat_map(|(uuid, entry)| {
                let mut instances: Vec<&String> = entry.instances.keys().collect();
                instances.sort();
                instances
                    .into_iter()
                    .map(move |instance| (uuid.clone(), instance.clone()))
            })
            .collect()
    }

    pub fn count(&self, uuid: &str) -> usize {
        self.entries.get(uuid).map_or(0, |entry| entry.count)
    }

    pub fn is_checked(&self, uuid: &str, instance: &str) -> bool {
        self.entries
            .get(uuid)
            .is_some_and(|entry| entry.instances.contains_key(instance))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    fn counts(&self) -> Vec<(String, usize)> {
        self.order
            .iter()
            .map(|uuid| (uuid.clone(), self.count(uuid)))
            .collect()
    }

    /// Immutable view published through the store.
    pub fn snapshot(&self) -> SelectionSnapshot {
        let checked = self
            .entries
            .iter()
            .flat_map(|(uuid, entry)| {
                entry
                    .instances
                    .keys()
                    .map(move |instance| (uuid.clone(), instance.clone()))
            })
            .collect();
        SelectionSnapshot {
            uuids: Arc::new(self.order.clone()),
            checked: Arc::new(checked),
        }
    }

    #[cfg(test)]
    fn invariant_holds(&self) -> bool {
        self.order.len() == self.entries.len()
            && self.entries.iter().all(|(uuid, entry)| {
                entry.count == entry.instances.len()
                    && entry.count >= 1
                    && self.order.contains(uuid)
            })
    }
}

/// What the renderer needs: which uuids are selected, and which rendered
/// instances show a checked box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    uuids: Arc<Vec<String>>,
    checked: Arc<HashSet<(String, String)>>,
}

impl SelectionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uuids.len()
    }

    pub fn uuids(&self) -> &[String] {
        &self.uuids
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.uuids.iter().any(|selected| selected == uuid)
    }

    pub fn is_checked(&self, uuid: &str, instance: &str) -> bool {
        self.checked
            .contains(&(uuid.to_string(), instance.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> ResetFn {
        Box::new(|| {})
    }

    fn counting(counter: &Arc<AtomicUsize>) -> ResetFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn instance_ids_round_trip_and_list_in_selection_order() {
        assert_eq!(parse_instance_id(&instance_id(3, 2)), Some((3, 2)));
        assert_eq!(parse_instance_id("x,1"), None);

        let mut selection = SelectionModel::new();
        selection.check("U2", "4,0", noop());
        selection.check("U1", "1,1", noop());
        selection.check("U2", "2,0", noop());
        assert_eq!(
            selection.checked_instances(),
            vec![
                ("U2".to_string(), "2,0".to_string()),
                ("U2".to_string(), "4,0".to_string()),
                ("U1".to_string(), "1,1".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_check_of_same_instance_is_idempotent() {
        let mut selection = SelectionModel::new();
        selection.check("U1", "1,0", noop());
        selection.check("U1", "1,0", noop());
        assert_eq!(selection.count("U1"), 1);
        assert!(selection.invariant_holds());
    }

    #[test]
    fn uuid_survives_until_last_instance_unchecked() {
        let mut selection = SelectionModel::new();
        selection.check("U1", "1,0", noop());
        selection.check("U1", "3,2", noop());
        assert_eq!(selection.count("U1"), 2);

        selection.uncheck("U1", "1,0");
        assert_eq!(selection.selected_uuids(), vec!["U1"]);
        selection.uncheck("U1", "3,2");
        assert!(selection.is_empty());
        assert_eq!(selection.count("U1"), 0);
        assert!(selection.invariant_holds());
    }

    #[test]
    fn selected_uuids_keep_first_check_order() {
        let mut selection = SelectionModel::new();
        selection.check("U2", "2,0", noop());
        selection.check("U1", "1,0", noop());
        selection.check("U2", "4,0", noop());
        assert_eq!(selection.selected_uuids(), vec!["U2", "U1"]);
    }

    #[test]
    fn clear_runs_every_reset_callback_once() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut selection = SelectionModel::new();
        selection.check("U1", "1,0", counting(&resets));
        selection.check("U1", "3,0", counting(&resets));
        selection.check("U2", "1,1", counting(&resets));
        selection.clear();
        assert_eq!(resets.load(Ordering::SeqCst), 3);
        assert!(selection.is_empty());
        selection.clear();
        assert_eq!(resets.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn toggle_flips_one_instance() {
        let mut selection = SelectionModel::new();
        assert!(selection.toggle("U1", "1,0", noop()));
        assert!(selection.toggle("U1", "2,0", noop()));
        assert!(!selection.toggle("U1", "1,0", noop()));
        assert!(selection.is_checked("U1", "2,0"));
        assert!(!selection.is_checked("U1", "1,0"));
        assert_eq!(selection.count("U1"), 1);
    }

    #[test]
    fn counter_matches_instances_across_event_sequences() {
        // Deterministic pseudo-random walk over a small event space.
        let uuids = ["U1", "U2", "U3"];
        let instances = ["0,0", "1,0", "1,1", "2,3"];
        let mut selection = SelectionModel::new();
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let uuid = uuids[(state % 3) as usize];
            let instance = instances[((state >> 8) % 4) as usize];
            if (state >> 16) % 2 == 0 {
                selection.check(uuid, instance, noop());
            } else {
                selection.uncheck(uuid, instance);
            }
            assert!(selection.invariant_holds());
            for uuid in uuids {
                let checked = instances
                    .iter()
                    .filter(|instance| selection.is_checked(uuid, instance))
                    .count();
                assert_eq!(selection.count(uuid), checked);
                assert_eq!(selection.selected_uuids().contains(&uuid.to_string()), checked > 0);
            }
        }
    }

    #[test]
    fn retain_drops_vanished_uuids_and_resets_them() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut selection = SelectionModel::new();
        selection.check("U1", "1,0", counting(&resets));
        selection.check("U2", "1,1", counting(&resets));
        let present = HashSet::from(["U2".to_string()]);
        assert_eq!(selection.retain_uuids(&present), 1);
        assert_eq!(selection.selected_uuids(), vec!["U2"]);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert!(selection.invariant_holds());
    }

    #[test]
    fn relocation_follows_rows_that_moved() {
        let resets = Arc::new(AtomicUsize::new(0));
        let mut selection = SelectionModel::new();
        selection.check("U1", "0,0", counting(&resets));
        selection.check("U2", "1,0", counting(&resets));
        selection.check("U2", "3,0", counting(&resets));

        let moved = selection.relocate_instances(|uuid| match uuid {
            "U1" => vec!["0,0".to_string()],
            "U2" => vec!["2,0".to_string()],
            _ => Vec::new(),
        });

        assert_eq!(moved, 2);
        assert!(selection.is_checked("U1", "0,0"));
        assert!(selection.is_checked("U2", "2,0"));
        assert!(!selection.is_checked("U2", "1,0"));
        assert_eq!(selection.count("U2"), 1);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert!(selection.invariant_holds());
    }

    #[test]
    fn snapshot_reports_checked_instances() {
        let mut selection = SelectionModel::new();
        selection.check("U1", &instance_id(1, 0), noop());
        let snapshot = selection.snapshot();
        assert!(snapshot.is_checked("U1", "1,0"));
        assert!(!snapshot.is_checked("U1", "2,0"));
        assert!(snapshot.contains("U1"));
        assert_eq!(snapshot.len(), 1);
        assert!(SelectionSnapshot::default().is_empty());
    }
}
