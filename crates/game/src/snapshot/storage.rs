use std::collections::BTreeMap;

use super::item::Snapshot;

#[derive(Debug, Clone)]
pub struct SnapshotHolder {
    pub tick: i32,
    pub received_at: i64,
    pub snapshot: Snapshot,
}

/// Stored snapshots ordered by tick, with the prev/current pair the client
/// is interpolating between.
#[derive(Debug, Default)]
pub struct SnapshotRing {
    holders: BTreeMap<i32, SnapshotHolder>,
    prev: Option<i32>,
    current: Option<i32>,
}

impl SnapshotRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tick: i32, received_at: i64, snapshot: Snapshot) {
        self.holders.insert(
            tick,
            SnapshotHolder {
                tick,
                received_at,
                snapshot,
            },
        );
    }

    pub fn get(&self, tick: i32) -> Option<&SnapshotHolder> {
        self.holders.get(&tick)
    }

    /// Drops every holder older than `floor` except the prev/current pair.
    pub fn purge_until(&mut self, floor: i32) {
        let (prev, current) = (self.prev, self.current);
        self.holders
            .retain(|&tick, _| tick >= floor || Some(tick) == prev || Some(tick) == current);
    }

    pub fn clear(&mut self) {
        self.holders.clear();
        self.prev = None;
        self.current = None;
    }

    pub fn first(&self) -> Option<&SnapshotHolder> {
        self.holders.values().next()
    }

    pub fn last(&self) -> Option<&SnapshotHolder> {
        self.holders.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn prev(&self) -> Option<&SnapshotHolder> {
        self.prev.and_then(|tick| self.holders.get(&tick))
    }

    pub fn current(&self) -> Option<&SnapshotHolder> {
        self.current.and_then(|tick| self.holders.get(&tick))
    }

    /// Points prev at the oldest and current at the newest holder.
    pub fn set_pointers_to_ends(&mut self) {
        self.prev = self.first().map(|holder| holder.tick);
        self.current = self.last().map(|holder| holder.tick);
    }

    /// Moves the pair one holder forward. Returns false when current is
    /// already the newest.
    pub fn advance(&mut self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let next = self
            .holders
            .range(current + 1..)
            .next()
            .map(|(&tick, _)| tick);

        match next {
            Some(next) => {
                self.prev = Some(current);
                self.current = Some(next);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(ticks: &[i32]) -> SnapshotRing {
        let mut ring = SnapshotRing::new();
        for &tick in ticks {
            ring.add(tick, tick as i64, Snapshot::empty());
        }
        ring
    }

    #[test]
    fn test_purge_monotonicity() {
        let mut ring = ring_with(&[10, 11, 12, 13, 14]);
        ring.set_pointers_to_ends();
        ring.purge_until(13);

        for tick in [11, 12] {
            assert!(ring.get(tick).is_none());
        }
        // prev and current survive any floor
        assert_eq!(ring.prev().map(|h| h.tick), Some(10));
        assert_eq!(ring.current().map(|h| h.tick), Some(14));
        assert!(ring.get(13).is_some());

        ring.purge_until(100);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_advance_walks_forward() {
        let mut ring = ring_with(&[1, 2]);
        ring.set_pointers_to_ends();
        assert!(!ring.advance());

        ring.add(5, 5, Snapshot::empty());
        ring.add(4, 4, Snapshot::empty());
        assert!(ring.advance());
        assert_eq!(ring.prev().map(|h| h.tick), Some(2));
        assert_eq!(ring.current().map(|h| h.tick), Some(4));
        assert!(ring.advance());
        assert_eq!(ring.current().map(|h| h.tick), Some(5));
        assert!(!ring.advance());
    }

    #[test]
    fn test_clear_drops_pointers() {
        let mut ring = ring_with(&[1, 2]);
        ring.set_pointers_to_ends();
        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.current().is_none());
        assert!(!ring.advance());
    }
}
