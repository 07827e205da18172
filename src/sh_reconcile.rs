use crate::sh_cache::PeerCache;
use crate::sh_interface::{PeerEntry, PeerId};

/// What happened to each incoming entry during a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Stored in a free slot
    pub added: usize,
    /// Stored over a slot previously offered to the sender
    pub swapped: usize,
    /// Already known (or the owner itself)
    pub duplicates: usize,
    /// Dropped because the cache was full and no offered slot was left
    pub overflowed: usize,
}

impl MergeOutcome {
    pub fn stored(&self) -> usize {
        self.added + self.swapped
    }

    pub fn discarded(&self) -> usize {
        self.duplicates + self.overflowed
    }
}

/// Absorb `incoming` from `sender` into `cache`.
///
/// Entries are processed in order: known peers are skipped, free slots are
/// filled first, then slots tagged as offered to `sender` are overwritten in
/// cache order. Anything left over is dropped; entries that were not offered
/// to `sender` are never replaced. Stored entries are untagged.
pub fn merge(cache: &mut PeerCache, sender: PeerId, incoming: &[PeerEntry]) -> MergeOutcome {
    let mut swap_candidates = cache.swap_candidates(sender);
    let mut outcome = MergeOutcome::default();

    for entry in incoming {
        if !cache.accepts(entry.peer) {
            outcome.duplicates += 1;
        } else if !cache.is_full() {
            cache.add(*entry);
            outcome.added += 1;
        } else if let Some(slot) = swap_candidates.pop_front() {
            cache.replace_at(slot, *entry);
            outcome.swapped += 1;
        } else {
            outcome.overflowed += 1;
        }
    }

    if outcome.overflowed > 0 {
        log::debug!(
            "peer {:x}: dropped {} entries from {:x}, no free or offered slot",
            cache.owner(),
            outcome.overflowed,
            sender
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: PeerId = 100;

    fn cache_of(capacity: usize, peers: &[PeerId]) -> PeerCache {
        let mut cache = PeerCache::new(0, capacity);
        for &p in peers {
            assert!(cache.add(PeerEntry::new(p)));
        }
        cache
    }

    fn entries(peers: &[PeerId]) -> Vec<PeerEntry> {
        peers.iter().map(|&p| PeerEntry::new(p)).collect()
    }

    #[test]
    fn test_merge_duplicate_then_swap() {
        // [A*, B, C] with A* offered to S, incoming [A, D]
        let (a, b, c, d) = (1, 2, 3, 4);
        let mut cache = cache_of(3, &[a, b, c]);
        cache.mark_sent(&[PeerEntry::new(a)], S);

        let outcome = merge(&mut cache, S, &entries(&[a, d]));

        assert_eq!(cache.peers(), vec![d, b, c]);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.swapped, 1);
        assert_eq!(cache.num_tagged(), 0);
    }

    #[test]
    fn test_merge_fills_free_slots_first() {
        let mut cache = cache_of(4, &[1, 2]);
        cache.mark_sent(&entries(&[1, 2]), S);

        let outcome = merge(&mut cache, S, &entries(&[5, 6, 7]));

        // two free slots, then the first offered slot
        assert_eq!(cache.peers(), vec![7, 2, 5, 6]);
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.swapped, 1);
        assert_eq!(outcome.stored(), 3);
    }

    #[test]
    fn test_merge_overflow_discards_without_panic() {
        let mut cache = cache_of(3, &[1, 2, 3]);
        cache.mark_sent(&entries(&[2]), S);

        let outcome = merge(&mut cache, S, &entries(&[7, 8, 9]));

        assert_eq!(cache.peers(), vec![1, 7, 3]);
        assert_eq!(outcome.swapped, 1);
        assert_eq!(outcome.overflowed, 2);
        assert_eq!(cache.len(), cache.capacity());
    }

    #[test]
    fn test_merge_never_overwrites_entries_offered_elsewhere() {
        let mut cache = cache_of(2, &[1, 2]);
        cache.mark_sent(&entries(&[1]), 55);

        let outcome = merge(&mut cache, S, &entries(&[9]));

        assert_eq!(cache.peers(), vec![1, 2]);
        assert_eq!(outcome.overflowed, 1);
    }

    #[test]
    fn test_merge_skips_owner_and_repeated_incoming() {
        let mut cache = cache_of(5, &[1]);

        let outcome = merge(&mut cache, S, &entries(&[0, 3, 3, 1]));

        assert_eq!(cache.peers(), vec![1, 3]);
        assert!(!cache.contains(0));
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates, 3);
    }

    #[test]
    fn test_merge_keeps_swapped_in_entries_unique() {
        // incoming entry equal to an offered one is a duplicate, the
        // offered slot stays available for the next new entry
        let mut cache = cache_of(2, &[1, 2]);
        cache.mark_sent(&entries(&[1, 2]), S);

        merge(&mut cache, S, &entries(&[2, 8, 9]));

        assert_eq!(cache.peers(), vec![8, 9]);
    }
}
