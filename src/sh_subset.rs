use rand::seq::SliceRandom;
use rand::Rng;

use crate::sh_cache::PeerCache;
use crate::sh_interface::{PeerEntry, PeerId};

/// Pick up to `size` random entries from `cache`, never `exclude`.
///
/// Sampling is uniform without replacement. When no more than `size`
/// entries are eligible all of them are returned. Every returned entry is a
/// fresh copy tagged as offered to `exclude`; the cache itself is left
/// untouched, see [`PeerCache::mark_sent`] for tagging the originals.
pub fn select_subset<R: Rng + ?Sized>(
    cache: &PeerCache,
    exclude: PeerId,
    size: usize,
    rng: &mut R,
) -> Vec<PeerEntry> {
    let eligible: Vec<PeerId> = cache
        .iter()
        .map(|e| e.peer)
        .filter(|&p| p != exclude)
        .collect();

    if eligible.len() <= size {
        return eligible
            .into_iter()
            .map(|p| PeerEntry::sent_to(p, exclude))
            .collect();
    }

    eligible
        .choose_multiple(rng, size)
        .map(|&p| PeerEntry::sent_to(p, exclude))
        .collect()
}
