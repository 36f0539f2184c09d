//! Memory aliaser: interval packing of transient resources into one heap.
//!
//! Resources of one aliasing group are packed into a linear space so that two
//! resources may overlap in memory only when their lifetimes (closed pass
//! intervals) are disjoint. Packing is bucketed: the largest unplaced entry
//! anchors a bucket sized to fit it, then smaller entries are fitted into the
//! bucket's free regions between lifetime-conflicting occupants, best fit
//! first. Entries that fit nowhere roll over to a later bucket.

/// One resource to pack: identity, lifetime, and size in bytes.
#[derive(Debug, Clone)]
pub struct AliasingEntry {
    pub key: String,
    /// Closed interval of pass indices `[first, last]`.
    pub lifetime: (usize, usize),
    pub size: u64,
}

impl AliasingEntry {
    /// Create an entry.
    pub fn new(key: impl Into<String>, lifetime: (usize, usize), size: u64) -> Self {
        Self {
            key: key.into(),
            lifetime,
            size,
        }
    }
}

/// The placement computed for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub key: String,
    pub heap_offset: u64,
    pub needs_aliasing_barrier: bool,
}

/// The result of packing one aliasing group.
#[derive(Debug, Clone)]
pub struct AliasingOutcome {
    /// Total heap size required; at least 1 so a heap can always be created.
    pub heap_size: u64,
    /// One placement per entry, in placement order.
    pub placements: Vec<Placement>,
}

/// Packs the scheduling infos of a single aliasing group.
#[derive(Debug, Default)]
pub struct MemoryAliaser {
    entries: Vec<AliasingEntry>,
}

/// Closed-interval overlap test.
fn lifetimes_intersect(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

#[derive(Debug)]
struct PlacedEntry {
    entry: AliasingEntry,
    offset: u64,
    needs_barrier: bool,
}

impl MemoryAliaser {
    /// Create an empty aliaser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entry for packing.
    pub fn add_entry(&mut self, entry: AliasingEntry) {
        self.entries.push(entry);
    }

    /// Check if no entries were queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pack all queued entries and return offsets plus the heap size.
    ///
    /// Deterministic: entries are processed in descending size with ties kept
    /// in insertion order, and free regions are chosen best-fit with the
    /// earliest region winning ties.
    pub fn alias(self) -> AliasingOutcome {
        if self.entries.is_empty() {
            return AliasingOutcome {
                heap_size: 1,
                placements: Vec::new(),
            };
        }

        let mut remaining = self.entries;
        remaining.sort_by(|a, b| b.size.cmp(&a.size));

        let mut heap_size = 0u64;
        let mut global_start = 0u64;
        let mut placements = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let available = remaining[0].size;
            heap_size += available;

            let mut bucket: Vec<PlacedEntry> = Vec::new();
            let mut deferred: Vec<AliasingEntry> = Vec::new();

            for entry in remaining.drain(..) {
                if bucket.is_empty() {
                    // The largest unplaced entry anchors the bucket.
                    bucket.push(PlacedEntry {
                        entry,
                        offset: global_start,
                        needs_barrier: false,
                    });
                    continue;
                }

                match fit_into_bucket(&bucket, &entry, available) {
                    Some(local_offset) => {
                        // The bucket is shared now; the region's first occupant
                        // and the newcomer both require aliasing barriers.
                        bucket[0].needs_barrier = true;
                        bucket.push(PlacedEntry {
                            entry,
                            offset: global_start + local_offset,
                            needs_barrier: true,
                        });
                    }
                    None => deferred.push(entry),
                }
            }

            log::trace!(
                "aliasing bucket at {global_start}: {} bytes, {} occupants, {} deferred",
                available,
                bucket.len(),
                deferred.len()
            );

            for placed in bucket {
                placements.push(Placement {
                    key: placed.entry.key,
                    heap_offset: placed.offset,
                    needs_aliasing_barrier: placed.needs_barrier,
                });
            }

            remaining = deferred;
            global_start += available;
        }

        AliasingOutcome {
            heap_size: heap_size.max(1),
            placements,
        }
    }
}

/// Find a bucket-local offset for `entry`, or `None` if nothing fits.
///
/// Builds the set of non-aliasable regions (occupants whose lifetimes
/// intersect the entry's), sweeps their sorted endpoints to enumerate free
/// regions, and returns the smallest free region that fits the entry.
fn fit_into_bucket(bucket: &[PlacedEntry], entry: &AliasingEntry, available: u64) -> Option<u64> {
    let bucket_base = bucket[0].offset;

    let mut starts: Vec<u64> = Vec::new();
    let mut ends: Vec<u64> = Vec::new();
    for placed in bucket {
        if lifetimes_intersect(placed.entry.lifetime, entry.lifetime) {
            let start = placed.offset - bucket_base;
            starts.push(start);
            ends.push(start + placed.entry.size - 1);
        }
    }

    // No lifetime conflicts: the whole bucket region is reusable.
    if starts.is_empty() {
        return if entry.size <= available { Some(0) } else { None };
    }

    starts.sort_unstable();
    ends.sort_unstable();

    let mut best: Option<(u64, u64)> = None; // (offset, size)
    let mut consider = |offset: u64, size: u64| {
        if size >= entry.size && best.map_or(true, |(_, best_size)| size < best_size) {
            best = Some((offset, size));
        }
    };

    // Sweep endpoint events; a free region opens whenever the active count
    // drops to zero and closes at the next interval start.
    let mut active = 0usize;
    let mut cursor = 0u64;
    let (mut si, mut ei) = (0usize, 0usize);
    while si < starts.len() {
        if starts[si] <= ends[ei] {
            if active == 0 && starts[si] > cursor {
                consider(cursor, starts[si] - cursor);
            }
            active += 1;
            si += 1;
        } else {
            active -= 1;
            if active == 0 {
                cursor = ends[ei] + 1;
            }
            ei += 1;
        }
    }
    // Trailing free region after the last non-aliasable byte.
    let last_end = ends[ends.len() - 1];
    if last_end + 1 < available {
        consider(last_end + 1, available - (last_end + 1));
    }

    best.map(|(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_and_offsets(outcome: &AliasingOutcome) -> Vec<(&str, u64)> {
        outcome
            .placements
            .iter()
            .map(|p| (p.key.as_str(), p.heap_offset))
            .collect()
    }

    fn placement<'a>(outcome: &'a AliasingOutcome, key: &str) -> &'a Placement {
        outcome.placements.iter().find(|p| p.key == key).unwrap()
    }

    #[test]
    fn test_empty_returns_minimal_heap() {
        let outcome = MemoryAliaser::new().alias();
        assert_eq!(outcome.heap_size, 1);
        assert!(outcome.placements.is_empty());
    }

    #[test]
    fn test_single_entry() {
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("color", (0, 2), 4096));
        let outcome = aliaser.alias();

        assert_eq!(outcome.heap_size, 4096);
        assert_eq!(keys_and_offsets(&outcome), vec![("color", 0)]);
        assert!(!placement(&outcome, "color").needs_aliasing_barrier);
    }

    #[test]
    fn test_overlapping_lifetimes_do_not_alias() {
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("a", (0, 1), 1 << 20));
        aliaser.add_entry(AliasingEntry::new("b", (1, 2), 1 << 20));
        let outcome = aliaser.alias();

        // Both alive at pass 1: two separate regions.
        assert_eq!(outcome.heap_size, 2 << 20);
        let a = placement(&outcome, "a");
        let b = placement(&outcome, "b");
        assert_ne!(a.heap_offset, b.heap_offset);
    }

    #[test]
    fn test_disjoint_lifetimes_share_memory() {
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("a", (0, 0), 1 << 20));
        aliaser.add_entry(AliasingEntry::new("b", (1, 2), 1 << 20));
        let outcome = aliaser.alias();

        assert_eq!(outcome.heap_size, 1 << 20);
        assert_eq!(placement(&outcome, "a").heap_offset, 0);
        assert_eq!(placement(&outcome, "b").heap_offset, 0);
        assert!(placement(&outcome, "a").needs_aliasing_barrier);
        assert!(placement(&outcome, "b").needs_aliasing_barrier);
    }

    #[test]
    fn test_best_fit_prefers_smallest_region() {
        // "small" conflicts only with "mid" (occupying [30,49]), leaving two
        // free regions: [0,30) and [50,100). Best fit picks the tighter one.
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("anchor", (0, 0), 100));
        aliaser.add_entry(AliasingEntry::new("left", (1, 1), 30)); // no conflicts, offset 0
        aliaser.add_entry(AliasingEntry::new("mid", (1, 2), 20)); // conflicts left, offset 30
        aliaser.add_entry(AliasingEntry::new("small", (2, 2), 10)); // conflicts mid only
        let outcome = aliaser.alias();

        assert_eq!(outcome.heap_size, 100);
        assert_eq!(placement(&outcome, "anchor").heap_offset, 0);
        assert_eq!(placement(&outcome, "left").heap_offset, 0);
        assert_eq!(placement(&outcome, "mid").heap_offset, 30);
        assert_eq!(placement(&outcome, "small").heap_offset, 0);
    }

    #[test]
    fn test_unfit_entry_defers_to_next_bucket() {
        // Three same-lifetime entries cannot share memory at all.
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("a", (0, 1), 100));
        aliaser.add_entry(AliasingEntry::new("b", (0, 1), 80));
        aliaser.add_entry(AliasingEntry::new("c", (0, 1), 60));
        let outcome = aliaser.alias();

        // a anchors bucket 0 (100); b fits behind? No: lifetimes conflict and
        // the bucket is only 100 bytes, so b anchors bucket 1 and c bucket 2.
        assert_eq!(outcome.heap_size, 240);
        let offsets: Vec<u64> = ["a", "b", "c"]
            .iter()
            .map(|k| placement(&outcome, k).heap_offset)
            .collect();
        assert_eq!(offsets, vec![0, 100, 180]);
    }

    #[test]
    fn test_conflicting_then_fitting_mix() {
        // d conflicts with a but fits after it inside the anchor bucket.
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("anchor", (0, 0), 100));
        aliaser.add_entry(AliasingEntry::new("a", (1, 2), 60)); // shares [0,60)
        aliaser.add_entry(AliasingEntry::new("d", (2, 3), 40)); // conflicts a, fits [60,100)
        let outcome = aliaser.alias();

        assert_eq!(outcome.heap_size, 100);
        assert_eq!(placement(&outcome, "a").heap_offset, 0);
        assert_eq!(placement(&outcome, "d").heap_offset, 60);
    }

    #[test]
    fn test_largest_entry_always_fits() {
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("huge", (0, 3), 1 << 24));
        aliaser.add_entry(AliasingEntry::new("tiny", (0, 3), 16));
        let outcome = aliaser.alias();

        assert_eq!(placement(&outcome, "huge").heap_offset, 0);
        // tiny conflicts everywhere in bucket 0 and cannot fit beside huge's
        // full-bucket occupancy, so it anchors its own bucket.
        assert_eq!(placement(&outcome, "tiny").heap_offset, 1 << 24);
        assert_eq!(outcome.heap_size, (1 << 24) + 16);
    }

    #[test]
    fn test_equal_sizes_keep_insertion_order() {
        let mut aliaser = MemoryAliaser::new();
        aliaser.add_entry(AliasingEntry::new("first", (0, 0), 64));
        aliaser.add_entry(AliasingEntry::new("second", (1, 1), 64));
        let outcome = aliaser.alias();

        // first anchors; second aliases onto it.
        assert_eq!(outcome.placements[0].key, "first");
        assert_eq!(placement(&outcome, "second").heap_offset, 0);
    }

    #[test]
    fn test_determinism() {
        let build = || {
            let mut aliaser = MemoryAliaser::new();
            for i in 0..32u64 {
                let first = (i % 7) as usize;
                let last = first + (i % 3) as usize;
                aliaser.add_entry(AliasingEntry::new(
                    format!("r{i}"),
                    (first, last),
                    128 + (i * 37) % 512,
                ));
            }
            aliaser.alias()
        };
        let a = build();
        let b = build();
        assert_eq!(a.heap_size, b.heap_size);
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_no_overlap_with_intersecting_lifetimes() {
        // Pseudo-random workload; verify the aliasing invariant pairwise.
        let mut aliaser = MemoryAliaser::new();
        let mut entries = Vec::new();
        let mut seed = 0x2545_f491u64;
        for i in 0..48u64 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let first = (seed >> 33) as usize % 10;
            let last = first + (seed >> 21) as usize % 4;
            let size = 64 + (seed >> 11) % 2048;
            let entry = AliasingEntry::new(format!("r{i}"), (first, last), size);
            entries.push(entry.clone());
            aliaser.add_entry(entry);
        }
        let outcome = aliaser.alias();
        assert_eq!(outcome.placements.len(), entries.len());

        let lookup = |key: &str| entries.iter().find(|e| e.key == key).unwrap();
        for i in 0..outcome.placements.len() {
            for j in (i + 1)..outcome.placements.len() {
                let (pa, pb) = (&outcome.placements[i], &outcome.placements[j]);
                let (ea, eb) = (lookup(&pa.key), lookup(&pb.key));
                let bytes_overlap = pa.heap_offset < pb.heap_offset + eb.size
                    && pb.heap_offset < pa.heap_offset + ea.size;
                if bytes_overlap {
                    assert!(
                        !lifetimes_intersect(ea.lifetime, eb.lifetime),
                        "{} and {} overlap in memory with intersecting lifetimes",
                        ea.key,
                        eb.key
                    );
                }
                assert!(pa.heap_offset + ea.size <= outcome.heap_size);
                assert!(pb.heap_offset + eb.size <= outcome.heap_size);
            }
        }
    }
}
