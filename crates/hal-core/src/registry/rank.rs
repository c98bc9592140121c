//! Total ordering used to rank candidate drivers within an interface
//! bucket during [`crate::registry::DriverRegistry::resolve`].

use crate::registry::driver::{CapabilityRequirements, DriverEntry};

/// Sort key implementing the ranking order from the component design:
/// priority desc, preferred-bit overlap desc, tier desc, memory overhead
/// asc, insertion order asc (earlier wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RankKey {
    priority: i32,
    preferred_overlap: u32,
    tier_rank: u8,
    memory_overhead_bytes: u64,
    insertion_seq: u64,
}

impl RankKey {
    pub(crate) fn compute(entry: &DriverEntry, reqs: &CapabilityRequirements) -> Self {
        Self {
            priority: entry.info.priority,
            preferred_overlap: entry.info.capability_mask.preferred_overlap(reqs.preferred_mask),
            tier_rank: entry.info.tier as u8,
            memory_overhead_bytes: entry.info.memory_overhead_bytes,
            insertion_seq: entry.insertion_seq,
        }
    }

    /// Orders keys so that a list sorted ascending by this key is already
    /// in "best first" order.
    fn rank_tuple(self) -> (std::cmp::Reverse<i32>, u32, u8, std::cmp::Reverse<u64>, std::cmp::Reverse<u64>) {
        (
            std::cmp::Reverse(self.priority),
            u32::MAX - self.preferred_overlap,
            u8::MAX - self.tier_rank,
            std::cmp::Reverse(u64::MAX - self.memory_overhead_bytes),
            std::cmp::Reverse(u64::MAX - self.insertion_seq),
        )
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank_tuple().cmp(&other.rank_tuple())
    }
}

/// Returns the indices of `entries` ordered best-candidate-first under
/// the ranking described in the component design.
pub(crate) fn rank_indices(entries: &[DriverEntry], reqs: &CapabilityRequirements) -> Vec<usize> {
    let mut keyed: Vec<(usize, RankKey)> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| (idx, RankKey::compute(entry, reqs)))
        .collect();
    keyed.sort_by_key(|(_, key)| *key);
    keyed.into_iter().map(|(idx, _)| idx).collect()
}

#[cfg(test)]
mod tests {
    use super::rank_indices;
    use crate::capability::{CapabilityMask, PerformanceTier};
    use crate::registry::driver::{CapabilityRequirements, DriverEntry, DriverInfo, DriverVersion, ANY_PLATFORM};

    fn entry(priority: i32, overhead: u64, seq: u64) -> DriverEntry {
        let info = DriverInfo {
            name: "d",
            version: DriverVersion::new(1, 0, 0),
            supported_platforms_mask: ANY_PLATFORM,
            capability_mask: CapabilityMask::empty(),
            priority,
            tier: PerformanceTier::Standard,
            factory: None,
            dependencies: Vec::new(),
            fallback_drivers: Vec::new(),
            memory_overhead_bytes: overhead,
            supports_hot_swap: true,
            description: "",
        };
        DriverEntry::new(info, seq)
    }

    #[test]
    fn priority_dominates_ranking() {
        let entries = vec![entry(10, 0, 0), entry(50, 0, 1)];
        let ranked = rank_indices(&entries, &CapabilityRequirements::none());
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn ties_break_on_insertion_order() {
        let entries = vec![entry(10, 0, 5), entry(10, 0, 2)];
        let ranked = rank_indices(&entries, &CapabilityRequirements::none());
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn lower_memory_overhead_wins_on_tie() {
        let entries = vec![entry(10, 4096, 0), entry(10, 1024, 1)];
        let ranked = rank_indices(&entries, &CapabilityRequirements::none());
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn extreme_priorities_rank_without_overflow() {
        let entries = vec![entry(i32::MIN, 0, 0), entry(i32::MAX, 0, 1), entry(0, 0, 2)];
        let ranked = rank_indices(&entries, &CapabilityRequirements::none());
        assert_eq!(ranked, vec![1, 2, 0]);
    }

    proptest::proptest! {
        /// Registry determinism: identical entries and requirements rank
        /// the same way no matter how many times `rank_indices` is called.
        #[test]
        fn ranking_is_deterministic(
            priorities in proptest::collection::vec(proptest::num::i32::ANY, 1..12),
            overheads in proptest::collection::vec(0u64..4096, 1..12),
        ) {
            let len = priorities.len().min(overheads.len());
            let entries: Vec<DriverEntry> = (0..len)
                .map(|i| entry(priorities[i], overheads[i], i as u64))
                .collect();
            let reqs = CapabilityRequirements::none();

            let first = rank_indices(&entries, &reqs);
            for _ in 0..4 {
                proptest::prop_assert_eq!(rank_indices(&entries, &reqs), first.clone());
            }
        }

        /// The first ranked index never has a strictly lower priority than
        /// any other candidate: priority dominates the rest of the key.
        #[test]
        fn top_ranked_never_loses_on_priority(
            priorities in proptest::collection::vec(proptest::num::i32::ANY, 1..12),
        ) {
            let entries: Vec<DriverEntry> = priorities
                .iter()
                .enumerate()
                .map(|(i, &p)| entry(p, 0, i as u64))
                .collect();
            let ranked = rank_indices(&entries, &CapabilityRequirements::none());
            let top_priority = entries[ranked[0]].info.priority;
            for &idx in &ranked {
                proptest::prop_assert!(entries[idx].info.priority <= top_priority);
            }
        }
    }
}
