//! Partition specifications — which slice of the combo space a worker owns.

use crate::combo::MAX_COMBOS;
use crate::error::CoreError;

/// How a worker's share of the combo space is described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSpec {
    /// Combos where `combo % total == index`. A `total` of 0 disables
    /// partitioning and accepts every combo.
    Single {
        /// Residue class this worker covers.
        index: u32,
        /// Number of partitions.
        total: u32,
    },
    /// Combos `start, start + stride, start + 2·stride, …` below `max`.
    Range {
        /// First combo covered.
        start: u32,
        /// Distance between covered combos.
        stride: u32,
        /// Exclusive upper bound.
        max: u32,
    },
    /// Exactly one combo.
    SingleCombo(u32),
}

impl PartitionSpec {
    /// Accept every combo (no partitioning).
    pub const ALL: PartitionSpec = PartitionSpec::Single { index: 0, total: 0 };

    /// Residue-class partition `index` of `total`.
    ///
    /// A `total` of 0 yields the accept-all spec; otherwise `index` must
    /// be below `total` and `total` must not exceed the combo space.
    pub fn single(index: u32, total: u32) -> Result<PartitionSpec, CoreError> {
        if total == 0 {
            return Ok(PartitionSpec::ALL);
        }
        if total > MAX_COMBOS {
            return Err(CoreError::TotalTooLarge { total });
        }
        if index >= total {
            return Err(CoreError::IndexOutOfRange { index, total });
        }
        Ok(PartitionSpec::Single { index, total })
    }

    /// Strided partition starting at `start`, stepping by `stride`,
    /// bounded by `max` (exclusive, at most the combo space).
    pub fn range(start: u32, stride: u32, max: u32) -> Result<PartitionSpec, CoreError> {
        if stride == 0 {
            return Err(CoreError::ZeroStride);
        }
        if max > MAX_COMBOS {
            return Err(CoreError::TotalTooLarge { total: max });
        }
        if start >= max {
            return Err(CoreError::EmptyRange { start, max });
        }
        Ok(PartitionSpec::Range { start, stride, max })
    }

    /// A single combo.
    pub fn single_combo(combo: u32) -> Result<PartitionSpec, CoreError> {
        if combo >= MAX_COMBOS {
            return Err(CoreError::ComboOutOfRange { combo });
        }
        Ok(PartitionSpec::SingleCombo(combo))
    }

    /// Whether `combo` belongs to this partition.
    pub fn contains(&self, combo: u32) -> bool {
        match *self {
            PartitionSpec::Single { total: 0, .. } => true,
            PartitionSpec::Single { index, total } => combo % total == index,
            PartitionSpec::Range { start, stride, max } => {
                combo >= start && (combo - start) % stride == 0 && combo < max
            }
            PartitionSpec::SingleCombo(c) => combo == c,
        }
    }

    /// The combos of this partition, in ascending order.
    pub fn combos(&self) -> impl Iterator<Item = u32> + use<> {
        let spec = *self;
        let (lo, hi) = match spec {
            PartitionSpec::Single { .. } => (0, MAX_COMBOS),
            PartitionSpec::Range { start, max, .. } => (start, max),
            PartitionSpec::SingleCombo(c) => (c, c + 1),
        };
        (lo..hi).filter(move |&c| spec.contains(c))
    }
}

impl Default for PartitionSpec {
    fn default() -> Self {
        PartitionSpec::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_zero_accepts_everything() {
        let spec = PartitionSpec::single(0, 0).unwrap();
        assert!(spec.contains(0));
        assert!(spec.contains(MAX_COMBOS - 1));
    }

    #[test]
    fn single_membership() {
        let spec = PartitionSpec::single(2, 5).unwrap();
        assert!(spec.contains(2));
        assert!(spec.contains(7));
        assert!(!spec.contains(3));
    }

    #[test]
    fn single_rejects_index_at_total() {
        assert!(PartitionSpec::single(5, 5).is_err());
        assert!(PartitionSpec::single(6, 5).is_err());
    }

    #[test]
    fn single_rejects_oversized_total() {
        assert!(PartitionSpec::single(0, MAX_COMBOS + 1).is_err());
    }

    #[test]
    fn range_membership() {
        let spec = PartitionSpec::range(3, 4, 20).unwrap();
        assert!(spec.contains(3));
        assert!(spec.contains(7));
        assert!(spec.contains(19));
        assert!(!spec.contains(4));
        assert!(!spec.contains(23), "combos at or above max are excluded");
        assert!(!spec.contains(2), "combos below start are excluded");
    }

    #[test]
    fn range_with_unit_stride_is_contiguous() {
        let spec = PartitionSpec::range(10, 1, 15).unwrap();
        let combos: Vec<u32> = spec.combos().collect();
        assert_eq!(combos, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn range_rejects_zero_stride() {
        assert!(PartitionSpec::range(0, 0, 10).is_err());
    }

    #[test]
    fn range_rejects_start_at_max() {
        assert!(PartitionSpec::range(10, 1, 10).is_err());
    }

    #[test]
    fn single_combo_membership() {
        let spec = PartitionSpec::single_combo(23_802).unwrap();
        assert!(spec.contains(23_802));
        assert!(!spec.contains(23_803));
        assert!(PartitionSpec::single_combo(MAX_COMBOS).is_err());
    }

    #[test]
    fn worker_ranges_partition_the_space() {
        // Range(i, K, MAX_COMBOS) for i in 0..K covers every combo once.
        let k = 7;
        let mut seen = vec![0u8; MAX_COMBOS as usize];
        for i in 0..k {
            for combo in PartitionSpec::range(i, k, MAX_COMBOS).unwrap().combos() {
                seen[combo as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "every combo claimed exactly once");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn residue_classes_are_disjoint_and_cover(total in 1u32..=1024, combo in 0..MAX_COMBOS) {
                let owners = (0..total)
                    .filter(|&i| PartitionSpec::single(i, total).unwrap().contains(combo))
                    .count();
                prop_assert_eq!(owners, 1, "combo {} must have exactly one owner of {}", combo, total);
            }

            #[test]
            fn stride_members_match_arithmetic(start in 0u32..100, stride in 1u32..64, combo in 0..MAX_COMBOS) {
                let spec = PartitionSpec::range(start, stride, MAX_COMBOS).unwrap();
                let expected = combo >= start && (combo - start) % stride == 0;
                prop_assert_eq!(spec.contains(combo), expected);
            }
        }
    }
}
