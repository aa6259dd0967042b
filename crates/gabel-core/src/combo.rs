//! Combo indexing over the (king, checker, check-square) search space.
//!
//! The target-position search enumerates every combination of a king
//! square, a checking piece slot, and a check square. A combo is
//! identified by a single linear index; the [`AxisOrder`] decides which
//! axis varies fastest when walking indices in order, which in turn
//! decides how work clusters across a strided partition.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of candidate king squares.
pub const KING_SQUARES: u32 = 64;
/// Number of checking-piece slots.
pub const CHECKER_SLOTS: u32 = 15;
/// Number of candidate check squares.
pub const CHECK_SQUARES: u32 = 64;
/// Size of the full combo space: 64 × 15 × 64.
pub const MAX_COMBOS: u32 = KING_SQUARES * CHECKER_SLOTS * CHECK_SQUARES;

/// One of the three enumeration axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// King square, 64 values, tag `k`.
    King,
    /// Checking-piece slot, 15 values, tag `p`.
    Checker,
    /// Check square, 64 values, tag `c`.
    CheckSquare,
}

impl Axis {
    /// Number of distinct values along this axis.
    pub const fn extent(self) -> u32 {
        match self {
            Axis::King => KING_SQUARES,
            Axis::Checker => CHECKER_SLOTS,
            Axis::CheckSquare => CHECK_SQUARES,
        }
    }

    const fn tag(self) -> char {
        match self {
            Axis::King => 'k',
            Axis::Checker => 'p',
            Axis::CheckSquare => 'c',
        }
    }

    fn from_tag(tag: char) -> Option<Axis> {
        match tag {
            'k' => Some(Axis::King),
            'p' => Some(Axis::Checker),
            'c' => Some(Axis::CheckSquare),
            _ => None,
        }
    }
}

/// A single (king, checker, check-square) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combo {
    /// King square index in `[0, 64)`.
    pub king: u32,
    /// Checker slot index in `[0, 15)`.
    pub checker: u32,
    /// Check square index in `[0, 64)`.
    pub check_square: u32,
}

impl Combo {
    fn component(&self, axis: Axis) -> u32 {
        match axis {
            Axis::King => self.king,
            Axis::Checker => self.checker,
            Axis::CheckSquare => self.check_square,
        }
    }

    fn component_mut(&mut self, axis: Axis) -> &mut u32 {
        match axis {
            Axis::King => &mut self.king,
            Axis::Checker => &mut self.checker,
            Axis::CheckSquare => &mut self.check_square,
        }
    }
}

/// Permutation of the three axes; the first entry varies fastest.
///
/// Identified on the command line by a 3-letter tag such as `kpc`
/// (king fastest, then checker, then check square).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisOrder([Axis; 3]);

impl AxisOrder {
    /// King fastest — the default order.
    pub const KPC: AxisOrder = AxisOrder([Axis::King, Axis::Checker, Axis::CheckSquare]);
    /// King fastest, check square before checker.
    pub const KCP: AxisOrder = AxisOrder([Axis::King, Axis::CheckSquare, Axis::Checker]);
    /// Checker fastest.
    pub const PKC: AxisOrder = AxisOrder([Axis::Checker, Axis::King, Axis::CheckSquare]);
    /// Checker fastest, check square before king.
    pub const PCK: AxisOrder = AxisOrder([Axis::Checker, Axis::CheckSquare, Axis::King]);
    /// Check square fastest.
    pub const CKP: AxisOrder = AxisOrder([Axis::CheckSquare, Axis::King, Axis::Checker]);
    /// Check square fastest, checker before king.
    pub const CPK: AxisOrder = AxisOrder([Axis::CheckSquare, Axis::Checker, Axis::King]);

    /// All six orders, in the sequence the probe driver cycles them.
    pub const ALL: [AxisOrder; 6] = [
        AxisOrder::KPC,
        AxisOrder::KCP,
        AxisOrder::PKC,
        AxisOrder::PCK,
        AxisOrder::CKP,
        AxisOrder::CPK,
    ];

    /// The axes of this order, fastest-varying first.
    pub fn axes(&self) -> [Axis; 3] {
        self.0
    }

    /// Decompose a linear index into its combo under this order.
    ///
    /// Total and bijective for `index < MAX_COMBOS`.
    pub fn project(&self, index: u32) -> Combo {
        debug_assert!(index < MAX_COMBOS);
        let mut combo = Combo {
            king: 0,
            checker: 0,
            check_square: 0,
        };
        let mut rest = index;
        for axis in self.0 {
            *combo.component_mut(axis) = rest % axis.extent();
            rest /= axis.extent();
        }
        combo
    }

    /// Recompose a combo into its linear index under this order.
    ///
    /// Inverse of [`project`](Self::project).
    pub fn unproject(&self, combo: Combo) -> u32 {
        let mut index = 0;
        let mut place = 1;
        for axis in self.0 {
            index += combo.component(axis) * place;
            place *= axis.extent();
        }
        index
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        AxisOrder::KPC
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            write!(f, "{}", axis.tag())?;
        }
        Ok(())
    }
}

impl FromStr for AxisOrder {
    type Err = CoreError;

    /// Parse a 3-letter permutation of `{k, p, c}`.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidAxisOrder {
            tag: tag.to_string(),
        };

        let mut chars = tag.chars();
        let axes = [
            Axis::from_tag(chars.next().ok_or_else(invalid)?).ok_or_else(invalid)?,
            Axis::from_tag(chars.next().ok_or_else(invalid)?).ok_or_else(invalid)?,
            Axis::from_tag(chars.next().ok_or_else(invalid)?).ok_or_else(invalid)?,
        ];
        if chars.next().is_some() {
            return Err(invalid());
        }
        // Each axis must appear exactly once
        if axes[0] == axes[1] || axes[0] == axes[2] || axes[1] == axes[2] {
            return Err(invalid());
        }

        Ok(AxisOrder(axes))
    }
}
