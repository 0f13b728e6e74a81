use std::cmp::Ordering;

use alloy_primitives::{I256, U256, U512};
use crucible_types::SimulatedBundle;

/// Profit per unit of gas, kept as an exact fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePrice {
    pub profit: I256,
    pub gas: u64,
}

impl EffectivePrice {
    pub fn new(profit: I256, gas: u64) -> Self {
        Self { profit, gas: gas.max(1) }
    }

    pub fn of(sim: &SimulatedBundle) -> Self {
        Self::new(sim.profit, sim.gas_used)
    }

    /// Compares `self * self_scale` against `other * other_scale` without rounding.
    pub fn cmp_scaled(&self, self_scale: u64, other: &Self, other_scale: u64) -> Ordering {
        let lhs = signed_product(self.profit, self_scale, other.gas);
        let rhs = signed_product(other.profit, other_scale, self.gas);
        lhs.cmp(&rhs)
    }

    /// True when this price is at least `percent`% of `reference`.
    pub fn is_within(&self, reference: &Self, percent: u64) -> bool {
        self.cmp_scaled(100, reference, percent) != Ordering::Less
    }
}

impl PartialOrd for EffectivePrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EffectivePrice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_scaled(1, other, 1)
    }
}

/// Sign and magnitude of `profit * a * b`, ordered like the integer it represents.
#[derive(Debug, PartialEq, Eq)]
struct SignedWide {
    negative: bool,
    magnitude: U512,
}

impl Ord for SignedWide {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
        }
    }
}

impl PartialOrd for SignedWide {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn signed_product(profit: I256, a: u64, b: u64) -> SignedWide {
    let magnitude = widen(profit.unsigned_abs()) * U512::from(a) * U512::from(b);
    SignedWide { negative: profit.is_negative() && !magnitude.is_zero(), magnitude }
}

fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(value.as_limbs());
    U512::from_limbs(limbs)
}
