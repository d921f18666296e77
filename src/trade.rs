//! Bilateral sugar/spice bargaining.
//!
//! Each agent's marginal rate of substitution is
//! `(spice / spice_metabolism) / (sugar / sugar_metabolism)`. Two traders
//! settle on the geometric mean of their rates and swap one lot at a time
//! while both end up better off and their rates do not cross.

use crate::agent::{welfare, Agent};

/// Wealth and upkeep of one side of a trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trader {
    pub sugar: f64,
    pub spice: f64,
    pub sugar_metabolism: f64,
    pub spice_metabolism: f64,
}

impl From<&Agent> for Trader {
    fn from(agent: &Agent) -> Self {
        Self {
            sugar: agent.sugar,
            spice: agent.spice,
            sugar_metabolism: agent.sugar_metabolism(),
            spice_metabolism: agent.spice_metabolism(),
        }
    }
}

impl Trader {
    /// Marginal rate of substitution; `None` when either resource is not
    /// needed or not held
    pub fn mrs(&self) -> Option<f64> {
        if self.sugar <= 0.0
            || self.spice <= 0.0
            || self.sugar_metabolism <= 0.0
            || self.spice_metabolism <= 0.0
        {
            return None;
        }
        Some((self.spice / self.spice_metabolism) / (self.sugar / self.sugar_metabolism))
    }

    pub fn welfare(&self) -> f64 {
        welfare(self.sugar, self.spice, self.sugar_metabolism, self.spice_metabolism)
    }

    fn after(&self, sugar: f64, spice: f64) -> Trader {
        Trader {
            sugar: self.sugar + sugar,
            spice: self.spice + spice,
            ..*self
        }
    }
}

/// What a completed bargain exchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeOutcome {
    /// Number of lots swapped
    pub lots: u32,
    /// Price of each lot, in spice per sugar
    pub prices: Vec<f64>,
}

impl TradeOutcome {
    pub fn mean_price(&self) -> Option<f64> {
        if self.prices.is_empty() {
            None
        } else {
            Some(self.prices.iter().sum::<f64>() / self.prices.len() as f64)
        }
    }
}

/// Bargain until no further lot helps both sides; updates both traders
pub fn bargain(a: &mut Trader, b: &mut Trader) -> TradeOutcome {
    let mut outcome = TradeOutcome::default();
    loop {
        let (Some(mrs_a), Some(mrs_b)) = (a.mrs(), b.mrs()) else {
            break;
        };
        if mrs_a == mrs_b {
            break;
        }
        let price = (mrs_a * mrs_b).sqrt();
        // A high rate means sugar is scarce relative to spice
        let a_buys_sugar = mrs_a > mrs_b;
        let (sugar_lot, spice_lot) = if price >= 1.0 {
            (1.0, price)
        } else {
            (1.0 / price, 1.0)
        };

        let (next_a, next_b) = if a_buys_sugar {
            (a.after(sugar_lot, -spice_lot), b.after(-sugar_lot, spice_lot))
        } else {
            (a.after(-sugar_lot, spice_lot), b.after(sugar_lot, -spice_lot))
        };

        if next_a.sugar <= 0.0 || next_a.spice <= 0.0 || next_b.sugar <= 0.0 || next_b.spice <= 0.0 {
            break;
        }
        if next_a.welfare() <= a.welfare() || next_b.welfare() <= b.welfare() {
            break;
        }
        let (Some(new_a), Some(new_b)) = (next_a.mrs(), next_b.mrs()) else {
            break;
        };
        let crossed = if a_buys_sugar { new_a < new_b } else { new_a > new_b };
        if crossed {
            break;
        }

        *a = next_a;
        *b = next_b;
        outcome.lots += 1;
        outcome.prices.push(price);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trader(sugar: f64, spice: f64) -> Trader {
        Trader {
            sugar,
            spice,
            sugar_metabolism: 1.0,
            spice_metabolism: 1.0,
        }
    }

    #[test]
    fn test_mrs() {
        assert_eq!(trader(2.0, 8.0).mrs(), Some(4.0));
        assert_eq!(trader(0.0, 8.0).mrs(), None);
        let no_spice_need = Trader {
            spice_metabolism: 0.0,
            ..trader(2.0, 2.0)
        };
        assert_eq!(no_spice_need.mrs(), None);
    }

    #[test]
    fn test_bargain_improves_both_and_conserves() {
        let mut a = trader(2.0, 20.0);
        let mut b = trader(20.0, 2.0);
        let (wa, wb) = (a.welfare(), b.welfare());
        let total = (a.sugar + b.sugar, a.spice + b.spice);

        let outcome = bargain(&mut a, &mut b);
        assert!(outcome.lots > 0);
        assert!(a.welfare() > wa);
        assert!(b.welfare() > wb);
        assert!((a.sugar + b.sugar - total.0).abs() < 1e-9);
        assert!((a.spice + b.spice - total.1).abs() < 1e-9);
        // Rates have converged without crossing
        let (ra, rb) = (a.mrs().unwrap(), b.mrs().unwrap());
        assert!(ra >= rb);
        assert_eq!(outcome.mean_price().map(|p| p > 0.0), Some(true));
    }

    #[test]
    fn test_equal_rates_do_not_trade() {
        let mut a = trader(5.0, 5.0);
        let mut b = trader(3.0, 3.0);
        let outcome = bargain(&mut a, &mut b);
        assert_eq!(outcome.lots, 0);
        assert!(outcome.mean_price().is_none());
        assert_eq!(a, trader(5.0, 5.0));
    }
}
