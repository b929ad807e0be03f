//! # Price Reduction Strategies
//!
//! A strategy turns auction parameters into a finite sequence of
//! `(price, lock time)` ticks. Only one is defined today, the linear decay:
//!
//! ```text
//! steps     = floor((end_time - start_time) / step_duration)
//! decrement = floor((start_price - end_price) / (steps - 1))
//! tick i    = { price: start_price - decrement * i,
//!               lock_time: floor((start_time + step_duration * i) / 1000) }
//! ```
//!
//! Times go in as milliseconds and come out as seconds, because that is
//! what transaction lock times are.
//!
//! Strategies are picked by name through a [`StrategyRegistry`]. The set of
//! names is closed ([`ReductionStrategy`]); the implementation behind each
//! name can be swapped, which is handy in tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::MILLIS_PER_SECOND;
use crate::error::ValidationError;

/// Raw schedule inputs. Times are Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleParams {
    pub start_time: u64,
    pub end_time: u64,
    pub start_price: u64,
    pub end_price: u64,
    pub step_duration: u64,
}

impl ScheduleParams {
    /// Number of ticks the window holds. Zero for degenerate inputs.
    pub fn step_count(&self) -> u64 {
        match self.step_duration {
            0 => 0,
            step => self.end_time.saturating_sub(self.start_time) / step,
        }
    }
}

/// One point on the price curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    pub price: u64,
    /// Unix seconds.
    pub lock_time: u64,
}

// ---------------------------------------------------------------------------
// Linear Schedule
// ---------------------------------------------------------------------------

/// Lazy iterator over the linear decay. Clone it to restart.
#[derive(Debug, Clone)]
pub struct LinearSchedule {
    start_time: u64,
    start_price: u64,
    step_duration: u64,
    decrement: u64,
    step_count: u64,
    current: u64,
}

impl LinearSchedule {
    pub fn new(params: &ScheduleParams) -> Self {
        let step_count = params.step_count();
        let spread = params.start_price.saturating_sub(params.end_price);
        let decrement = match step_count {
            0 | 1 => 0,
            n => spread / (n - 1),
        };
        Self {
            start_time: params.start_time,
            start_price: params.start_price,
            step_duration: params.step_duration,
            decrement,
            step_count,
            current: 0,
        }
    }
}

impl Iterator for LinearSchedule {
    type Item = PriceTick;

    fn next(&mut self) -> Option<PriceTick> {
        if self.current >= self.step_count {
            return None;
        }
        let i = self.current;
        self.current += 1;

        let price = self
            .start_price
            .saturating_sub(self.decrement.saturating_mul(i));
        let millis = self
            .start_time
            .saturating_add(self.step_duration.saturating_mul(i));
        Some(PriceTick {
            price,
            lock_time: millis / MILLIS_PER_SECOND,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.step_count - self.current).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl ExactSizeIterator for LinearSchedule {}

fn linear(params: &ScheduleParams) -> Box<dyn Iterator<Item = PriceTick> + Send> {
    Box::new(LinearSchedule::new(params))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Produces the tick sequence for a set of parameters.
pub type StrategyFn = fn(&ScheduleParams) -> Box<dyn Iterator<Item = PriceTick> + Send>;

/// Every strategy name the protocol knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReductionStrategy {
    Linear,
}

impl ReductionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReductionStrategy::Linear => "LINEAR",
        }
    }
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReductionStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LINEAR" => Ok(ReductionStrategy::Linear),
            other => Err(ValidationError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Maps strategy names to implementations.
#[derive(Clone)]
pub struct StrategyRegistry {
    entries: HashMap<ReductionStrategy, StrategyFn>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ReductionStrategy::Linear, linear);
        registry
    }
}

impl StrategyRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Install (or replace) the implementation for `strategy`.
    pub fn register(&mut self, strategy: ReductionStrategy, f: StrategyFn) {
        self.entries.insert(strategy, f);
    }

    pub fn get(&self, strategy: ReductionStrategy) -> Result<StrategyFn, ValidationError> {
        self.entries
            .get(&strategy)
            .copied()
            .ok_or_else(|| ValidationError::UnknownStrategy(strategy.to_string()))
    }

    /// Look a strategy up by its wire name.
    pub fn resolve(&self, name: &str) -> Result<StrategyFn, ValidationError> {
        self.get(name.parse()?)
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: u64 = 86_400_000;

    fn week_params() -> ScheduleParams {
        ScheduleParams {
            start_time: 0,
            end_time: 7 * DAY_MS,
            start_price: 1_000_000,
            end_price: 500_000,
            step_duration: DAY_MS,
        }
    }

    #[test]
    fn week_long_daily_schedule() {
        let ticks: Vec<_> = LinearSchedule::new(&week_params()).collect();
        assert_eq!(ticks.len(), 7);
        assert_eq!(
            ticks[0],
            PriceTick {
                price: 1_000_000,
                lock_time: 0
            }
        );
        assert_eq!(
            ticks[6],
            PriceTick {
                price: 500_002,
                lock_time: 518_400
            }
        );
    }

    #[test]
    fn strictly_monotonic() {
        let params = ScheduleParams {
            start_time: 1_600_000_000_000,
            end_time: 1_600_000_000_000 + 10 * 3_600_000,
            start_price: 90_000,
            end_price: 10_000,
            step_duration: 3_600_000,
        };
        let ticks: Vec<_> = LinearSchedule::new(&params).collect();
        assert_eq!(ticks.len() as u64, params.step_count());
        for pair in ticks.windows(2) {
            assert!(pair[0].price > pair[1].price);
            assert!(pair[0].lock_time < pair[1].lock_time);
        }
    }

    #[test]
    fn clone_restarts() {
        let schedule = LinearSchedule::new(&week_params());
        let mut first = schedule.clone();
        first.next();
        first.next();
        assert_eq!(first.len(), 5);
        assert_eq!(schedule.count(), 7);
    }

    #[test]
    fn degenerate_params_yield_nothing_or_flat() {
        let mut p = week_params();
        p.step_duration = 0;
        assert_eq!(LinearSchedule::new(&p).count(), 0);

        p.step_duration = 7 * DAY_MS;
        let ticks: Vec<_> = LinearSchedule::new(&p).collect();
        assert_eq!(ticks, vec![PriceTick { price: 1_000_000, lock_time: 0 }]);
    }

    #[test]
    fn registry_resolves_by_name() {
        let registry = StrategyRegistry::default();
        let f = registry.resolve("LINEAR").unwrap();
        assert_eq!(f(&week_params()).count(), 7);
        assert_eq!(
            registry.resolve("EXPONENTIAL").err(),
            Some(ValidationError::UnknownStrategy("EXPONENTIAL".into()))
        );
        assert!(StrategyRegistry::empty()
            .get(ReductionStrategy::Linear)
            .is_err());
    }

    #[test]
    fn registry_accepts_replacement() {
        fn flat(params: &ScheduleParams) -> Box<dyn Iterator<Item = PriceTick> + Send> {
            Box::new(std::iter::once(PriceTick {
                price: params.end_price,
                lock_time: 0,
            }))
        }
        let mut registry = StrategyRegistry::default();
        registry.register(ReductionStrategy::Linear, flat);
        let ticks: Vec<_> = registry.get(ReductionStrategy::Linear).unwrap()(&week_params()).collect();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].price, 500_000);
    }
}
