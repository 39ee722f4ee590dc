/// Farm engine — Timed Production
///
/// One state machine shared by every production cycle:
///
///   Idle (startTime = null) -> Running (startTime = t0)
///   Running is observed as Ready once `now - t0 >= effective duration`
///   collect -> Idle
///
/// Readiness is never stored. The effective duration is recomputed from
/// live bonuses on every read, so a bonus change shifts the remaining
/// wait of a cycle that is already running.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::Millis;
use crate::bonus::BonusBundle;
use crate::catalog::Tuning;
use crate::domain::RecruiterState;
use crate::outcome::Rejection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedProduction {
    #[serde(default)]
    pub start_time: Option<Millis>,
}

/// How a cycle's base duration is shortened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationRule {
    /// `base * (1 - reduction)`.
    Scaled { base: Millis, reduction: f64 },
    /// `max(floor, base - reduction)`.
    Shortened {
        base: Millis,
        reduction: Millis,
        floor: Millis,
    },
}

impl DurationRule {
    pub fn effective(&self) -> Millis {
        match *self {
            DurationRule::Scaled { base, reduction } => {
                let scaled = base as f64 * (1.0 - reduction);
                scaled.max(0.0).floor() as Millis
            }
            DurationRule::Shortened {
                base,
                reduction,
                floor,
            } => base.saturating_sub(reduction).max(floor),
        }
    }

    /// Rule for one cycle given the live bonus bundle.
    pub fn for_cycle(
        cycle: Cycle,
        bonus: &BonusBundle,
        recruiter: &RecruiterState,
        tuning: &Tuning,
    ) -> Self {
        let scaled = |base, reduction| DurationRule::Scaled { base, reduction };
        match cycle {
            Cycle::CropGrowth => scaled(tuning.grow_time_ms, bonus.crop_time_reduction),
            Cycle::Mining => scaled(tuning.mining_duration_ms, bonus.mine_time_reduction),
            Cycle::RuinProfit => scaled(tuning.ruin_profit_duration_ms, bonus.ruin_time_reduction),
            Cycle::TenantProfit => {
                scaled(tuning.tenant_profit_duration_ms, bonus.tenant_time_reduction)
            }
            Cycle::CountryProduction => scaled(
                tuning.country_production_duration_ms,
                bonus.country_time_reduction,
            ),
            Cycle::Recruitment => DurationRule::Shortened {
                base: tuning.recruitment_base_duration_ms,
                reduction: recruiter
                    .time_reduction_items
                    .saturating_mul(tuning.recruiter_item_time_reduction_ms),
                floor: tuning.recruitment_min_duration_ms,
            },
        }
    }
}

/// Every production cycle in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    CropGrowth,
    Mining,
    RuinProfit,
    TenantProfit,
    CountryProduction,
    Recruitment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running { remaining: Millis },
    Ready,
}

/// Pure readiness check on a raw start time.
pub fn elapsed_at_least(start: Millis, now: Millis, duration: Millis) -> bool {
    now.saturating_sub(start) >= duration
}

impl TimedProduction {
    pub fn idle() -> Self {
        Self { start_time: None }
    }

    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn phase(&self, now: Millis, rule: &DurationRule) -> Phase {
        match self.start_time {
            None => Phase::Idle,
            Some(start) => {
                let duration = rule.effective();
                if elapsed_at_least(start, now, duration) {
                    Phase::Ready
                } else {
                    Phase::Running {
                        remaining: duration - now.saturating_sub(start),
                    }
                }
            }
        }
    }

    pub fn is_ready(&self, now: Millis, rule: &DurationRule) -> bool {
        self.phase(now, rule) == Phase::Ready
    }

    /// Idle -> Running.
    pub fn start(&mut self, now: Millis) -> Result<(), Rejection> {
        if self.is_running() {
            return Err(Rejection::WrongPhase("cycle already running"));
        }
        self.start_time = Some(now);
        Ok(())
    }

    /// Ready -> Idle, returning whatever `yield_fn` computes at this
    /// instant. Nothing is captured at start time.
    pub fn collect<T>(
        &mut self,
        now: Millis,
        rule: &DurationRule,
        yield_fn: impl FnOnce() -> Result<T, Rejection>,
    ) -> Result<T, Rejection> {
        match self.phase(now, rule) {
            Phase::Idle => Err(Rejection::WrongPhase("cycle is idle")),
            Phase::Running { .. } => Err(Rejection::WrongPhase("cycle not ready")),
            Phase::Ready => {
                let produced = yield_fn()?;
                self.start_time = None;
                Ok(produced)
            }
        }
    }
}

/// Per-entity timer lookup; a missing key is an idle cycle.
pub fn keyed(map: &BTreeMap<String, TimedProduction>, id: &str) -> TimedProduction {
    map.get(id).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_seconds() -> DurationRule {
        DurationRule::Scaled {
            base: 10_000,
            reduction: 0.0,
        }
    }

    #[test]
    fn test_scaled_rule() {
        let rule = DurationRule::Scaled {
            base: 600_000,
            reduction: 0.1,
        };
        assert_eq!(rule.effective(), 540_000);
    }

    #[test]
    fn test_scaled_rule_never_negative() {
        let rule = DurationRule::Scaled {
            base: 600_000,
            reduction: 1.5,
        };
        assert_eq!(rule.effective(), 0);
    }

    #[test]
    fn test_shortened_rule_respects_floor() {
        let rule = DurationRule::Shortened {
            base: 86_400_000,
            reduction: 100 * 1_800_000,
            floor: 3_600_000,
        };
        assert_eq!(rule.effective(), 3_600_000);
        let mild = DurationRule::Shortened {
            base: 86_400_000,
            reduction: 1_800_000,
            floor: 3_600_000,
        };
        assert_eq!(mild.effective(), 84_600_000);
    }

    #[test]
    fn test_lifecycle() {
        let rule = ten_seconds();
        let mut t = TimedProduction::idle();
        assert_eq!(t.phase(0, &rule), Phase::Idle);
        t.start(1_000).unwrap();
        assert_eq!(t.phase(5_000, &rule), Phase::Running { remaining: 6_000 });
        assert!(t.is_ready(11_000, &rule));
        let got = t.collect(11_000, &rule, || Ok(7)).unwrap();
        assert_eq!(got, 7);
        assert_eq!(t, TimedProduction::idle());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut t = TimedProduction::idle();
        t.start(0).unwrap();
        assert!(t.start(1).is_err());
        assert_eq!(t.start_time, Some(0));
    }

    #[test]
    fn test_collect_before_ready_keeps_timer() {
        let rule = ten_seconds();
        let mut t = TimedProduction::idle();
        t.start(0).unwrap();
        let err = t.collect(9_999, &rule, || Ok(())).unwrap_err();
        assert_eq!(err, Rejection::WrongPhase("cycle not ready"));
        assert_eq!(t.start_time, Some(0));
    }

    #[test]
    fn test_yield_runs_only_when_ready() {
        let rule = ten_seconds();
        let mut t = TimedProduction { start_time: Some(0) };
        let mut calls = 0;
        let mut count = || -> Result<(), Rejection> {
            calls += 1;
            Ok(())
        };
        assert!(t.collect(5_000, &rule, &mut count).is_err());
        t.collect(10_000, &rule, &mut count).unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failed_yield_keeps_timer_running() {
        let rule = ten_seconds();
        let mut t = TimedProduction { start_time: Some(0) };
        let res: Result<(), _> = t.collect(20_000, &rule, || Err(Rejection::NothingToDo));
        assert!(res.is_err());
        assert!(t.is_running());
    }

    #[test]
    fn test_bonus_change_moves_remaining_not_start() {
        let t = TimedProduction { start_time: Some(0) };
        let slow = DurationRule::Scaled {
            base: 100_000,
            reduction: 0.0,
        };
        let fast = DurationRule::Scaled {
            base: 100_000,
            reduction: 0.5,
        };
        assert_eq!(t.phase(40_000, &slow), Phase::Running { remaining: 60_000 });
        assert_eq!(t.phase(40_000, &fast), Phase::Running { remaining: 10_000 });
        assert_eq!(t.start_time, Some(0));
    }

    #[test]
    fn test_keyed_absent_is_idle() {
        let map = BTreeMap::new();
        assert_eq!(keyed(&map, "tenant_1"), TimedProduction::idle());
    }
}
