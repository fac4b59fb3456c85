//! Schedule rules attached to script descriptors.
//!
//! A rule is a predicate over a [`ScheduleContext`]; the scheduler evaluates it once per idle
//! tick. Rules are derived from a script's config (`runAtStartup`, `runEvery`, `runAt`);
//! several enabled fields combine with OR.

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use core_config::ScriptConfig;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleContext {
    pub now: DateTime<Local>,
    /// Last time the script was launched by the scheduler in this process.
    pub last_fired: Option<DateTime<Local>>,
    /// When the scheduler started watching the script.
    pub armed_at: DateTime<Local>,
}

pub trait SchedulePredicate: Debug + Send + Sync {
    fn is_due(&self, ctx: &ScheduleContext) -> bool;
    /// Short human readable form, e.g. `every 300s`.
    fn describe(&self) -> String;
}

/// Fires once per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupRule;

impl SchedulePredicate for StartupRule {
    fn is_due(&self, ctx: &ScheduleContext) -> bool {
        ctx.last_fired.is_none()
    }

    fn describe(&self) -> String {
        "at startup".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalRule {
    pub every: TimeDelta,
}

impl SchedulePredicate for IntervalRule {
    fn is_due(&self, ctx: &ScheduleContext) -> bool {
        let since = ctx.last_fired.unwrap_or(ctx.armed_at);
        ctx.now - since >= self.every
    }

    fn describe(&self) -> String {
        format!("every {}s", self.every.num_seconds())
    }
}

/// Fires once a day, at or after `time` (local).
#[derive(Debug, Clone, Copy)]
pub struct DailyAt {
    pub time: NaiveTime,
}

impl SchedulePredicate for DailyAt {
    fn is_due(&self, ctx: &ScheduleContext) -> bool {
        let now = ctx.now.naive_local();
        let occurrence = now.date().and_time(self.time);
        let floor = ctx
            .last_fired
            .map_or(ctx.armed_at, |l| l.max(ctx.armed_at))
            .naive_local();
        now >= occurrence && occurrence > floor
    }

    fn describe(&self) -> String {
        format!("daily at {}", self.time.format("%H:%M"))
    }
}

#[derive(Debug, Clone)]
pub struct AnyOf(pub Vec<Arc<dyn SchedulePredicate>>);

impl SchedulePredicate for AnyOf {
    fn is_due(&self, ctx: &ScheduleContext) -> bool {
        self.0.iter().any(|r| r.is_due(ctx))
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(|r| r.describe())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Build the rule for a script config. `startup` tells whether the launcher was started in
/// startup mode; `runAtStartup` is ignored otherwise.
pub fn rule_from_config(
    script: &str,
    cfg: &ScriptConfig,
    startup: bool,
) -> Option<Arc<dyn SchedulePredicate>> {
    let mut rules: Vec<Arc<dyn SchedulePredicate>> = Vec::new();
    if startup && cfg.run_at_startup() {
        rules.push(Arc::new(StartupRule));
    }
    let every = cfg.run_every_secs();
    if every > 0 {
        rules.push(Arc::new(IntervalRule {
            every: TimeDelta::seconds(every),
        }));
    }
    let at = cfg.run_at().trim();
    if !at.is_empty() {
        match NaiveTime::parse_from_str(at, "%H:%M") {
            Ok(time) => rules.push(Arc::new(DailyAt { time })),
            Err(e) => {
                warn!(target: "registry.scan", script, run_at = at, error = %e, "run_at_invalid")
            }
        }
    }
    match rules.len() {
        0 => None,
        1 => rules.pop(),
        _ => Some(Arc::new(AnyOf(rules))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_config::ConfigSchema;
    use core_config::schema::{RUN_AT, RUN_AT_STARTUP, RUN_EVERY};

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 12, h, m, 0).unwrap()
    }

    fn ctx(now: DateTime<Local>, last: Option<DateTime<Local>>, armed: DateTime<Local>) -> ScheduleContext {
        ScheduleContext {
            now,
            last_fired: last,
            armed_at: armed,
        }
    }

    #[test]
    fn startup_fires_once() {
        let r = StartupRule;
        assert!(r.is_due(&ctx(at(9, 0), None, at(9, 0))));
        assert!(!r.is_due(&ctx(at(9, 1), Some(at(9, 0)), at(9, 0))));
    }

    #[test]
    fn interval_counts_from_arming_then_last_fire() {
        let r = IntervalRule {
            every: TimeDelta::minutes(5),
        };
        assert!(!r.is_due(&ctx(at(9, 4), None, at(9, 0))));
        assert!(r.is_due(&ctx(at(9, 5), None, at(9, 0))));
        assert!(!r.is_due(&ctx(at(9, 7), Some(at(9, 5)), at(9, 0))));
        assert!(r.is_due(&ctx(at(9, 10), Some(at(9, 5)), at(9, 0))));
    }

    #[test]
    fn daily_fires_after_time_once() {
        let r = DailyAt {
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        };
        assert!(!r.is_due(&ctx(at(10, 0), None, at(8, 0))));
        assert!(r.is_due(&ctx(at(10, 45), None, at(8, 0))));
        assert!(!r.is_due(&ctx(at(10, 50), Some(at(10, 45)), at(8, 0))));
        // Started after today's time: wait for tomorrow.
        assert!(!r.is_due(&ctx(at(11, 0), None, at(10, 40))));
    }

    #[test]
    fn config_fields_combine() {
        let schema = Arc::new(ConfigSchema::builtin());
        let mut cfg = schema.defaults();
        assert!(rule_from_config("s", &cfg, true).is_none());

        cfg.set_from_text(RUN_AT_STARTUP, "true").unwrap();
        assert!(rule_from_config("s", &cfg, false).is_none());
        let r = rule_from_config("s", &cfg, true).unwrap();
        assert_eq!(r.describe(), "at startup");

        cfg.set_from_text(RUN_EVERY, "60").unwrap();
        cfg.set_from_text(RUN_AT, "07:15").unwrap();
        let r = rule_from_config("s", &cfg, true).unwrap();
        assert_eq!(r.describe(), "at startup or every 60s or daily at 07:15");

        cfg.set_from_text(RUN_AT_STARTUP, "false").unwrap();
        cfg.set_from_text(RUN_EVERY, "0").unwrap();
        cfg.set_from_text(RUN_AT, "25:99").unwrap();
        assert!(rule_from_config("s", &cfg, true).is_none());
    }
}
