//! Expected capture duration
//!
//! The nominal airtime minus a fixed margin, adjusted by the first matching
//! rule of an operator-supplied table.

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::{DurationRuleConfig, RecordingConfig};
use crate::errors::{AppError, AppResult};
use crate::models::Program;

#[derive(Debug, Clone)]
pub struct DurationRule {
    pub name: String,
    channel: Option<Regex>,
    weekday: Option<Weekday>,
    end_time: Option<NaiveTime>,
    pub extra_secs: i64,
}

impl DurationRule {
    pub fn from_config(config: &DurationRuleConfig) -> AppResult<Self> {
        let channel = config
            .channel
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Rule '{}': invalid channel pattern: {}",
                    config.name, e
                ))
            })?;
        let end_time = config
            .end_time
            .as_deref()
            .map(|t| NaiveTime::parse_from_str(t, "%H:%M"))
            .transpose()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Rule '{}': end_time must be HH:MM: {}",
                    config.name, e
                ))
            })?;

        Ok(Self {
            name: config.name.clone(),
            channel,
            weekday: config.weekday,
            end_time,
            extra_secs: config.extra,
        })
    }

    /// Every condition that is set must hold; a rule without conditions matches everything.
    pub fn matches(&self, program: &Program, tz: &Tz) -> bool {
        let end = program.end_time.with_timezone(tz);
        self.channel
            .as_ref()
            .is_none_or(|re| re.is_match(&program.channel_name))
            && self.weekday.is_none_or(|day| end.weekday() == day)
            && self
                .end_time
                .is_none_or(|t| end.hour() == t.hour() && end.minute() == t.minute())
    }
}

#[derive(Debug, Clone)]
pub struct DurationPolicy {
    base_margin_secs: i64,
    rules: Vec<DurationRule>,
    tz: Tz,
}

impl DurationPolicy {
    pub fn new(base_margin_secs: i64, rules: Vec<DurationRule>, tz: Tz) -> Self {
        Self {
            base_margin_secs,
            rules,
            tz,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> AppResult<Self> {
        let tz = config.timezone.parse::<Tz>().map_err(|e| {
            AppError::configuration(format!("Invalid timezone '{}': {}", config.timezone, e))
        })?;
        let rules = config
            .duration_rules
            .iter()
            .map(DurationRule::from_config)
            .collect::<AppResult<Vec<_>>>()?;
        let base_margin_secs = i64::try_from(config.base_margin.as_secs())
            .map_err(|_| AppError::configuration("recording.base_margin is too large"))?;
        Ok(Self::new(base_margin_secs, rules, tz))
    }

    pub fn matching_rule(&self, program: &Program) -> Option<&DurationRule> {
        self.rules.iter().find(|rule| rule.matches(program, &self.tz))
    }

    /// Seconds the capture tool should run for. Never negative.
    pub fn expected_duration(&self, program: &Program) -> i64 {
        let extra = self.matching_rule(program).map_or(0, |rule| rule.extra_secs);
        (program.airtime_secs() - self.base_margin_secs + extra).max(0)
    }
}
