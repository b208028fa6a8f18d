//! Game balancing rules.
//!
//! The defaults are the shipped balance: 10 levels, a 20 s decision
//! countdown and a 5 s reflex countdown ticking every 100 ms, +100 score
//! and +50 money per correct answer, -25 HP per wrong answer, -15 HP per
//! failed reflex round, -10 HP per decision timeout and a 30% chance of a
//! reflex round after each correct answer.
//!
//! Rules can be overridden from a YAML file; durations use humantime
//! notation (`"20s"`, `"100ms"`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// HP ceiling; sessions start at or below it.
pub const MAX_HP: u32 = 100;

/// Tunable game constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameRules {
    /// Last playable level; a correct answer on it wins the session.
    pub max_level: u32,

    /// HP at session start.
    pub starting_hp: u32,

    /// Decision countdown length.
    #[serde(with = "humantime_duration")]
    pub decision_time: Duration,

    /// Reflex countdown length.
    #[serde(with = "humantime_duration")]
    pub reflex_time: Duration,

    /// Countdown tick period (one tick is one decrement).
    #[serde(with = "humantime_duration")]
    pub tick: Duration,

    /// Score per correct answer.
    pub correct_score: u32,

    /// Money per correct answer.
    pub correct_money: u32,

    /// Score for a successful reflex round.
    pub reflex_bonus: u32,

    /// HP lost per wrong answer.
    pub wrong_answer_penalty: u32,

    /// HP lost per failed or expired reflex round.
    pub reflex_penalty: u32,

    /// HP lost each time the decision countdown expires.
    pub timeout_penalty: u32,

    /// Probability of a reflex round after a correct answer.
    pub reflex_chance: f64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_level: 10,
            starting_hp: MAX_HP,
            decision_time: Duration::from_secs(20),
            reflex_time: Duration::from_secs(5),
            tick: Duration::from_millis(100),
            correct_score: 100,
            correct_money: 50,
            reflex_bonus: 50,
            wrong_answer_penalty: 25,
            reflex_penalty: 15,
            timeout_penalty: 10,
            reflex_chance: 0.30,
        }
    }
}

impl GameRules {
    /// Loads rules from a YAML file; omitted fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFile`, `ConfigError::ParseError`, or
    /// `ConfigError::InvalidValue` if the rules fail [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        Self::from_yaml(&raw, path)
    }

    /// Parses rules from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` on malformed YAML and
    /// `ConfigError::InvalidValue` if validation fails.
    pub fn from_yaml(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let rules: Self = serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from(origin),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Checks that the rules describe a playable game.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_level == 0 {
            return Err(invalid("max_level", "0", "at least 1"));
        }
        if self.starting_hp == 0 || self.starting_hp > MAX_HP {
            return Err(invalid(
                "starting_hp",
                &self.starting_hp.to_string(),
                &format!("1..={MAX_HP}"),
            ));
        }
        if self.tick.is_zero() {
            return Err(invalid("tick", "0s", "a positive duration"));
        }
        for (field, countdown) in [
            ("decision_time", self.decision_time),
            ("reflex_time", self.reflex_time),
        ] {
            if countdown < self.tick {
                return Err(invalid(
                    field,
                    &humantime::format_duration(countdown).to_string(),
                    "at least one tick",
                ));
            }
            if u32::try_from(countdown.as_nanos() / self.tick.as_nanos()).is_err() {
                return Err(invalid(
                    field,
                    &humantime::format_duration(countdown).to_string(),
                    "fewer than 2^32 ticks",
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.reflex_chance) {
            return Err(invalid(
                "reflex_chance",
                &self.reflex_chance.to_string(),
                "a probability between 0 and 1",
            ));
        }
        Ok(())
    }

    /// Number of ticks in a full decision countdown.
    #[must_use]
    pub fn decision_ticks(&self) -> u32 {
        ticks_in(self.decision_time, self.tick)
    }

    /// Number of ticks in a full reflex countdown.
    #[must_use]
    pub fn reflex_ticks(&self) -> u32 {
        ticks_in(self.reflex_time, self.tick)
    }

    /// Converts a tick count back into seconds.
    #[must_use]
    pub fn ticks_to_secs(&self, ticks: u32) -> f64 {
        self.tick.as_secs_f64() * f64::from(ticks)
    }
}

fn ticks_in(countdown: Duration, tick: Duration) -> u32 {
    if tick.is_zero() {
        return 0;
    }
    u32::try_from(countdown.as_nanos() / tick.as_nanos()).unwrap_or(u32::MAX)
}

fn invalid(field: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
