//! Game content: scenarios, reflex challenges and the catalogs holding them.
//!
//! Catalogs are loaded once (embedded at compile time or read from a YAML
//! file) and shared immutably behind an `Arc` for the process lifetime.
//!
//! # Architecture
//!
//! - [`Scenario`] / [`ReflexChallenge`] - immutable content records
//! - [`Catalog`] - the two content lists, guaranteed to hold a default scenario
//! - [`selector`] - difficulty-windowed random picks
//! - [`builtin`] - catalogs compiled into the binary

pub mod builtin;
pub mod selector;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use selector::{DifficultyWindow, pick_reflex_challenge, pick_scenario};

/// Lowest difficulty a content record may declare.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest difficulty a content record may declare.
pub const MAX_DIFFICULTY: u8 = 10;

// ============================================================================
// Scenario
// ============================================================================

/// Channel a scenario arrives through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioCategory {
    /// An email message.
    Email,
    /// A web page, identified by its URL.
    Website,
    /// A text message.
    Sms,
    /// A phone call transcript.
    Call,
}

impl ScenarioCategory {
    /// Returns the upper-case banner shown above a scenario.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Website => "WEBSITE",
            Self::Sms => "SMS",
            Self::Call => "CALL",
        }
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single communication sample the player must judge as scam or legitimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier within a catalog (e.g. `"email-1"`).
    pub id: String,

    /// Channel the sample arrives through.
    pub category: ScenarioCategory,

    /// Short headline.
    pub title: String,

    /// Full text of the message, page or call.
    pub body: String,

    /// Claimed sender (address or phone number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// URL shown for website samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Ground truth.
    pub is_scam: bool,

    /// Shown to the player after they answer.
    pub explanation: String,

    /// Difficulty, `1..=10`.
    pub difficulty: u8,

    /// Telltale signs worth pointing out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<String>,
}

// ============================================================================
// Reflex Challenge
// ============================================================================

/// A command the player must retype exactly during the reflex mini-game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflexChallenge {
    /// Literal text to reproduce.
    pub command: String,

    /// Difficulty, `1..=10`.
    pub difficulty: u8,
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable pair of content lists used by the selector.
///
/// A catalog always holds at least one scenario; the first one is the
/// fixed default returned when a difficulty window is empty. The reflex
/// list may be empty, in which case every reflex round uses
/// [`selector::FALLBACK_REFLEX_COMMAND`].
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
    reflex: Vec<ReflexChallenge>,
}

impl Catalog {
    /// Builds a catalog from its two lists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `scenarios` is empty.
    pub fn new(
        scenarios: Vec<Scenario>,
        reflex: Vec<ReflexChallenge>,
    ) -> Result<Self, ConfigError> {
        if scenarios.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scenarios".to_string(),
                value: "[]".to_string(),
                expected: "at least one scenario".to_string(),
            });
        }
        Ok(Self { scenarios, reflex })
    }

    /// All scenarios, in catalog order.
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// All reflex challenges, in catalog order.
    #[must_use]
    pub fn reflex(&self) -> &[ReflexChallenge] {
        &self.reflex
    }

    /// The fixed default scenario (the first entry).
    #[must_use]
    pub fn default_scenario(&self) -> &Scenario {
        // Non-empty by construction.
        &self.scenarios[0]
    }

    /// Looks up a scenario by id.
    #[must_use]
    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn scenario(id: &str, difficulty: u8, is_scam: bool) -> Scenario {
        Scenario {
            id: id.to_string(),
            category: ScenarioCategory::Email,
            title: format!("title {id}"),
            body: format!("body {id}"),
            sender: None,
            url: None,
            is_scam,
            explanation: format!("explanation {id}"),
            difficulty,
            red_flags: vec![],
        }
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = Catalog::new(vec![], vec![]).unwrap_err();
        assert!(err.to_string().contains("scenarios"));
    }

    #[test]
    fn test_default_scenario_is_first() {
        let catalog =
            Catalog::new(vec![scenario("a", 5, true), scenario("b", 1, false)], vec![]).unwrap();
        assert_eq!(catalog.default_scenario().id, "a");
        assert_eq!(catalog.scenario("b").map(|s| s.difficulty), Some(1));
        assert!(catalog.scenario("zzz").is_none());
    }

    #[test]
    fn test_scenario_yaml_shape() {
        let yaml = r"
id: website-1
category: website
title: Login page
body: Please sign in
url: faceb00k-login.example
is_scam: true
explanation: Look-alike domain
difficulty: 3
red_flags:
  - zero instead of o
";
        let s: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(s.category, ScenarioCategory::Website);
        assert_eq!(s.url.as_deref(), Some("faceb00k-login.example"));
        assert!(s.sender.is_none());
        assert_eq!(s.red_flags.len(), 1);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ScenarioCategory::Sms.to_string(), "SMS");
        assert_eq!(ScenarioCategory::Call.label(), "CALL");
    }
}
