//! Catalog validation
//!
//! Validation runs on the raw deserialized [`CatalogDocument`] before a
//! [`Catalog`](crate::content::Catalog) is built, and collects every issue
//! rather than stopping at the first one.

use std::collections::HashSet;

use crate::config::loader::CatalogDocument;
use crate::content::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Result of catalog validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

/// Catalog validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a catalog document and returns every issue found.
    pub fn validate(&mut self, doc: &CatalogDocument) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_scenarios(doc);
        self.validate_reflex(doc);
        self.validate_coverage(doc);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    fn validate_scenarios(&mut self, doc: &CatalogDocument) {
        if doc.scenarios.is_empty() {
            self.add_error("scenarios", "Catalog must contain at least one scenario");
            return;
        }

        let mut seen_ids = HashSet::new();
        for (i, scenario) in doc.scenarios.iter().enumerate() {
            let path = format!("scenarios[{i}]");

            if scenario.id.trim().is_empty() {
                self.add_error(&format!("{path}.id"), "Scenario id cannot be empty");
            } else if !seen_ids.insert(scenario.id.as_str()) {
                self.add_error(
                    &format!("{path}.id"),
                    &format!("Duplicate scenario id '{}'", scenario.id),
                );
            }

            self.check_difficulty(&path, scenario.difficulty);

            for (field, value) in [
                ("title", &scenario.title),
                ("body", &scenario.body),
                ("explanation", &scenario.explanation),
            ] {
                if value.trim().is_empty() {
                    self.add_error(
                        &format!("{path}.{field}"),
                        &format!("Scenario {field} cannot be empty"),
                    );
                }
            }
        }
    }

    // ========================================================================
    // Reflex challenges
    // ========================================================================

    fn validate_reflex(&mut self, doc: &CatalogDocument) {
        if doc.reflex.is_empty() {
            self.add_warning(
                "reflex",
                "No reflex challenges; every reflex round will use the fallback command",
            );
            return;
        }

        let mut seen = HashSet::new();
        for (i, challenge) in doc.reflex.iter().enumerate() {
            let path = format!("reflex[{i}]");
            if challenge.command.trim().is_empty() {
                self.add_error(&format!("{path}.command"), "Reflex command cannot be empty");
            } else if !seen.insert(challenge.command.as_str()) {
                self.add_warning(
                    &format!("{path}.command"),
                    &format!("Duplicate reflex command '{}'", challenge.command),
                );
            }
            self.check_difficulty(&path, challenge.difficulty);
        }
    }

    // ========================================================================
    // Coverage
    // ========================================================================

    /// Warns about difficulty levels that no scenario covers.
    fn validate_coverage(&mut self, doc: &CatalogDocument) {
        if doc.scenarios.is_empty() {
            return;
        }
        let covered: HashSet<u8> = doc.scenarios.iter().map(|s| s.difficulty).collect();
        let missing: Vec<String> = (MIN_DIFFICULTY..=MAX_DIFFICULTY)
            .filter(|d| !covered.contains(d))
            .map(|d| d.to_string())
            .collect();
        if !missing.is_empty() {
            self.add_warning(
                "scenarios",
                &format!("No scenario with difficulty {}", missing.join(", ")),
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_difficulty(&mut self, path: &str, difficulty: u8) {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            self.add_error(
                &format!("{path}.difficulty"),
                &format!(
                    "Difficulty {difficulty} is outside {MIN_DIFFICULTY}..={MAX_DIFFICULTY}"
                ),
            );
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
