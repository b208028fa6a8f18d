//! Difficulty-windowed content selection.
//!
//! Both pickers are pure: given the same catalog, level and RNG state they
//! return the same record. No exhaustion is tracked, so the same scenario
//! may come up repeatedly, especially at the edges of the difficulty range.

use rand::Rng;

use super::{Catalog, MAX_DIFFICULTY, MIN_DIFFICULTY, ReflexChallenge, Scenario};

/// Command used when no reflex challenge fits the level.
pub const FALLBACK_REFLEX_COMMAND: &str = "sudo kill virus";

/// Inclusive difficulty range eligible for a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyWindow {
    /// Lowest eligible difficulty.
    pub min: u32,
    /// Highest eligible difficulty.
    pub max: u32,
}

impl DifficultyWindow {
    /// Window around `level`: `below` levels under it (floored at 1) up to
    /// two levels above it (capped at 10).
    const fn around(level: u32, below: u32) -> Self {
        let min = level.saturating_sub(below);
        let max = level.saturating_add(2);
        Self {
            min: if min < MIN_DIFFICULTY as u32 {
                MIN_DIFFICULTY as u32
            } else {
                min
            },
            max: if max > MAX_DIFFICULTY as u32 {
                MAX_DIFFICULTY as u32
            } else {
                max
            },
        }
    }

    /// Window for scenarios: `[max(1, level-2), min(level+2, 10)]`.
    #[must_use]
    pub const fn for_scenario(level: u32) -> Self {
        Self::around(level, 2)
    }

    /// Window for reflex challenges: `[max(1, level-3), min(level+2, 10)]`.
    #[must_use]
    pub const fn for_reflex(level: u32) -> Self {
        Self::around(level, 3)
    }

    /// Returns whether `difficulty` falls inside the window.
    #[must_use]
    pub const fn contains(self, difficulty: u8) -> bool {
        let d = difficulty as u32;
        d >= self.min && d <= self.max
    }
}

/// Draws a scenario for `level`, uniformly from the eligible set.
///
/// Falls back to the catalog's default scenario when nothing is eligible.
pub fn pick_scenario<'c, R: Rng + ?Sized>(
    catalog: &'c Catalog,
    level: u32,
    rng: &mut R,
) -> &'c Scenario {
    let window = DifficultyWindow::for_scenario(level);
    let eligible: Vec<&Scenario> = catalog
        .scenarios()
        .iter()
        .filter(|s| window.contains(s.difficulty))
        .collect();
    pick(&eligible, rng).unwrap_or_else(|| catalog.default_scenario())
}

/// Draws a reflex command for `level`, uniformly from the eligible set.
///
/// Falls back to [`FALLBACK_REFLEX_COMMAND`] when nothing is eligible.
pub fn pick_reflex_challenge<'c, R: Rng + ?Sized>(
    catalog: &'c Catalog,
    level: u32,
    rng: &mut R,
) -> &'c str {
    let window = DifficultyWindow::for_reflex(level);
    let eligible: Vec<&ReflexChallenge> = catalog
        .reflex()
        .iter()
        .filter(|c| window.contains(c.difficulty))
        .collect();
    pick(&eligible, rng).map_or(FALLBACK_REFLEX_COMMAND, |c| c.command.as_str())
}

fn pick<'a, T, R: Rng + ?Sized>(items: &[&'a T], rng: &mut R) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    Some(items[rng.random_range(0..items.len())])
}
