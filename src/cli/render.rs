//! Terminal rendering for the `play` command.
//!
//! Every function returns a `String` so the screen layout can be tested
//! without a terminal.

use std::fmt::Write as _;

use crate::content::Scenario;
use crate::session::{AnswerFeedback, GameStatus, SessionResult, SessionSnapshot};

const RULE: &str = "------------------------------------------------------------";

/// The scenario card shown while a decision is pending.
#[must_use]
pub fn scenario_card(scenario: &Scenario) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "[{}] {}", scenario.category.label(), scenario.title);
    if let Some(sender) = &scenario.sender {
        let _ = writeln!(out, "From: {sender}");
    }
    if let Some(url) = &scenario.url {
        let _ = writeln!(out, "URL:  {url}");
    }
    let _ = writeln!(out);
    for line in scenario.body.lines() {
        let _ = writeln!(out, "  {line}");
    }
    let _ = writeln!(out, "{RULE}");
    out.push_str("Is this a scam? [s]cam / [l]egit / [q]uit");
    out
}

/// One-line summary of the player's progress.
#[must_use]
pub fn status_line(snap: &SessionSnapshot) -> String {
    format!(
        "Level {}/{}  HP {}  Score {}  Money ${}  Time {:.1}s",
        snap.level,
        snap.max_level,
        snap.hp,
        snap.score,
        snap.money,
        if snap.reflex_active {
            snap.reflex_time_remaining
        } else {
            snap.decision_time_remaining
        }
    )
}

/// The reflex mini-game prompt.
#[must_use]
pub fn reflex_prompt(snap: &SessionSnapshot) -> String {
    let command = snap.reflex_challenge.as_deref().unwrap_or_default();
    format!(
        "!! SYSTEM BREACH !! Type the command exactly within {:.1}s:\n    {command}",
        snap.reflex_time_remaining
    )
}

/// Verdict shown after an answer.
#[must_use]
pub fn feedback(fb: &AnswerFeedback) -> String {
    let verdict = if fb.is_correct { "CORRECT" } else { "WRONG" };
    format!("{verdict}: {}", fb.explanation)
}

/// What the current screen should show.
#[must_use]
pub fn screen(snap: &SessionSnapshot) -> String {
    match snap.status {
        GameStatus::Playing if snap.reflex_active => {
            format!("{}\n{}", status_line(snap), reflex_prompt(snap))
        }
        GameStatus::Playing => snap.current_scenario.as_ref().map_or_else(
            || status_line(snap),
            |scenario| format!("{}\n{}", status_line(snap), scenario_card(scenario)),
        ),
        GameStatus::Won | GameStatus::Lost => summary(snap, None),
        GameStatus::Menu => "Back at the menu.".to_string(),
    }
}

/// End-of-game summary.
#[must_use]
pub fn summary(snap: &SessionSnapshot, result: Option<&SessionResult>) -> String {
    let headline = match snap.status {
        GameStatus::Won => "YOU WIN! Every threat spotted.",
        GameStatus::Lost => "GAME OVER. Your defenses are down.",
        GameStatus::Playing | GameStatus::Menu => "Session ended.",
    };
    let mut out = format!(
        "{headline}\nReached level {}  Score {}  Money ${}",
        snap.level, snap.score, snap.money
    );
    if result.is_some_and(|r| r.is_new_best) {
        out.push_str("\nNEW HIGH SCORE!");
    }
    out
}

/// Describes a change the player did not cause (a countdown expiring).
///
/// Returns `None` for plain countdown ticks.
#[must_use]
pub fn describe_change(prev: &SessionSnapshot, next: &SessionSnapshot) -> Option<String> {
    if prev.session_id != next.session_id || prev.status != GameStatus::Playing {
        return None;
    }
    let lost_hp = prev.hp.saturating_sub(next.hp);
    let mut out = if prev.reflex_active && !next.reflex_active {
        format!("Too slow! The breach spread. -{lost_hp} HP")
    } else if lost_hp > 0 {
        format!("Time's up! -{lost_hp} HP")
    } else {
        return None;
    };
    if next.status == GameStatus::Playing {
        out.push('\n');
        out.push_str(&screen(next));
    }
    Some(out)
}
