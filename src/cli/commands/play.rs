//! `play` command handler
//!
//! Runs an interactive session on the terminal. Input is line based:
//! `s`/`scam` and `l`/`legit` answer, typed text during a reflex round is
//! checked against the command, `q` leaves. Countdown expiries are reported
//! as they happen by watching the controller's snapshots.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::cli::args::PlayArgs;
use crate::cli::render;
use crate::config::{CatalogLoader, GameRules, LoaderOptions};
use crate::content::Catalog;
use crate::content::builtin::builtin_catalog;
use crate::error::ScamDrillError;
use crate::observability::EventEmitter;
use crate::session::{
    GameStatus, MemoryScoreSink, PlayerProfile, ReflexOutcome, SessionController, SessionSnapshot,
};

/// A parsed line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Claim the scenario is a scam.
    Scam,
    /// Claim the scenario is legitimate.
    Legit,
    /// Leave the game.
    Quit,
    /// Play another round after a finished game.
    Again,
    /// Anything else; during a reflex round this is the attempt.
    Text(String),
}

impl Input {
    /// Parses one line, ignoring surrounding whitespace for commands.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "scam" => Self::Scam,
            "l" | "legit" => Self::Legit,
            "q" | "quit" | "exit" => Self::Quit,
            "y" | "yes" => Self::Again,
            _ => Self::Text(line.to_string()),
        }
    }
}

/// Play an interactive session.
///
/// # Errors
///
/// Returns a config error if the catalog or rules cannot be loaded, or an
/// I/O error if the events file or metrics endpoint cannot be opened.
pub async fn run(args: &PlayArgs, cancel: CancellationToken) -> Result<(), ScamDrillError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let catalog = load_catalog(args.catalog.as_deref())?;
    let rules = match &args.rules {
        Some(path) => {
            tracing::info!(rules = %path.display(), "loading rules");
            GameRules::load(path)?
        }
        None => GameRules::default(),
    };

    let events = Arc::new(match args.events_file.as_deref() {
        Some(path) if path == Path::new("-") => EventEmitter::stderr(),
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let sink = Arc::new(MemoryScoreSink::new());
    let mut controller =
        SessionController::new(catalog, rules, sink.clone())?.with_events(events.clone());
    if let Some(seed) = args.seed {
        controller = controller.with_rng(StdRng::seed_from_u64(seed));
    }
    let controller = Arc::new(controller);

    let profile = PlayerProfile {
        id: args.player_id.clone().unwrap_or_else(|| args.player.clone()),
        username: args.player.clone(),
        owned_items: args.items.iter().cloned().collect(),
    };

    println!("Welcome, {}. Spot the scams before they get you.", profile.username);
    controller.start(Some(&profile));

    let mut rx = controller.subscribe();
    let mut seen = rx.borrow_and_update().clone();
    println!("{}", render::screen(&seen));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                controller.end().await;
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = rx.borrow_and_update().clone();
                if let Some(text) = render::describe_change(&seen, &next) {
                    println!("{text}");
                    if next.status.is_terminal() {
                        offer_replay(&controller, &next).await;
                    }
                }
                seen = next;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.end().await;
                    break;
                };
                if !handle_line(&controller, &line).await {
                    break;
                }
                seen = rx.borrow_and_update().clone();
            }
        }
    }

    if let Some(best) = sink.best(&profile.id) {
        println!(
            "Best this run: score {} (level {}, ${})",
            best.score, best.level, best.money
        );
    }
    controller.shutdown();
    tracing::debug!(events = events.event_count(), "play finished");
    Ok(())
}

/// Applies one line of input; returns `false` when the player leaves.
async fn handle_line(controller: &Arc<SessionController>, line: &str) -> bool {
    let input = Input::parse(line);
    let snap = controller.snapshot();
    match snap.status {
        GameStatus::Playing => {
            if input == Input::Quit {
                controller.end().await;
                println!("{}", render::summary(&controller.snapshot(), controller.result().as_ref()));
                return false;
            }
            if snap.reflex_active {
                let attempt = line.trim_end_matches(['\r', '\n']);
                match controller.submit_reflex_input(attempt).await {
                    Some(ReflexOutcome::Cleared) => {
                        println!("Threat neutralized! +{} score", controller.rules().reflex_bonus);
                        println!("{}", render::screen(&controller.snapshot()));
                    }
                    _ => println!("Not quite. Keep typing!"),
                }
                return true;
            }
            let claim = match input {
                Input::Scam => true,
                Input::Legit => false,
                _ => {
                    println!("{}", render::status_line(&snap));
                    println!("Answer with [s]cam or [l]egit, [q] to quit.");
                    return true;
                }
            };
            if let Some(fb) = controller.answer(claim).await {
                println!("{}", render::feedback(&fb));
                let next = controller.snapshot();
                if next.status.is_terminal() {
                    offer_replay(controller, &next).await;
                } else {
                    println!("{}", render::screen(&next));
                }
            }
            true
        }
        GameStatus::Won | GameStatus::Lost | GameStatus::Menu => match input {
            Input::Again => {
                controller.play_again();
                println!("{}", render::screen(&controller.snapshot()));
                true
            }
            _ => {
                controller.end().await;
                false
            }
        },
    }
}

/// How long the summary waits for the score sink to answer.
const RESULT_WAIT: Duration = Duration::from_secs(5);

/// Prints the summary of a finished game and asks for another round.
async fn offer_replay(controller: &Arc<SessionController>, snap: &SessionSnapshot) {
    let result = tokio::time::timeout(RESULT_WAIT, controller.wait_result())
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("score sink did not answer in time");
            None
        });
    println!("{}", render::summary(snap, result.as_ref()));
    println!("Play again? [y/N]");
}

fn load_catalog(path: Option<&Path>) -> Result<Arc<Catalog>, ScamDrillError> {
    let Some(path) = path else {
        return Ok(builtin_catalog()?);
    };
    tracing::info!(catalog = %path.display(), "loading catalog");
    let loaded = CatalogLoader::new(LoaderOptions::default()).load(path)?;
    Ok(loaded.catalog)
}
