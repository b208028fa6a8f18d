//! Shared integration-test harness: spawns the `scamdrill` binary and writes
//! catalog and rules fixtures.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for waiting on a line of output.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A catalog with a single scam scenario: every level falls back to it, so
/// answering "scam" is always right.
pub const ONE_SCAM_CATALOG: &str = r#"
scenarios:
  - id: only-scam
    category: sms
    title: Parcel on hold
    body: "Pay 1.99 to release your parcel: http://parcel-fee.example"
    sender: "+44 7700 900123"
    is_scam: true
    explanation: Couriers do not ask for fees by text link.
    difficulty: 1
reflex:
  - { command: "rm -rf malware", difficulty: 1 }
"#;

/// Writes `contents` to a fresh temporary file with the given suffix.
pub fn fixture(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("failed to create fixture");
    file.write_all(contents.as_bytes())
        .expect("failed to write fixture");
    file
}

/// Path of the built binary.
pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_scamdrill")
}

/// Runs a non-interactive command to completion.
pub fn spawn_command(args: &[&str]) -> std::process::Output {
    std::process::Command::new(bin())
        .args(args)
        .env_remove("SCAMDRILL_CATALOG")
        .env_remove("SCAMDRILL_LOG_LEVEL")
        .output()
        .expect("failed to run scamdrill")
}

/// The repository's built-in catalog files.
pub fn catalog_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("catalog")
}

/// A running `scamdrill play` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct PlayProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    reader: BufReader<tokio::process::ChildStdout>,
    transcript: Vec<String>,
}

impl PlayProcess {
    /// Spawns `scamdrill play` with the given catalog, rules and extra args.
    pub fn spawn(catalog: &Path, rules: &Path, extra: &[&str]) -> Self {
        let mut child = Command::new(bin())
            .arg("--quiet")
            .arg("play")
            .arg("--catalog")
            .arg(catalog)
            .arg("--rules")
            .arg(rules)
            .args(["--player", "tester", "--seed", "7"])
            .args(extra)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn scamdrill");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            transcript: Vec::new(),
        }
    }

    /// Sends one line of input.
    pub async fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to scamdrill");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Closes stdin (EOF).
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Reads output until a line contains `needle`; returns that line.
    ///
    /// Panics on EOF or timeout, printing what was seen.
    pub async fn expect_line(&mut self, needle: &str) -> String {
        let result = tokio::time::timeout(DEFAULT_TIMEOUT, async {
            loop {
                let mut line = String::new();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                if n == 0 {
                    return None;
                }
                let line = line.trim_end().to_string();
                self.transcript.push(line.clone());
                if line.contains(needle) {
                    return Some(line);
                }
            }
        })
        .await;
        match result {
            Ok(Some(line)) => line,
            Ok(None) => panic!(
                "EOF before {needle:?}; transcript:\n{}",
                self.transcript.join("\n")
            ),
            Err(_) => panic!(
                "timed out waiting for {needle:?}; transcript:\n{}",
                self.transcript.join("\n")
            ),
        }
    }

    /// Waits for the process to exit and returns its exit code.
    pub async fn wait(mut self) -> Option<i32> {
        self.stdin.take();
        tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("scamdrill did not exit")
            .expect("failed to wait for scamdrill")
            .code()
    }
}
