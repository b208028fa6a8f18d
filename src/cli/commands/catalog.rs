//! Catalog command handlers
//!
//! Implements `catalog list` and `catalog validate`.

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::{CatalogListArgs, CatalogValidateArgs, ContentKind, OutputFormat};
use crate::config::{CatalogLoader, LoaderOptions};
use crate::content::builtin::{BUILTIN_ORIGIN, builtin_catalog};
use crate::content::{Catalog, ScenarioCategory};
use crate::error::{ConfigError, ScamDrillError, Severity, ValidationIssue};

/// List the scenarios or reflex commands of a catalog.
///
/// # Errors
///
/// Returns a config error if the catalog cannot be loaded.
pub fn list(args: &CatalogListArgs) -> Result<(), ScamDrillError> {
    let (catalog, origin) = match &args.catalog {
        Some(path) => (
            CatalogLoader::new(LoaderOptions::default()).load(path)?.catalog,
            path.display().to_string(),
        ),
        None => (builtin_catalog()?, BUILTIN_ORIGIN.to_string()),
    };
    println!("{}", render_list(&catalog, &origin, args.kind, args.format)?);
    Ok(())
}

fn render_list(
    catalog: &Arc<Catalog>,
    origin: &str,
    kind: ContentKind,
    format: OutputFormat,
) -> Result<String, ScamDrillError> {
    let mut out = String::new();
    match (kind, format) {
        (ContentKind::Scenarios, OutputFormat::Json) => {
            out = serde_json::to_string_pretty(catalog.scenarios())?;
        }
        (ContentKind::Reflex, OutputFormat::Json) => {
            out = serde_json::to_string_pretty(catalog.reflex())?;
        }
        (ContentKind::Scenarios, OutputFormat::Human) => {
            out.push_str(&format!(
                "Scenarios in {origin} ({} total)\n",
                catalog.scenarios().len()
            ));
            for category in [
                ScenarioCategory::Email,
                ScenarioCategory::Website,
                ScenarioCategory::Sms,
                ScenarioCategory::Call,
            ] {
                let mut in_cat: Vec<_> = catalog
                    .scenarios()
                    .iter()
                    .filter(|s| s.category == category)
                    .collect();
                if in_cat.is_empty() {
                    continue;
                }
                in_cat.sort_by_key(|s| s.difficulty);
                out.push_str(&format!("\n  {}\n", category.label()));
                for s in in_cat {
                    let verdict = if s.is_scam { "scam" } else { "legit" };
                    out.push_str(&format!(
                        "    {:<14}d{:<4}{:<7}{}\n",
                        s.id, s.difficulty, verdict, s.title
                    ));
                }
            }
        }
        (ContentKind::Reflex, OutputFormat::Human) => {
            out.push_str(&format!(
                "Reflex commands in {origin} ({} total)\n\n",
                catalog.reflex().len()
            ));
            let mut rows: Vec<_> = catalog.reflex().iter().collect();
            rows.sort_by_key(|c| c.difficulty);
            for c in rows {
                out.push_str(&format!("    d{:<4}{}\n", c.difficulty, c.command));
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Validate catalog files without playing.
///
/// Every file is checked and reported before the first failure is
/// returned.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or the first config
/// error encountered.
pub fn validate(args: &CatalogValidateArgs) -> Result<(), ScamDrillError> {
    let loader = CatalogLoader::new(LoaderOptions {
        strict: args.strict,
        ..LoaderOptions::default()
    });

    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<ConfigError> = None;

    for path in &args.files {
        if !path.exists() {
            return Err(ScamDrillError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        tracing::info!(file = %path.display(), "validating catalog");

        match loader.load(path) {
            Ok(loaded) => {
                reports.push(FileReport {
                    file: path,
                    summary: Some((loaded.catalog.scenarios().len(), loaded.catalog.reflex().len())),
                    issues: loaded.warnings,
                    failure: None,
                });
            }
            Err(e) => {
                let issues = match &e {
                    ConfigError::ValidationError { errors, .. } => errors.clone(),
                    _ => Vec::new(),
                };
                reports.push(FileReport {
                    file: path,
                    summary: None,
                    issues,
                    failure: Some(e.to_string()),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                println!("{}", report.human());
            }
        }
        OutputFormat::Json => {
            let json: Vec<_> = reports.iter().map(FileReport::json).collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

struct FileReport<'a> {
    file: &'a Path,
    summary: Option<(usize, usize)>,
    issues: Vec<ValidationIssue>,
    failure: Option<String>,
}

impl FileReport<'_> {
    fn human(&self) -> String {
        let mut out = match (&self.failure, self.summary) {
            (Some(reason), _) => format!("FAIL {}: {reason}", self.file.display()),
            (None, Some((scenarios, reflex))) => format!(
                "ok   {}: {scenarios} scenarios, {reflex} reflex commands",
                self.file.display()
            ),
            (None, None) => format!("ok   {}", self.file.display()),
        };
        for issue in &self.issues {
            out.push_str(&format!("\n     {issue}"));
        }
        out
    }

    fn json(&self) -> serde_json::Value {
        let issues = |severity: Severity| -> Vec<serde_json::Value> {
            self.issues
                .iter()
                .filter(|i| i.severity == severity)
                .map(|i| serde_json::json!({ "path": i.path, "message": i.message }))
                .collect()
        };
        serde_json::json!({
            "file": self.file.display().to_string(),
            "valid": self.failure.is_none(),
            "error": self.failure,
            "errors": issues(Severity::Error),
            "warnings": issues(Severity::Warning),
        })
    }
}
