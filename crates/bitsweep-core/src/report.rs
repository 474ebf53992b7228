//! Sweep reports.
//!
//! Every step of every configuration ends in a [`StepOutcome`]. The
//! orchestrator collects them into a [`SweepReport`] which renders as a
//! human-readable table or as JSON.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::integrity::ContentHash;
use crate::matrix::Configuration;
use crate::template::PatchSummary;

/// Result of one sweep step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StepOutcome {
    Ok,
    /// Succeeded, with diagnostics worth showing.
    Warning { detail: String },
    Failed { reason: String },
    /// Not attempted because of an earlier failure.
    Skipped { reason: String },
}

impl StepOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            StepOutcome::Ok => "ok",
            StepOutcome::Warning { .. } => "warning",
            StepOutcome::Failed { .. } => "FAILED",
            StepOutcome::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One archive copy.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRecord {
    pub difficulty: u32,
    pub path: PathBuf,
    pub outcome: StepOutcome,
}

/// Everything that happened to one configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationReport {
    pub configuration: Configuration,
    pub patch: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_summary: Option<PatchSummary>,
    pub clean: StepOutcome,
    pub build: StepOutcome,
    /// Hash of the binary the archives were copied from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<ContentHash>,
    pub archives: Vec<ArchiveRecord>,
}

impl ConfigurationReport {
    /// Number of archives written.
    pub fn archived(&self) -> usize {
        self.archives
            .iter()
            .filter(|a| a.outcome == StepOutcome::Ok)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.patch.is_failure()
            || self.build.is_failure()
            || self.archives.iter().any(|a| a.outcome.is_failure())
    }
}

/// Outcome of a whole sweep, in sweep order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub configurations: Vec<ConfigurationReport>,
    /// Set when the failure policy stopped the sweep early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl SweepReport {
    pub fn has_failures(&self) -> bool {
        self.aborted.is_some() || self.configurations.iter().any(|c| c.has_failures())
    }

    /// Total archives written.
    pub fn archived(&self) -> usize {
        self.configurations.iter().map(|c| c.archived()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sweep Report ===")?;
        for c in &self.configurations {
            writeln!(
                f,
                "  {}  patch: {}  build: {}  archives: {}/{}",
                c.configuration,
                c.patch,
                c.build,
                c.archived(),
                c.archives.len()
            )?;
            for outcome in [&c.patch, &c.clean, &c.build] {
                match outcome {
                    StepOutcome::Failed { reason } => writeln!(f, "    error: {}", first_line(reason))?,
                    StepOutcome::Warning { detail } => {
                        writeln!(f, "    warning: {}", first_line(detail))?
                    }
                    _ => {}
                }
            }
            for a in c.archives.iter().filter(|a| a.outcome.is_failure()) {
                if let StepOutcome::Failed { reason } = &a.outcome {
                    writeln!(f, "    archive {}: {}", a.difficulty, reason)?;
                }
            }
        }
        let failed = self
            .configurations
            .iter()
            .filter(|c| c.has_failures())
            .count();
        if let Some(reason) = &self.aborted {
            writeln!(f, "aborted: {reason}")?;
        }
        write!(
            f,
            "{} configurations, {} archives written, {} with failures",
            self.configurations.len(),
            self.archived(),
            failed
        )
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
