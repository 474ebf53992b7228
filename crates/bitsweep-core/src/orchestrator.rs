//! The sweep loop.
//!
//! For each configuration, in matrix order: patch the template, rebuild,
//! then archive the binary once per difficulty level. Steps never run out
//! of order and nothing is rolled back. Failures become [`StepOutcome`]s;
//! the [`FailurePolicy`] decides what a failure skips.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ArtifactArchiver;
use crate::build::{BuildInvoker, CommandToolchain, Toolchain};
use crate::config::{OnBuildError, OnTemplateError, SweepConfig};
use crate::error::{Result, SweepError};
use crate::matrix::{Configuration, ParameterMatrix};
use crate::report::{ArchiveRecord, ConfigurationReport, StepOutcome, SweepReport};
use crate::template::{PatchSummary, TemplateEditor};

/// Drives a sweep over one working directory.
#[derive(Debug)]
pub struct Orchestrator<T> {
    config: SweepConfig,
    workdir: PathBuf,
    matrix: ParameterMatrix,
    editor: TemplateEditor,
    invoker: BuildInvoker<T>,
    archiver: ArtifactArchiver,
}

impl Orchestrator<CommandToolchain> {
    /// An orchestrator that runs the configured external commands.
    pub fn with_commands(config: SweepConfig, workdir: PathBuf) -> Result<Self> {
        let toolchain = CommandToolchain::from_config(&config.build);
        Orchestrator::new(config, workdir, toolchain)
    }
}

impl<T: Toolchain> Orchestrator<T> {
    pub fn new(config: SweepConfig, workdir: PathBuf, toolchain: T) -> Result<Self> {
        config.validate()?;
        let matrix = config.matrix()?;
        let editor = TemplateEditor::new(config.template.marker.clone());
        let invoker = BuildInvoker::new(toolchain, workdir.clone(), config.output_path(&workdir));
        let archiver = ArtifactArchiver::new(
            config.archive_dir(&workdir),
            config.build.output_basename(),
            config.sweep.policy,
        );
        Ok(Orchestrator {
            config,
            workdir,
            matrix,
            editor,
            invoker,
            archiver,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn matrix(&self) -> &ParameterMatrix {
        &self.matrix
    }

    pub fn archiver(&self) -> &ArtifactArchiver {
        &self.archiver
    }

    pub fn toolchain(&self) -> &T {
        self.invoker.toolchain()
    }

    /// Run the whole sweep.
    pub fn run(&self) -> Result<SweepReport> {
        self.run_with(|_| {})
    }

    /// Run the whole sweep, calling `on_configuration` after each
    /// configuration finishes.
    pub fn run_with<F>(&self, mut on_configuration: F) -> Result<SweepReport>
    where
        F: FnMut(&ConfigurationReport),
    {
        let archive_dir = self.archiver.dir();
        fs::create_dir_all(archive_dir).map_err(|source| SweepError::ArchiveDir {
            path: archive_dir.to_path_buf(),
            source,
        })?;

        let total = self.matrix.len();
        let mut report = SweepReport::default();
        tracing::info!(
            "sweeping {total} configurations over {} ({} policy)",
            self.matrix.range(),
            self.matrix.policy()
        );

        for (i, configuration) in self.matrix.iter().enumerate() {
            tracing::info!("[{}/{total}] {configuration}", i + 1);
            let entry = self.run_configuration(&configuration);
            on_configuration(&entry);

            let abort = match &entry.patch {
                StepOutcome::Failed { reason }
                    if self.config.policy.on_template_error == OnTemplateError::AbortSweep =>
                {
                    Some(format!("{configuration}: {reason}"))
                }
                _ => None,
            };
            report.configurations.push(entry);
            if let Some(reason) = abort {
                tracing::error!("aborting sweep: {reason}");
                report.aborted = Some(reason);
                break;
            }
        }

        tracing::info!(
            "sweep finished: {} archives from {} configurations",
            report.archived(),
            report.configurations.len()
        );
        Ok(report)
    }

    /// Patch, build and archive one configuration.
    pub fn run_configuration(&self, configuration: &Configuration) -> ConfigurationReport {
        let levels = configuration.difficulty_levels();
        let template = self.config.template_path(&self.workdir);

        let (patch, patch_summary) = match self.editor.apply(&template, configuration) {
            Ok(summary) => (patch_outcome(&summary), Some(summary)),
            Err(e) => {
                tracing::error!("cannot patch template for {configuration}: {e}");
                (StepOutcome::failed(e.to_string()), None)
            }
        };

        if patch.is_failure() {
            let skip = || StepOutcome::skipped("template patch failed");
            return ConfigurationReport {
                configuration: configuration.clone(),
                patch,
                patch_summary,
                clean: skip(),
                build: skip(),
                output_hash: None,
                archives: (0..levels)
                    .map(|d| ArchiveRecord {
                        difficulty: d,
                        path: self.archiver.archive_path(configuration, d),
                        outcome: skip(),
                    })
                    .collect(),
            };
        }

        let invocation = self.invoker.invoke();
        let build = invocation.result.outcome();
        let skip_archives =
            build.is_failure() && self.config.policy.on_build_error == OnBuildError::SkipArchive;

        let archives: Vec<ArchiveRecord> = (0..levels)
            .map(|d| {
                let outcome = if skip_archives {
                    StepOutcome::skipped("build failed")
                } else {
                    match &invocation.handle {
                        None => StepOutcome::failed(
                            SweepError::ArchiveSourceMissing {
                                path: self.invoker.output().to_path_buf(),
                            }
                            .to_string(),
                        ),
                        Some(handle) => match self.archiver.archive(handle, configuration, d) {
                            Ok(_) => StepOutcome::Ok,
                            Err(e) => {
                                tracing::warn!("archive {d} of {configuration} failed: {e}");
                                StepOutcome::failed(e.to_string())
                            }
                        },
                    }
                };
                ArchiveRecord {
                    difficulty: d,
                    path: self.archiver.archive_path(configuration, d),
                    outcome,
                }
            })
            .collect();

        let entry = ConfigurationReport {
            configuration: configuration.clone(),
            patch,
            patch_summary,
            clean: invocation.clean,
            build,
            output_hash: invocation.handle.map(|h| h.hash),
            archives,
        };
        tracing::info!(
            "{configuration}: {}/{levels} archives written",
            entry.archived()
        );
        entry
    }
}

fn patch_outcome(summary: &PatchSummary) -> StepOutcome {
    if summary.is_clean() {
        return StepOutcome::Ok;
    }
    let mut notes: Vec<String> = summary
        .duplicates
        .iter()
        .map(|(name, line)| format!("duplicate {name} at line {line} left unmodified"))
        .collect();
    notes.extend(
        summary
            .missing
            .iter()
            .map(|name| format!("no definition line for {name}")),
    );
    StepOutcome::Warning {
        detail: notes.join("; "),
    }
}
