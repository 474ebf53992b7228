//! `bitsweep plan`: list what a sweep would build, without touching anything.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use bitsweep_core::{ArtifactArchiver, SweepConfig};

/// Print the sweep plan.
pub fn run(workdir: &Path, config: &SweepConfig) -> Result<()> {
    print!("{}", render(workdir, config)?);
    Ok(())
}

/// Render the sweep plan as text.
pub fn render(workdir: &Path, config: &SweepConfig) -> Result<String> {
    config.validate()?;
    let matrix = config.matrix()?;
    let archiver = ArtifactArchiver::new(
        config.archive_dir(workdir),
        config.build.output_basename(),
        config.sweep.policy,
    );

    let mut out = String::new();
    writeln!(
        out,
        "Sweep plan: {} configurations over {} ({})",
        matrix.len(),
        matrix.range(),
        matrix.policy()
    )?;
    writeln!(out, "  Template: {}", config.template_path(workdir).display())?;
    writeln!(out, "  Output:   {}", config.output_path(workdir).display())?;
    writeln!(out, "  Backend:  {}", config.build.backend_option)?;
    writeln!(out)?;

    let mut total = 0u64;
    for configuration in matrix.iter() {
        let levels = configuration.difficulty_levels();
        total += u64::from(levels);
        let span = match levels {
            1 => file_name(&archiver.archive_path(&configuration, 0)),
            n => format!(
                "{} .. {}",
                file_name(&archiver.archive_path(&configuration, 0)),
                file_name(&archiver.archive_path(&configuration, n - 1))
            ),
        };
        let label = configuration.to_string();
        writeln!(out, "  {label:<40} {levels:>3} archives  {span}")?;
    }
    writeln!(out)?;
    writeln!(out, "{total} archives in {}", archiver.dir().display())?;
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
