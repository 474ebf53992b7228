//! `bitsweep run`: patch, rebuild and archive every configuration.

use std::path::Path;

use anyhow::{bail, Result};
use bitsweep_core::{Orchestrator, SweepConfig, SweepReport};

/// Run the sweep and print its report.
pub fn run(
    workdir: &Path,
    config: SweepConfig,
    report: Option<&str>,
    fail_on_error: bool,
) -> Result<()> {
    let format = report.unwrap_or("human");
    if !matches!(format, "human" | "json") {
        bail!("unknown report format: '{format}'. Choose: human, json");
    }

    let report = execute(workdir, config)?;
    if format == "json" {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }

    if let Some(reason) = &report.aborted {
        bail!("sweep aborted: {reason}");
    }
    if fail_on_error && report.has_failures() {
        bail!("sweep finished with failures");
    }
    Ok(())
}

/// Run the sweep with the configured external commands.
pub fn execute(workdir: &Path, config: SweepConfig) -> Result<SweepReport> {
    let orchestrator = Orchestrator::with_commands(config, workdir.to_path_buf())?;
    Ok(orchestrator.run()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitsweep_core::BitRange;
    use std::fs;
    use std::path::PathBuf;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn scratch() -> (tempfile::TempDir, SweepConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("params.h"),
            "#define NBITS_A 0\n#define NBITS_B 0\n#define NBITS_C 0\n",
        )
        .unwrap();
        let mut config = SweepConfig::default();
        config.sweep.set_range(BitRange::new(2, 4));
        config.template.path = PathBuf::from("params.h");
        config.build.configure = sh("true");
        config.build.compile = sh("cp params.h demo");
        config.build.output = PathBuf::from("demo");
        (dir, config)
    }

    #[test]
    fn execute_archives_each_level() {
        let (dir, config) = scratch();
        let report = execute(dir.path(), config).unwrap();
        assert_eq!(report.archived(), 5);
        let text = fs::read_to_string(dir.path().join("demo_2_1")).unwrap();
        assert!(text.contains("#define NBITS_B 2 \n"));
    }

    #[test]
    fn unknown_report_format_is_rejected_up_front() {
        let (dir, config) = scratch();
        assert!(run(dir.path(), config, Some("xml"), false).is_err());
        assert!(!dir.path().join("demo").exists());
    }

    #[test]
    fn fail_on_error_surfaces_build_failures() {
        let (dir, mut config) = scratch();
        config.build.compile = sh("echo 'make: *** no rule' >&2; exit 2");
        assert!(run(dir.path(), config.clone(), Some("json"), false).is_ok());
        let err = run(dir.path(), config, None, true).unwrap_err();
        assert!(err.to_string().contains("failures"));
    }
}
