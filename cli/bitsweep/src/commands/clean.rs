//! `bitsweep clean`: remove build-system cache state and, optionally, archives.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bitsweep_core::build::clean_paths;
use bitsweep_core::{ArtifactArchiver, SweepConfig};

/// Remove the build cache, leftover template temp files and, with
/// `archives`, every archive the configured matrix would produce.
pub fn run(workdir: &Path, config: &SweepConfig, archives: bool) -> Result<()> {
    let summary = clean_paths(workdir, &config.build.cache_paths);
    for path in &summary.removed {
        println!("Removed {}", path.display());
    }
    for error in &summary.errors {
        tracing::warn!("could not remove {error}");
    }
    if summary.removed.is_empty() && summary.errors.is_empty() {
        println!("Already clean: no build cache in {}", workdir.display());
    }

    let stray = remove_stray_temp_files(&config.template_path(workdir))?;
    if stray > 0 {
        println!("Removed {stray} interrupted template writes");
    }

    if archives {
        let removed = remove_archives(workdir, config)?;
        println!("Removed {removed} archives");
    }
    Ok(())
}

/// Temp files left next to the template by a killed sweep.
fn remove_stray_temp_files(template: &Path) -> Result<usize> {
    let dir = match template.parent() {
        Some(dir) if dir.is_dir() => dir,
        _ => return Ok(0),
    };
    let mut removed = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(".bitsweep-") && name.ends_with(".tmp") && entry.path().is_file() {
            fs::remove_file(entry.path())
                .with_context(|| format!("removing {}", entry.path().display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove_archives(workdir: &Path, config: &SweepConfig) -> Result<usize> {
    let matrix = config.matrix()?;
    let archiver = ArtifactArchiver::new(
        config.archive_dir(workdir),
        config.build.output_basename(),
        config.sweep.policy,
    );
    let mut removed = 0;
    for configuration in matrix.iter() {
        for d in 0..configuration.difficulty_levels() {
            let path = archiver.archive_path(&configuration, d);
            if path.is_file() {
                fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitsweep_core::BitRange;

    #[test]
    fn clean_removes_cmake_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CMakeCache.txt"), b"cache").unwrap();
        fs::create_dir_all(dir.path().join("CMakeFiles/3.28")).unwrap();

        run(dir.path(), &SweepConfig::default(), false).unwrap();
        assert!(!dir.path().join("CMakeCache.txt").exists());
        assert!(!dir.path().join("CMakeFiles").exists());
    }

    #[test]
    fn clean_handles_already_clean() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &SweepConfig::default(), false).unwrap();
    }

    #[test]
    fn clean_removes_interrupted_template_writes() {
        let dir = tempfile::tempdir().unwrap();
        let demos = dir.path().join("demos");
        fs::create_dir_all(&demos).unwrap();
        fs::write(demos.join(".bitsweep-abc123.tmp"), b"half").unwrap();
        fs::write(demos.join("sha2_collision_demo.cpp"), b"keep").unwrap();

        run(dir.path(), &SweepConfig::default(), false).unwrap();
        assert!(!demos.join(".bitsweep-abc123.tmp").exists());
        assert!(demos.join("sha2_collision_demo.cpp").exists());
    }

    #[test]
    fn clean_archives_only_touches_swept_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SweepConfig::default();
        config.sweep.set_range(BitRange::new(2, 3));
        for name in ["sha2_collision_demo_2_0", "sha2_collision_demo_2_1", "sha2_collision_demo_9_0"] {
            fs::write(dir.path().join(name), b"bin").unwrap();
        }

        run(dir.path(), &config, true).unwrap();
        assert!(!dir.path().join("sha2_collision_demo_2_0").exists());
        assert!(!dir.path().join("sha2_collision_demo_2_1").exists());
        assert!(dir.path().join("sha2_collision_demo_9_0").exists());
    }
}
