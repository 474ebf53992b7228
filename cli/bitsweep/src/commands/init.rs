//! `bitsweep init`: write a default `bitsweep.toml`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{self, MANIFEST_NAME};

/// Write `bitsweep.toml` into `dir`.
pub fn run(dir: &Path, force: bool) -> Result<()> {
    let path = dir.join(MANIFEST_NAME);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    fs::write(&path, manifest::template())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), false).unwrap();
        assert!(dir.path().join(MANIFEST_NAME).is_file());
        assert!(manifest::find_and_load(dir.path()).unwrap().is_some());
    }

    #[test]
    fn init_refuses_existing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_NAME), "# mine\n").unwrap();

        let result = run(dir.path(), false);
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(
            fs::read_to_string(dir.path().join(MANIFEST_NAME)).unwrap(),
            "# mine\n"
        );
    }

    #[test]
    fn init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_NAME), "# mine\n").unwrap();
        run(dir.path(), true).unwrap();
        let content = fs::read_to_string(dir.path().join(MANIFEST_NAME)).unwrap();
        assert!(content.contains("[sweep]"));
    }
}
