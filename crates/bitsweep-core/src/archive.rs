//! Archiving build outputs under configuration-specific names.

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::BuildHandle;
use crate::error::{Result, SweepError};
use crate::integrity::ContentHash;
use crate::matrix::{Configuration, SelectionPolicy};

/// Archive file name: `<basename>_<key values>_<difficulty>`, values joined
/// with `_`.
pub fn archive_name(basename: &str, key: &[u32], difficulty: u32) -> String {
    let mut name = basename.to_string();
    for value in key {
        name.push('_');
        name.push_str(&value.to_string());
    }
    name.push('_');
    name.push_str(&difficulty.to_string());
    name
}

/// The values that tell configurations apart under `policy`.
///
/// On the diagonal every parameter shares the primary value, so the primary
/// alone is enough. A product sweep needs every value, in parameter order,
/// or configurations sharing a primary value would overwrite each other.
pub fn archive_key(configuration: &Configuration, policy: SelectionPolicy) -> Vec<u32> {
    match policy {
        SelectionPolicy::Diagonal => vec![configuration.primary_value()],
        SelectionPolicy::Product => configuration.params().iter().map(|p| p.value).collect(),
    }
}

/// A binary copied to its archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedArtifact {
    pub path: PathBuf,
    pub key: Vec<u32>,
    pub difficulty: u32,
    pub hash: ContentHash,
}

/// Copies build outputs into an archive directory.
#[derive(Debug, Clone)]
pub struct ArtifactArchiver {
    dir: PathBuf,
    basename: String,
    policy: SelectionPolicy,
}

impl ArtifactArchiver {
    pub fn new(dir: PathBuf, basename: impl Into<String>, policy: SelectionPolicy) -> Self {
        ArtifactArchiver {
            dir,
            basename: basename.into(),
            policy,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `configuration` at `difficulty` is archived.
    pub fn archive_path(&self, configuration: &Configuration, difficulty: u32) -> PathBuf {
        let key = archive_key(configuration, self.policy);
        self.dir.join(archive_name(&self.basename, &key, difficulty))
    }

    /// Copy the binary pinned by `handle` to its archive path, replacing any
    /// earlier archive of the same configuration.
    ///
    /// Fails if the binary is gone or no longer has the handle's hash.
    pub fn archive(
        &self,
        handle: &BuildHandle,
        configuration: &Configuration,
        difficulty: u32,
    ) -> Result<ArchivedArtifact> {
        if !handle.path.is_file() {
            return Err(SweepError::ArchiveSourceMissing {
                path: handle.path.clone(),
            });
        }
        let current = ContentHash::of_file(&handle.path)?;
        if current != handle.hash {
            return Err(SweepError::ArchiveSourceChanged {
                path: handle.path.clone(),
                expected: handle.hash.to_string(),
                actual: current.to_string(),
            });
        }

        let dest = self.archive_path(configuration, difficulty);
        fs::copy(&handle.path, &dest).map_err(|source| SweepError::ArchiveCopy {
            from: handle.path.clone(),
            to: dest.clone(),
            source,
        })?;
        tracing::debug!("archived {} -> {}", handle.path.display(), dest.display());

        Ok(ArchivedArtifact {
            path: dest,
            key: archive_key(configuration, self.policy),
            difficulty,
            hash: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Parameter;

    fn configuration(values: &[u32]) -> Configuration {
        let params = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Parameter {
                name: format!("P{i}"),
                value,
            })
            .collect();
        Configuration::new(params, values.len() - 1).unwrap()
    }

    fn diagonal(v: u32) -> Configuration {
        configuration(&[v, v, v])
    }

    fn handle_for(path: &Path) -> BuildHandle {
        BuildHandle {
            path: path.to_path_buf(),
            hash: ContentHash::of_file(path).unwrap(),
            modified: None,
            rebuilt: true,
        }
    }

    #[test]
    fn name_embeds_value_and_index() {
        assert_eq!(archive_name("sha2_collision_demo", &[16], 0), "sha2_collision_demo_16_0");
        assert_eq!(archive_name("demo", &[24], 23), "demo_24_23");
        assert_eq!(archive_name("demo", &[1, 2, 3], 0), "demo_1_2_3_0");
    }

    #[test]
    fn names_do_not_collide_across_values() {
        let mut seen = std::collections::HashSet::new();
        for v in 1..40u32 {
            for d in 0..v {
                assert!(seen.insert(archive_name("demo", &[v], d)));
            }
        }
    }

    #[test]
    fn diagonal_key_is_primary_only() {
        let archiver =
            ArtifactArchiver::new(PathBuf::from("out"), "demo", SelectionPolicy::Diagonal);
        assert_eq!(archiver.archive_path(&diagonal(16), 3), Path::new("out/demo_16_3"));
    }

    #[test]
    fn product_key_tells_shared_primaries_apart() {
        let archiver =
            ArtifactArchiver::new(PathBuf::from("out"), "demo", SelectionPolicy::Product);
        let a = archiver.archive_path(&configuration(&[1, 2, 2]), 0);
        let b = archiver.archive_path(&configuration(&[2, 1, 2]), 0);
        assert_eq!(a, Path::new("out/demo_1_2_2_0"));
        assert_ne!(a, b);
    }

    #[test]
    fn archive_copies_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("demo");
        let archiver =
            ArtifactArchiver::new(dir.path().to_path_buf(), "demo", SelectionPolicy::Diagonal);

        fs::write(&out, b"first").unwrap();
        let first = archiver.archive(&handle_for(&out), &diagonal(16), 3).unwrap();
        assert_eq!(first.path, dir.path().join("demo_16_3"));
        assert_eq!(first.key, vec![16]);

        fs::write(&out, b"second").unwrap();
        archiver.archive(&handle_for(&out), &diagonal(16), 3).unwrap();
        assert_eq!(fs::read(dir.path().join("demo_16_3")).unwrap(), b"second");
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("demo");
        fs::write(&out, b"bytes").unwrap();
        let handle = handle_for(&out);
        fs::remove_file(&out).unwrap();

        let archiver =
            ArtifactArchiver::new(dir.path().to_path_buf(), "demo", SelectionPolicy::Diagonal);
        let err = archiver.archive(&handle, &diagonal(16), 0).unwrap_err();
        assert!(matches!(err, SweepError::ArchiveSourceMissing { .. }));
        assert!(!dir.path().join("demo_16_0").exists());
    }

    #[test]
    fn changed_source_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("demo");
        fs::write(&out, b"built for 16").unwrap();
        let handle = handle_for(&out);
        fs::write(&out, b"built for 17").unwrap();

        let archiver =
            ArtifactArchiver::new(dir.path().to_path_buf(), "demo", SelectionPolicy::Diagonal);
        let err = archiver.archive(&handle, &diagonal(16), 0).unwrap_err();
        assert!(matches!(err, SweepError::ArchiveSourceChanged { .. }));
    }
}
