//! Sweep configuration (`bitsweep.toml`).
//!
//! Every section is optional; missing values fall back to the sweep over
//! `demos/sha2_collision_demo.cpp` with `NBITS_A`, `NBITS_B`, `NBITS_C`
//! from 16 to 24 bits.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::matrix::{BitRange, ParameterMatrix, SelectionPolicy};

/// Complete description of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    #[serde(default)]
    pub sweep: MatrixConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub policy: FailurePolicy,
}

/// `[sweep]`: which configurations to visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// First bit-width.
    #[serde(default = "default_start")]
    pub start: u32,
    /// One past the last bit-width.
    #[serde(default = "default_end")]
    pub end: u32,
    #[serde(default)]
    pub policy: SelectionPolicy,
}

fn default_start() -> u32 {
    16
}

fn default_end() -> u32 {
    25
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig {
            start: default_start(),
            end: default_end(),
            policy: SelectionPolicy::default(),
        }
    }
}

impl MatrixConfig {
    pub fn range(&self) -> BitRange {
        BitRange::new(self.start, self.end)
    }

    pub fn set_range(&mut self, range: BitRange) {
        self.start = range.start;
        self.end = range.end;
    }
}

/// `[template]`: the file holding the compile-time constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    /// Template path, relative to the working directory.
    #[serde(default = "default_template_path")]
    pub path: PathBuf,
    /// Token that starts a definition line.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Parameter names, in configuration order.
    #[serde(default = "default_parameters")]
    pub parameters: Vec<String>,
    /// Parameter that names archives and sets the difficulty count.
    /// Defaults to the last parameter.
    #[serde(default)]
    pub primary: Option<String>,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("demos/sha2_collision_demo.cpp")
}

fn default_marker() -> String {
    "#define".to_string()
}

fn default_parameters() -> Vec<String> {
    vec!["NBITS_A".into(), "NBITS_B".into(), "NBITS_C".into()]
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            path: default_template_path(),
            marker: default_marker(),
            parameters: default_parameters(),
            primary: None,
        }
    }
}

impl TemplateConfig {
    /// Index of the primary parameter.
    pub fn primary_index(&self) -> Result<usize> {
        match &self.primary {
            None => self
                .parameters
                .len()
                .checked_sub(1)
                .ok_or_else(|| SweepError::InvalidConfig {
                    detail: "template.parameters is empty".into(),
                }),
            Some(name) => self
                .parameters
                .iter()
                .position(|p| p == name)
                .ok_or_else(|| SweepError::InvalidConfig {
                    detail: format!("primary parameter '{name}' is not in template.parameters"),
                }),
        }
    }
}

/// `[build]`: the external toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Build-system cache files and directories removed before configuring.
    #[serde(default = "default_cache_paths")]
    pub cache_paths: Vec<PathBuf>,
    /// Configure command; `-D <backend_option>` is appended.
    #[serde(default = "default_configure")]
    pub configure: Vec<String>,
    /// Backend selection passed to configure.
    #[serde(default = "default_backend_option")]
    pub backend_option: String,
    /// Compile command, run only when configure succeeded.
    #[serde(default = "default_compile")]
    pub compile: Vec<String>,
    /// Binary produced by the build, relative to the working directory.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_cache_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("CMakeCache.txt"), PathBuf::from("CMakeFiles")]
}

fn default_configure() -> Vec<String> {
    ["cmake", "-S", ".", "-B", "."]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_backend_option() -> String {
    "AES_IMPL=aesni".to_string()
}

fn default_compile() -> Vec<String> {
    vec!["make".to_string()]
}

fn default_output() -> PathBuf {
    PathBuf::from("sha2_collision_demo")
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            cache_paths: default_cache_paths(),
            configure: default_configure(),
            backend_option: default_backend_option(),
            compile: default_compile(),
            output: default_output(),
        }
    }
}

impl BuildConfig {
    /// File name used as the archive base name.
    pub fn output_basename(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `[archive]`: where copies of the binary go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Archive directory, relative to the working directory.
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            dir: default_archive_dir(),
        }
    }
}

/// What a failed template patch does to the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnTemplateError {
    /// Skip the rest of this configuration and move on.
    #[default]
    SkipConfiguration,
    /// Stop the whole sweep.
    AbortSweep,
}

/// What a failed build does to the archive step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnBuildError {
    /// Archive whatever output exists, possibly stale.
    #[default]
    Continue,
    /// Record the archives as skipped.
    SkipArchive,
}

/// `[policy]`: per-step continue/abort decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailurePolicy {
    #[serde(default)]
    pub on_template_error: OnTemplateError,
    #[serde(default)]
    pub on_build_error: OnBuildError,
}

impl SweepConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field the sweep depends on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |detail: String| -> Result<()> { Err(SweepError::InvalidConfig { detail }) };

        let params = &self.template.parameters;
        if params.is_empty() {
            return invalid("template.parameters must name at least one parameter".into());
        }
        for (i, name) in params.iter().enumerate() {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return invalid(format!("parameter name '{name}' must be a single token"));
            }
            if params[..i].contains(name) {
                return invalid(format!("parameter '{name}' is listed twice"));
            }
        }
        self.template.primary_index()?;
        if self.template.marker.is_empty() || self.template.marker.contains(char::is_whitespace) {
            return invalid("template.marker must be a single non-empty token".into());
        }
        if self.build.configure.is_empty() || self.build.compile.is_empty() {
            return invalid("build.configure and build.compile must not be empty".into());
        }
        if self.build.output_basename().is_empty() {
            return invalid("build.output must name a file".into());
        }
        // Builds the matrix once to surface range errors.
        self.matrix().map(|_| ())
    }

    /// The parameter matrix described by `[sweep]` and `[template]`.
    pub fn matrix(&self) -> Result<ParameterMatrix> {
        ParameterMatrix::new(
            self.template.parameters.clone(),
            self.template.primary_index()?,
            self.sweep.range(),
            self.sweep.policy,
        )
    }

    /// Template path resolved against `workdir`.
    pub fn template_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.template.path)
    }

    /// Build output path resolved against `workdir`.
    pub fn output_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.build.output)
    }

    /// Archive directory resolved against `workdir`.
    pub fn archive_dir(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.archive.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = SweepConfig::from_toml_str("").unwrap();
        assert_eq!(config, SweepConfig::default());
        assert_eq!(config.sweep.range(), BitRange::new(16, 25));
        assert_eq!(config.template.primary_index().unwrap(), 2);
        assert_eq!(config.build.output_basename(), "sha2_collision_demo");
        config.validate().unwrap();
    }

    #[test]
    fn parse_full_config() {
        let config = SweepConfig::from_toml_str(
            r##"
[sweep]
start = 8
end = 12
policy = "product"

[template]
path = "src/params.h"
marker = "#define"
parameters = ["X", "Y"]
primary = "X"

[build]
cache_paths = ["build"]
configure = ["cmake", "-S", ".", "-B", "build"]
backend_option = "AES_IMPL=ref"
compile = ["cmake", "--build", "build"]
output = "build/demo"

[archive]
dir = "bins"

[policy]
on_template_error = "abort-sweep"
on_build_error = "skip-archive"
"##,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.sweep.policy, SelectionPolicy::Product);
        assert_eq!(config.template.primary_index().unwrap(), 0);
        assert_eq!(config.build.output_basename(), "demo");
        assert_eq!(config.policy.on_template_error, OnTemplateError::AbortSweep);
        assert_eq!(config.policy.on_build_error, OnBuildError::SkipArchive);
        assert_eq!(config.matrix().unwrap().len(), 16);
    }

    #[test]
    fn reject_unknown_keys() {
        assert!(SweepConfig::from_toml_str("[sweep]\nstep = 2\n").is_err());
    }

    #[test]
    fn validate_catches_bad_fields() {
        let mut config = SweepConfig::default();
        config.template.parameters.push("NBITS_A".into());
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.template.primary = Some("NBITS_Z".into());
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.sweep.end = config.sweep.start;
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.build.compile.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut config = SweepConfig::default();
        config.sweep.set_range(BitRange::new(4, 6));
        let text = config.to_toml_string().unwrap();
        assert_eq!(SweepConfig::from_toml_str(&text).unwrap(), config);
    }
}
