//! In-place rewriting of compile-time constants in a build template.
//!
//! A definition line is `<marker> <NAME> <value>`, e.g. `#define NBITS_A 16`.
//! Patching replaces the whole line with the canonical form
//! `<marker> <NAME> <value> \n` and passes every other line through
//! unchanged. The new text is written to a temporary file next to the
//! template and renamed over it, so a reader sees either the old file or the
//! new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SweepError};
use crate::matrix::Configuration;

/// A definition line found in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub name: String,
    /// 1-based line number.
    pub line: usize,
    /// Remainder of the line after the name, trimmed.
    pub value: String,
}

/// What a patch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSummary {
    /// `(name, line)` of each rewritten definition.
    pub rewritten: Vec<(String, usize)>,
    /// `(name, line)` of later definitions of an already rewritten name,
    /// left as they were.
    pub duplicates: Vec<(String, usize)>,
    /// Names with no definition line at all.
    pub missing: Vec<String>,
}

impl PatchSummary {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.missing.is_empty()
    }
}

/// Rewrites definition lines for a configuration's parameters.
#[derive(Debug, Clone)]
pub struct TemplateEditor {
    marker: String,
}

impl TemplateEditor {
    pub fn new(marker: impl Into<String>) -> Self {
        TemplateEditor {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// The name defined by `line`, if it is a definition line.
    ///
    /// The marker must be followed by whitespace and the name is the whole
    /// next token, so `NBITS_AB` never matches `NBITS_A`.
    pub fn defined_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        let rest = line.strip_prefix(self.marker.as_str())?;
        if !rest.starts_with([' ', '\t']) {
            return None;
        }
        let rest = rest.trim_start_matches([' ', '\t']);
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let name = &rest[..end];
        (!name.is_empty()).then_some(name)
    }

    /// Canonical definition line for `name = value`.
    pub fn definition_line(&self, name: &str, value: u32) -> String {
        format!("{} {} {} \n", self.marker, name, value)
    }

    /// Every definition line in `text`, in file order.
    pub fn definitions(&self, text: &str) -> Vec<Definition> {
        text.split_inclusive('\n')
            .enumerate()
            .filter_map(|(i, line)| {
                let name = self.defined_name(line)?;
                let after = line
                    .trim_start_matches(self.marker.as_str())
                    .trim_start()
                    .strip_prefix(name)
                    .unwrap_or("");
                Some(Definition {
                    name: name.to_string(),
                    line: i + 1,
                    value: after.trim().to_string(),
                })
            })
            .collect()
    }

    /// Apply `config` to template text, returning the new text.
    pub fn patch_text(&self, text: &str, config: &Configuration) -> (String, PatchSummary) {
        let mut out = String::with_capacity(text.len());
        let mut summary = PatchSummary::default();

        for (i, line) in text.split_inclusive('\n').enumerate() {
            let param = self
                .defined_name(line)
                .and_then(|name| config.params().iter().find(|p| p.name == name));
            match param {
                Some(p) if summary.rewritten.iter().any(|(n, _)| n == &p.name) => {
                    summary.duplicates.push((p.name.clone(), i + 1));
                    out.push_str(line);
                }
                Some(p) => {
                    summary.rewritten.push((p.name.clone(), i + 1));
                    out.push_str(&self.definition_line(&p.name, p.value));
                }
                None => out.push_str(line),
            }
        }

        summary.missing = config
            .params()
            .iter()
            .filter(|p| !summary.rewritten.iter().any(|(n, _)| n == &p.name))
            .map(|p| p.name.clone())
            .collect();

        (out, summary)
    }

    /// Read the template at `path`.
    pub fn read(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SweepError::TemplateNotFound {
                path: path.to_path_buf(),
            },
            _ => SweepError::TemplateIo {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| SweepError::TemplateEncoding {
            path: path.to_path_buf(),
        })
    }

    /// Patch the template at `path` in place.
    pub fn apply(&self, path: &Path, config: &Configuration) -> Result<PatchSummary> {
        let text = self.read(path)?;
        let (patched, summary) = self.patch_text(&text, config);

        for (name, line) in &summary.duplicates {
            tracing::warn!(
                "{}:{line}: duplicate definition of {name} left unmodified",
                path.display()
            );
        }
        for name in &summary.missing {
            tracing::warn!("{}: no definition line for {name}", path.display());
        }

        write_atomically(path, patched.as_bytes())?;
        tracing::debug!(
            "patched {} ({} definitions)",
            path.display(),
            summary.rewritten.len()
        );
        Ok(summary)
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
///
/// The temp file is deleted if anything fails before the rename.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let io_err = |source: std::io::Error| SweepError::TemplateIo {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".bitsweep-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
