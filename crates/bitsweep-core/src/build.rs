//! Rebuilding the demo binary.
//!
//! A build is two steps: clear the build-system cache so configure starts
//! from scratch, then run configure and compile. The toolchain is a black
//! box: only exit statuses and stderr are looked at. After the build the
//! output binary, if any, is pinned by a [`BuildHandle`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use serde::Serialize;

use crate::config::BuildConfig;
use crate::integrity::ContentHash;
use crate::report::StepOutcome;

/// Outcome of configure + compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub succeeded: bool,
    /// Captured stderr, or the reason a command could not run.
    pub error_text: Option<String>,
}

impl BuildResult {
    pub fn ok() -> Self {
        BuildResult {
            succeeded: true,
            error_text: None,
        }
    }

    pub fn outcome(&self) -> StepOutcome {
        match (self.succeeded, &self.error_text) {
            (true, None) => StepOutcome::Ok,
            (true, Some(text)) => StepOutcome::Warning {
                detail: text.clone(),
            },
            (false, text) => StepOutcome::failed(
                text.clone().unwrap_or_else(|| "build failed".to_string()),
            ),
        }
    }
}

/// The external build system.
pub trait Toolchain {
    /// Remove build-system cache state. Best-effort.
    fn clean(&self, workdir: &Path) -> StepOutcome;

    /// Configure and compile in `workdir`. Blocks until done.
    fn build(&self, workdir: &Path) -> BuildResult;
}

/// Files removed by a cache clean.
#[derive(Debug, Clone, Default)]
pub struct CleanSummary {
    pub removed: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl CleanSummary {
    pub fn outcome(&self) -> StepOutcome {
        if self.errors.is_empty() {
            StepOutcome::Ok
        } else {
            StepOutcome::Warning {
                detail: self.errors.join("\n"),
            }
        }
    }
}

/// Remove each of `paths` (files or directories) under `workdir`.
/// Paths that do not exist are ignored.
pub fn clean_paths(workdir: &Path, paths: &[PathBuf]) -> CleanSummary {
    let mut summary = CleanSummary::default();
    for rel in paths {
        let path = workdir.join(rel);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                summary.errors.push(format!("{}: {e}", path.display()));
                continue;
            }
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => summary.removed.push(path),
            Err(e) => summary.errors.push(format!("{}: {e}", path.display())),
        }
    }
    summary
}

/// Runs the configured configure and compile commands.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    cache_paths: Vec<PathBuf>,
    configure: Vec<String>,
    compile: Vec<String>,
}

impl CommandToolchain {
    pub fn from_config(config: &BuildConfig) -> Self {
        let mut configure = config.configure.clone();
        if !config.backend_option.is_empty() {
            configure.push("-D".to_string());
            configure.push(config.backend_option.clone());
        }
        CommandToolchain {
            cache_paths: config.cache_paths.clone(),
            configure,
            compile: config.compile.clone(),
        }
    }

    /// Full configure command line, backend option included.
    pub fn configure_command(&self) -> &[String] {
        &self.configure
    }

    pub fn compile_command(&self) -> &[String] {
        &self.compile
    }
}

impl Toolchain for CommandToolchain {
    fn clean(&self, workdir: &Path) -> StepOutcome {
        let summary = clean_paths(workdir, &self.cache_paths);
        for path in &summary.removed {
            tracing::debug!("removed {}", path.display());
        }
        summary.outcome()
    }

    fn build(&self, workdir: &Path) -> BuildResult {
        let mut stderr = String::new();
        let mut succeeded = true;

        for argv in [&self.configure, &self.compile] {
            tracing::debug!("running `{}`", argv.join(" "));
            match run_command(argv, workdir) {
                Ok((true, err)) => stderr.push_str(&err),
                Ok((false, err)) => {
                    succeeded = false;
                    if err.is_empty() {
                        stderr.push_str(&format!("`{}` failed", argv.join(" ")));
                    } else {
                        stderr.push_str(&err);
                    }
                    break;
                }
                Err(reason) => {
                    succeeded = false;
                    stderr.push_str(&reason);
                    break;
                }
            }
        }

        BuildResult {
            succeeded,
            error_text: (!stderr.is_empty()).then_some(stderr),
        }
    }
}

/// Run one command with stdout discarded; returns `(success, stderr)`.
fn run_command(argv: &[String], workdir: &Path) -> Result<(bool, String), String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;
    let output = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("failed to run {program}: {e}"))?;
    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}

/// Pins the exact binary a build left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildHandle {
    pub path: PathBuf,
    pub hash: ContentHash,
    pub modified: Option<SystemTime>,
    /// False when the file is byte- and time-identical to what was there
    /// before the build, i.e. probably stale.
    pub rebuilt: bool,
}

type Snapshot = (ContentHash, Option<SystemTime>);

fn snapshot(path: &Path) -> Option<Snapshot> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    match ContentHash::of_file(path) {
        Ok(hash) => Some((hash, meta.modified().ok())),
        Err(e) => {
            tracing::warn!("cannot hash {}: {e}", path.display());
            None
        }
    }
}

/// Everything one build invocation produced.
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    pub clean: StepOutcome,
    pub result: BuildResult,
    /// `None` when no output binary exists after the build.
    pub handle: Option<BuildHandle>,
}

/// Cleans and rebuilds in a working directory.
#[derive(Debug, Clone)]
pub struct BuildInvoker<T> {
    toolchain: T,
    workdir: PathBuf,
    output: PathBuf,
}

impl<T: Toolchain> BuildInvoker<T> {
    /// `output` is the absolute (or workdir-joined) path of the binary.
    pub fn new(toolchain: T, workdir: PathBuf, output: PathBuf) -> Self {
        BuildInvoker {
            toolchain,
            workdir,
            output,
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn invoke(&self) -> BuildInvocation {
        let before = snapshot(&self.output);

        let clean = self.toolchain.clean(&self.workdir);
        if let StepOutcome::Warning { detail } = &clean {
            tracing::warn!("cache clean incomplete: {detail}");
        }

        let result = self.toolchain.build(&self.workdir);
        match (result.succeeded, &result.error_text) {
            (true, None) => tracing::info!("build succeeded"),
            (true, Some(text)) => tracing::warn!("build succeeded with diagnostics:\n{text}"),
            (false, text) => tracing::warn!(
                "build failed:\n{}",
                text.as_deref().unwrap_or("(no error output)")
            ),
        }

        let handle = snapshot(&self.output).map(|(hash, modified)| {
            let rebuilt = before.as_ref() != Some(&(hash.clone(), modified));
            if !rebuilt {
                tracing::warn!("{} was not rewritten by this build", self.output.display());
            }
            tracing::debug!("output {} sha256 {}", self.output.display(), hash.short());
            BuildHandle {
                path: self.output.clone(),
                hash,
                modified,
                rebuilt,
            }
        });
        if handle.is_none() {
            tracing::warn!("no build output at {}", self.output.display());
        }

        BuildInvocation {
            clean,
            result,
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn toolchain(configure: &str, compile: &str) -> CommandToolchain {
        CommandToolchain {
            cache_paths: vec![PathBuf::from("cache.txt"), PathBuf::from("cache_dir")],
            configure: sh(configure),
            compile: sh(compile),
        }
    }

    #[test]
    fn from_config_appends_backend_option() {
        let tc = CommandToolchain::from_config(&BuildConfig::default());
        assert_eq!(
            tc.configure_command().join(" "),
            "cmake -S . -B . -D AES_IMPL=aesni"
        );
        assert_eq!(tc.compile_command(), ["make".to_string()]);
    }

    #[test]
    fn clean_removes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cache.txt"), b"x").unwrap();
        fs::create_dir_all(dir.path().join("cache_dir/sub")).unwrap();

        let outcome = toolchain("true", "true").clean(dir.path());
        assert_eq!(outcome, StepOutcome::Ok);
        assert!(!dir.path().join("cache.txt").exists());
        assert!(!dir.path().join("cache_dir").exists());
    }

    #[test]
    fn clean_of_nothing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let summary = clean_paths(dir.path(), &[PathBuf::from("absent")]);
        assert!(summary.removed.is_empty());
        assert_eq!(summary.outcome(), StepOutcome::Ok);
    }

    #[test]
    fn build_captures_stderr_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let result = toolchain("echo configured; echo 'warn: x' >&2", "true").build(dir.path());
        assert!(result.succeeded);
        assert_eq!(result.error_text.as_deref(), Some("warn: x\n"));
        assert!(matches!(result.outcome(), StepOutcome::Warning { .. }));
    }

    #[test]
    fn failed_configure_skips_compile() {
        let dir = tempfile::tempdir().unwrap();
        let result = toolchain("exit 3", "touch compiled").build(dir.path());
        assert!(!result.succeeded);
        assert!(!dir.path().join("compiled").exists());
        assert!(result.outcome().is_failure());
    }

    #[test]
    fn missing_program_is_a_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tc = CommandToolchain {
            cache_paths: vec![],
            configure: vec!["bitsweep-no-such-program".into()],
            compile: sh("true"),
        };
        let result = tc.build(dir.path());
        assert!(!result.succeeded);
        assert!(result
            .error_text
            .unwrap()
            .contains("failed to run bitsweep-no-such-program"));
    }

    #[test]
    fn invoker_returns_handle_for_output() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = BuildInvoker::new(
            toolchain("true", "printf binary > demo"),
            dir.path().to_path_buf(),
            dir.path().join("demo"),
        );
        let run = invoker.invoke();
        assert!(run.result.succeeded);
        let handle = run.handle.unwrap();
        assert_eq!(handle.hash, ContentHash::compute(b"binary"));
        assert!(handle.rebuilt);
    }

    #[test]
    fn invoker_without_output_has_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = BuildInvoker::new(
            toolchain("true", "true"),
            dir.path().to_path_buf(),
            dir.path().join("demo"),
        );
        assert!(invoker.invoke().handle.is_none());
    }
}
