//! `bitsweep.toml` discovery and the default template for `bitsweep init`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bitsweep_core::SweepConfig;

/// File name searched for by every command.
pub const MANIFEST_NAME: &str = "bitsweep.toml";

/// Search upward from `start_dir` for a `bitsweep.toml`, parse and return it
/// along with the directory it was found in.
pub fn find_and_load(start_dir: &Path) -> Result<Option<(SweepConfig, PathBuf)>> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(MANIFEST_NAME);
        if candidate.is_file() {
            let content = std::fs::read_to_string(&candidate)
                .with_context(|| format!("reading {}", candidate.display()))?;
            let config = SweepConfig::from_toml_str(&content)
                .with_context(|| format!("parsing {}", candidate.display()))?;
            return Ok(Some((config, dir)));
        }
        if !dir.pop() {
            break;
        }
    }
    Ok(None)
}

/// Default `bitsweep.toml` written by `bitsweep init`.
pub fn template() -> String {
    r##"# Compile-time parameter sweep.

[sweep]
# Bit-widths start..end (end exclusive).
start = 16
end = 25
# "diagonal": every parameter takes the same value.
# "product": every combination of values.
policy = "diagonal"

[template]
path = "demos/sha2_collision_demo.cpp"
marker = "#define"
parameters = ["NBITS_A", "NBITS_B", "NBITS_C"]
# Names archives and sets the number of difficulty levels (default: last parameter).
primary = "NBITS_C"

[build]
cache_paths = ["CMakeCache.txt", "CMakeFiles"]
configure = ["cmake", "-S", ".", "-B", "."]
backend_option = "AES_IMPL=aesni"
compile = ["make"]
output = "sha2_collision_demo"

[archive]
dir = "."

[policy]
# "skip-configuration" or "abort-sweep"
on_template_error = "skip-configuration"
# "continue" or "skip-archive"
on_build_error = "continue"
"##
    .to_string()
}
