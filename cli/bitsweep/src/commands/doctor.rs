//! `bitsweep doctor`: toolchain and template diagnostics.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use bitsweep_core::{SweepConfig, TemplateEditor};

/// Print diagnostic information about the sweep setup.
pub fn run(workdir: &Path, config: &SweepConfig, manifest_found: bool) -> Result<()> {
    println!("=== Bitsweep Doctor ===");
    println!();
    println!("Bitsweep version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- System Tools ---");
    for argv in [&config.build.configure, &config.build.compile] {
        if let Some(program) = argv.first() {
            print_tool_status(program, &["--version"]);
        }
    }
    println!();

    println!("--- Sweep ---");
    if manifest_found {
        println!("  bitsweep.toml: found at {}", workdir.display());
    } else {
        println!("  bitsweep.toml: not found (using defaults)");
    }
    match config.validate().and_then(|_| config.matrix()) {
        Ok(matrix) => println!(
            "  Matrix: {} configurations over {} ({})",
            matrix.len(),
            matrix.range(),
            matrix.policy()
        ),
        Err(e) => println!("  Matrix: invalid: {e}"),
    }
    let output = config.output_path(workdir);
    println!(
        "  Output: {} ({})",
        output.display(),
        if output.is_file() { "present" } else { "not built" }
    );
    println!();

    println!("--- Template ---");
    for line in template_status(workdir, config) {
        println!("  {line}");
    }

    Ok(())
}

/// One status line per recognised parameter.
pub fn template_status(workdir: &Path, config: &SweepConfig) -> Vec<String> {
    let path = config.template_path(workdir);
    let editor = TemplateEditor::new(config.template.marker.clone());
    let text = match editor.read(&path) {
        Ok(text) => text,
        Err(e) => return vec![format!("{e}")],
    };

    let definitions = editor.definitions(&text);
    let mut lines = vec![format!("{}: {} lines", path.display(), text.lines().count())];
    for name in &config.template.parameters {
        let found: Vec<_> = definitions.iter().filter(|d| &d.name == name).collect();
        lines.push(match found.as_slice() {
            [] => format!("{name}: missing"),
            [d] => format!("{name}: line {} = {}", d.line, d.value),
            [first, rest @ ..] => format!(
                "{name}: line {} = {} (duplicates at lines {} are not rewritten)",
                first.line,
                first.value,
                rest.iter()
                    .map(|d| d.line.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }
    lines
}

fn print_tool_status(name: &str, args: &[&str]) {
    match Command::new(name).args(args).output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(_) => {
            println!("  {name}: not found");
        }
    }
}
