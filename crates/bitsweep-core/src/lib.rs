//! Compile-time parameter sweeps.
//!
//! A sweep walks a matrix of bit-width configurations. For each one it
//! rewrites the `#define` lines of a build template, rebuilds the program
//! from a clean build-system cache, and archives the binary under a name
//! encoding the configuration and a difficulty index:
//!
//! ```text
//! for each configuration (ascending):
//!     template  <- patch(configuration)
//!     binary    <- clean + configure + compile
//!     for d in 0..primary_value:
//!         copy binary -> <basename>_<primary_value>_<d>
//! ```
//!
//! Everything runs sequentially in one working directory.

pub mod archive;
pub mod build;
pub mod config;
pub mod error;
pub mod integrity;
pub mod matrix;
pub mod orchestrator;
pub mod report;
pub mod template;

pub use archive::{archive_key, archive_name, ArchivedArtifact, ArtifactArchiver};
pub use build::{BuildHandle, BuildInvoker, BuildResult, CommandToolchain, Toolchain};
pub use config::SweepConfig;
pub use error::{Result, SweepError};
pub use integrity::ContentHash;
pub use matrix::{BitRange, Configuration, Parameter, ParameterMatrix, SelectionPolicy};
pub use orchestrator::Orchestrator;
pub use report::{StepOutcome, SweepReport};
pub use template::{PatchSummary, TemplateEditor};
