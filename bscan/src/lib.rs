//! # bscan
//!
//! Scan orchestration engine: the runtime store, subprocess supervisor,
//! service taxonomy & templater, port-scan parser, per-target pipeline,
//! status reporter, and pattern highlighter described by the project's
//! reconnaissance-orchestration design.
//!
//! Argument parsing, wordlist lookup, and reverse-shell generation live in
//! the companion `bscan-cli`/`bscan-wordlists`/`bscan-shells` binaries; this
//! crate only consumes the [`config::Configuration`] they assemble.

pub mod config;
pub mod highlighter;
pub mod parser;
pub mod pipeline;
pub mod runtime;
pub mod status;
pub mod structure;
pub mod supervisor;
pub mod taxonomy;

pub use config::{ConfigRequest, Configuration};
pub use pipeline::run_pipeline;
pub use runtime::{Runtime, RuntimeStats};
pub use supervisor::Supervisor;
