//! # solder - Shared-Library Build Orchestrator for C/C++
//!
//! solder takes a project directory, a set of source selection patterns and a
//! target path, and drives a native toolchain (GCC or Clang) to produce a
//! shared library: every matched source is compiled to an object file with
//! bounded parallelism, then the objects are linked in a single final step.
//!
//! ## Features
//!
//! - **Pattern-Based Discovery**: select sources with regular expressions
//! - **Parallel Compiles**: bounded-concurrency compile groups (`jobs = N`)
//! - **Supervised Processes**: stdout/stderr drained concurrently, no stalls
//! - **Live Progress**: textual `done&total[&label]` protocol drives the UI
//!
//! ## Quick Start
//!
//! ```bash
//! # Scaffold a project
//! solder init mylib
//!
//! # Build build/libmylib.so
//! solder build --jobs 4
//! ```
//!
//! ## Module Organization
//!
//! - [`builder`] - Build planning: discovery, object mapping, command assembly
//! - [`command`] - Commands, bounded-parallel groups, build plans
//! - [`process`] - Subprocess supervision with concurrent output draining
//! - [`toolchain`] - Toolchain selection and environment validation

/// Build planning: source discovery, object mapping, compile/link commands.
pub mod builder;

/// Single commands, bounded-parallel command groups, build plans.
pub mod command;

/// Project manifest (`solder.toml`) parsing.
pub mod config;

/// Localized message lookup.
pub mod locale;

/// Subprocess supervision with concurrent output draining.
pub mod process;

/// Toolchain selection and environment validation.
pub mod toolchain;
