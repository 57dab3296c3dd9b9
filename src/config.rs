//! Project manifest (`solder.toml`) parsing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed `solder.toml`.
#[derive(Deserialize, Debug, Default)]
pub struct Manifest {
    pub package: PackageConfig,
    pub build: BuildConfig,
    /// Preprocessor defines, emitted as `-D<key>=<value>`.
    #[serde(default)]
    pub defines: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub version: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct BuildConfig {
    /// Regex patterns selecting source files by full path.
    pub sources: Vec<String>,
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    /// Extra libraries appended to the link line.
    #[serde(default)]
    pub libs: Vec<PathBuf>,
    /// Output path, relative to the project root. Default `build/lib<name>.so`.
    pub target: Option<PathBuf>,
    /// Concurrency of the compile stage. Default 1.
    pub jobs: Option<usize>,
    /// "gcc" or "clang". Default gcc.
    pub toolchain: Option<String>,
}

/// Read and parse a manifest, with errors a user can act on.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found.\n\n\
            💡 Tip: Run 'solder init' to create one.",
            path.display()
        ));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {} - check file permissions", path.display()))?;
    toml::from_str(&text).with_context(|| {
        format!(
            "failed to parse {} - check for syntax errors (missing quotes, brackets)",
            path.display()
        )
    })
}
