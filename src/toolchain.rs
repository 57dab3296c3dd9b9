//! Toolchain selection and environment validation.
//!
//! A [`Toolchain`] names a compiler family and fixes the executable paths it
//! uses. There is no PATH search: the binaries either exist at their
//! well-known locations or the environment check fails before any build
//! planning happens.

use crate::locale::tr_args;
use std::path::{Path, PathBuf};

/// A compiler/linker family with fixed executable locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    /// GNU Compiler Collection (gcc / g++)
    Gcc,
    /// Clang/LLVM (clang / clang++)
    Clang,
}

impl Toolchain {
    /// Path of the C frontend.
    pub fn cc(&self) -> &'static Path {
        Path::new(match self {
            Toolchain::Gcc => "/usr/bin/gcc",
            Toolchain::Clang => "/usr/bin/clang",
        })
    }

    /// Path of the C++ frontend.
    pub fn cxx(&self) -> &'static Path {
        Path::new(match self {
            Toolchain::Gcc => "/usr/bin/g++",
            Toolchain::Clang => "/usr/bin/clang++",
        })
    }

    /// Verify that both frontends of this variant exist on disk.
    ///
    /// Only the selected variant is checked; a missing clang is not an error
    /// for a GCC build.
    pub fn check_env(&self) -> Result<(), ToolchainError> {
        for binary in [self.cc(), self.cxx()] {
            if !binary.exists() {
                return Err(ToolchainError::Missing {
                    toolchain: *self,
                    binary: binary.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Toolchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcc" | "g++" => Ok(Toolchain::Gcc),
            "clang" | "clang++" => Ok(Toolchain::Clang),
            other => Err(format!(
                "unknown toolchain '{}' (expected gcc or clang)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Toolchain::Gcc => write!(f, "gcc"),
            Toolchain::Clang => write!(f, "clang"),
        }
    }
}

/// Error type for toolchain validation.
#[derive(Debug)]
pub enum ToolchainError {
    /// A required frontend is absent from its fixed location.
    Missing {
        toolchain: Toolchain,
        binary: PathBuf,
    },
}

impl std::fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolchainError::Missing { toolchain, binary } => {
                let key = match toolchain {
                    Toolchain::Gcc => "toolchain.gcc.corrupt",
                    Toolchain::Clang => "toolchain.clang.corrupt",
                };
                write!(f, "{}", tr_args(key, &[&binary.display().to_string()]))
            }
        }
    }
}

impl std::error::Error for ToolchainError {}
