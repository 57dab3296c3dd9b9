//! Build planning: source discovery, object mapping, command assembly.
//!
//! [`SharedLibBuilder`] walks a project tree, selects sources by regex,
//! derives a collision-free object path for each and assembles the build
//! pipeline: one bounded-parallel compile group followed by a single link
//! command. It never executes the plan itself; running the commands and
//! interpreting exit codes is the caller's job.

use crate::command::{BuildPlan, Command, CommandGroup, Step};
use crate::locale::tr_args;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions that select the C++ frontend, for compiling and for linking.
const CPP_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "cppm"];

/// A build backend that plans the work for one project.
///
/// Implementations validate their environment, turn the project tree into a
/// [`BuildPlan`] for the caller to execute, and translate progress-protocol
/// lines into result callbacks.
pub trait ProjectBuilder {
    /// Verify that every executable this backend needs exists on disk.
    fn check_env(&self) -> Result<()>;

    /// Discover sources and assemble the compile/link pipeline.
    fn build_project(&self) -> Result<BuildPlan>;

    /// Parse one `done&total[&label]` progress line and forward it to the
    /// result callback.
    fn output_processor(&self, line: &str) -> Result<()>;
}

/// Everything a [`SharedLibBuilder`] is constructed from. `defines` and the
/// job count are configured afterwards through [`SharedLibBuilder::add_define`]
/// and [`SharedLibBuilder::set_jobs`].
pub struct BuilderConfig {
    /// Root of the tree to walk for sources.
    pub project_root: PathBuf,
    /// Directory receiving the derived object files.
    pub build_dir: PathBuf,
    /// Compiler family to drive.
    pub toolchain: Toolchain,
    /// Regex patterns; a file is included if any pattern is found anywhere
    /// in its full path string.
    pub sources: Vec<String>,
    /// Include directories, emitted as `-I<dir>`.
    pub includes: Vec<PathBuf>,
    /// Output path of the shared library.
    pub target: PathBuf,
    /// Extra libraries appended to the link line.
    pub link_libs: Vec<PathBuf>,
}

/// Plans shared-library builds against a native GCC or Clang toolchain.
pub struct SharedLibBuilder {
    project_root: PathBuf,
    build_dir: PathBuf,
    toolchain: Toolchain,
    patterns: Vec<Regex>,
    includes: Vec<PathBuf>,
    target: PathBuf,
    link_libs: Vec<PathBuf>,
    defines: BTreeMap<String, String>,
    jobs: NonZeroUsize,
    on_progress: Box<dyn Fn(&str, f64) + Send + Sync>,
}

impl SharedLibBuilder {
    /// Compile the selection patterns and resolve the project root.
    ///
    /// `on_progress` receives `(label, fraction)` for every progress line fed
    /// through [`ProjectBuilder::output_processor`].
    pub fn new<F>(config: BuilderConfig, on_progress: F) -> Result<Self>
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        let patterns = config
            .sources
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid source pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let project_root = config.project_root.canonicalize().with_context(|| {
            format!(
                "project root {} is not accessible",
                config.project_root.display()
            )
        })?;

        Ok(Self {
            project_root,
            build_dir: config.build_dir,
            toolchain: config.toolchain,
            patterns,
            includes: config.includes,
            target: config.target,
            link_libs: config.link_libs,
            defines: BTreeMap::new(),
            jobs: NonZeroUsize::MIN,
            on_progress: Box::new(on_progress),
        })
    }

    /// Add a preprocessor define, emitted as `-D<key>=<value>`. The last
    /// write for a key wins.
    pub fn add_define(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.defines.insert(key.into(), value.into());
    }

    /// Set the concurrency limit of the compile stage (default 1).
    pub fn set_jobs(&mut self, jobs: NonZeroUsize) {
        self.jobs = jobs;
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Label used for progress lines that carry no label of their own.
    pub fn default_label(&self) -> String {
        tr_args("build.target.name", &[&self.target.display().to_string()])
    }

    // --- Discovery: walk the tree, keep pattern matches ---
    //
    // Per-file walk errors are skipped; a file that cannot be visited never
    // aborts the walk. The mapping is keyed by source path, so a file
    // matching several patterns is still compiled once.
    fn discover_sources(&self) -> BTreeMap<PathBuf, PathBuf> {
        let mut mapping = BTreeMap::new();
        for entry in WalkDir::new(&self.project_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let text = path.to_string_lossy();
            if self.patterns.iter().any(|pattern| pattern.is_match(&text)) {
                mapping.insert(
                    path.to_path_buf(),
                    self.build_dir.join(object_file_name(path)),
                );
            }
        }
        mapping
    }

    fn compile_command(&self, source: &Path, object: &Path) -> Command {
        let compiler = if is_cpp_source(source) {
            self.toolchain.cxx()
        } else {
            self.toolchain.cc()
        };

        let mut args = vec![
            "-c".to_string(),
            "-fPIC".to_string(),
            source.display().to_string(),
            "-o".to_string(),
            object.display().to_string(),
        ];
        for include in &self.includes {
            args.push(format!("-I{}", include.display()));
        }
        for (key, value) in &self.defines {
            args.push(format!("-D{key}={value}"));
        }

        Command::new(&self.project_root, compiler, args)
    }

    fn link_command(&self, mapping: &BTreeMap<PathBuf, PathBuf>) -> Command {
        let linker = if mapping.keys().any(|source| is_cpp_source(source)) {
            self.toolchain.cxx()
        } else {
            self.toolchain.cc()
        };

        let mut args: Vec<String> = mapping
            .values()
            .map(|object| object.display().to_string())
            .collect();
        args.extend(self.link_libs.iter().map(|lib| lib.display().to_string()));
        args.push("-shared".to_string());
        args.push("-o".to_string());
        args.push(self.target.display().to_string());

        Command::new(&self.project_root, linker, args)
    }
}

impl ProjectBuilder for SharedLibBuilder {
    fn check_env(&self) -> Result<()> {
        self.toolchain.check_env()?;
        Ok(())
    }

    fn build_project(&self) -> Result<BuildPlan> {
        // A broken toolchain fails here, before any command exists.
        self.check_env()?;

        let mapping = self.discover_sources();
        let members = mapping
            .iter()
            .map(|(source, object)| {
                (
                    self.compile_command(source, object),
                    source.to_string_lossy().into_owned(),
                )
            })
            .collect();

        let compiles = CommandGroup::new(members, self.jobs.get());
        let link = self.link_command(&mapping);
        Ok(vec![Step::Group(compiles), Step::Single(link)])
    }

    fn output_processor(&self, line: &str) -> Result<()> {
        // The label is the remainder of the line, so a source path that
        // itself contains the delimiter still arrives intact.
        let fields: Vec<&str> = line.splitn(3, '&').collect();
        let (done, total, label) = match fields.as_slice() {
            [done, total] => (*done, *total, None),
            [done, total, label] => (*done, *total, Some(*label)),
            _ => return Err(anyhow!(tr_args("progress.malformed", &[line]))),
        };

        let done: f64 = done
            .parse()
            .map_err(|_| anyhow!(tr_args("progress.malformed", &[line])))?;
        let total: f64 = total
            .parse()
            .map_err(|_| anyhow!(tr_args("progress.malformed", &[line])))?;

        let label = label
            .map(str::to_owned)
            .unwrap_or_else(|| self.default_label());
        (self.on_progress)(&label, done / total);
        Ok(())
    }
}

/// Derived object file name for a source path: a URL-safe base64 encoding of
/// the full path string plus `.o`. Byte-preserving and collision-free, so two
/// sources sharing a basename in different directories never clash, and the
/// source path can be recovered for debugging.
pub fn object_file_name(source: &Path) -> String {
    format!(
        "{}.o",
        URL_SAFE_NO_PAD.encode(source.to_string_lossy().as_bytes())
    )
}

/// Invert [`object_file_name`], recovering the original source path.
pub fn source_from_object_name(name: &str) -> Result<PathBuf> {
    let stem = name
        .strip_suffix(".o")
        .with_context(|| format!("object name '{name}' has no .o suffix"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(stem)
        .with_context(|| format!("object name '{name}' is not a valid encoding"))?;
    let path = String::from_utf8(bytes)
        .with_context(|| format!("object name '{name}' does not decode to UTF-8"))?;
    Ok(PathBuf::from(path))
}

fn is_cpp_source(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| CPP_EXTENSIONS.contains(&ext.as_str()))
}
