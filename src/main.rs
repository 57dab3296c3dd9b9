//! # solder CLI entry point
//!
//! Parses CLI arguments with clap and drives the build pipeline: the plan
//! produced by the builder is executed stage by stage, compile-group progress
//! is routed through the textual progress protocol into an indicatif bar, and
//! the link step only runs when every compile succeeded.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use solder::builder::{BuilderConfig, ProjectBuilder, SharedLibBuilder};
use solder::command::{BuildPlan, CancelToken, Step};
use solder::config::{self, Manifest};
use solder::locale::{tr, tr_args};
use solder::toolchain::Toolchain;

#[derive(Parser)]
#[command(name = "solder")]
#[command(about = "Shared-library build orchestrator for C/C++", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile matched sources and link the shared library
    Build {
        /// Path to the project manifest
        #[arg(long, default_value = "solder.toml")]
        manifest: PathBuf,
        /// Number of parallel compile jobs (overrides the manifest)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Toolchain to use: gcc or clang (overrides the manifest)
        #[arg(long)]
        toolchain: Option<String>,
        /// Show what would be executed without running
        #[arg(long)]
        dry_run: bool,
        /// Stop scheduling further compiles after the first failure
        #[arg(long)]
        fail_fast: bool,
        /// Show every command before the build runs
        #[arg(short, long)]
        verbose: bool,
    },
    /// Verify that the toolchain executables exist
    Check {
        /// Path to the project manifest
        #[arg(long, default_value = "solder.toml")]
        manifest: PathBuf,
        /// Toolchain to check: gcc or clang (overrides the manifest)
        #[arg(long)]
        toolchain: Option<String>,
    },
    /// Scaffold a starter manifest and source tree
    Init {
        /// Project name (defaults to the current directory's name)
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            manifest,
            jobs,
            toolchain,
            dry_run,
            fail_fast,
            verbose,
        } => cmd_build(&manifest, jobs, toolchain, dry_run, fail_fast, verbose),
        Commands::Check {
            manifest,
            toolchain,
        } => cmd_check(&manifest, toolchain),
        Commands::Init { name } => cmd_init(name),
    }
}

fn resolve_toolchain(cli: Option<String>, manifest: &Manifest) -> Result<Toolchain> {
    let named = cli.or_else(|| manifest.build.toolchain.clone());
    match named {
        Some(name) => name.parse::<Toolchain>().map_err(|e| anyhow!(e)),
        None => Ok(Toolchain::Gcc),
    }
}

fn project_root(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// --- COMMAND: Build ---
fn cmd_build(
    manifest_path: &Path,
    jobs: Option<usize>,
    toolchain: Option<String>,
    dry_run: bool,
    fail_fast: bool,
    verbose: bool,
) -> Result<()> {
    let manifest = config::load_manifest(manifest_path)?;
    let root = project_root(manifest_path);
    let toolchain = resolve_toolchain(toolchain, &manifest)?;

    let jobs = jobs.or(manifest.build.jobs).unwrap_or(1);
    let jobs = NonZeroUsize::new(jobs).context("jobs must be at least 1")?;

    let target = root.join(
        manifest
            .build
            .target
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("build/lib{}.so", manifest.package.name))),
    );
    let build_dir = root.join("build").join("obj");
    let includes = manifest.build.includes.iter().map(|p| root.join(p)).collect();
    let link_libs = manifest.build.libs.iter().map(|p| root.join(p)).collect();

    println!(
        "{} Project: {} ({})",
        "🔨".blue(),
        manifest.package.name.bold(),
        toolchain
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let bar_sink = bar.clone();
    let mut builder = SharedLibBuilder::new(
        BuilderConfig {
            project_root: root.clone(),
            build_dir: build_dir.clone(),
            toolchain,
            sources: manifest.build.sources.clone(),
            includes,
            target: target.clone(),
            link_libs,
        },
        move |label, progress| {
            let len = bar_sink.length().unwrap_or(0);
            bar_sink.set_position((progress * len as f64).round() as u64);
            bar_sink.set_message(label.to_string());
        },
    )?;
    for (key, value) in &manifest.defines {
        builder.add_define(key, value);
    }
    builder.set_jobs(jobs);

    let plan = builder.build_project()?;

    if dry_run || verbose {
        for step in &plan {
            match step {
                Step::Group(group) => {
                    for (command, _) in group.members() {
                        println!("   {} {}", "»".cyan(), command);
                    }
                }
                Step::Single(command) => println!("   {} {}", "»".cyan(), command),
            }
        }
        if dry_run {
            println!("{} DRY RUN - nothing was executed", "!".yellow());
            return Ok(());
        }
    }

    if let Some(Step::Group(group)) = plan.first()
        && group.is_empty()
    {
        println!("{} {}", "!".yellow(), tr("build.no_sources"));
        return Ok(());
    }

    fs::create_dir_all(&build_dir).context("failed to create the build directory")?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).context("failed to create the target directory")?;
    }

    let start = Instant::now();
    execute_plan(&plan, &builder, &bar, fail_fast)?;

    println!(
        "{} Build finished in {:.2?} -> {}",
        "✓".green(),
        start.elapsed(),
        target.display()
    );
    Ok(())
}

/// Run the plan stage by stage. A stage starts only after the previous one
/// has fully completed; a failed compile group aborts before the link step.
fn execute_plan(
    plan: &BuildPlan,
    builder: &SharedLibBuilder,
    bar: &ProgressBar,
    fail_fast: bool,
) -> Result<()> {
    let cancel = CancelToken::new();
    for step in plan {
        match step {
            Step::Group(group) => {
                bar.set_length(group.len() as u64);
                bar.set_message("Compiling...");

                let failures = group.run(&cancel, fail_fast, |done, total, label| {
                    // Completion events travel as protocol lines so the
                    // builder's output processor stays the single parser.
                    let line = format!("{done}&{total}&{label}");
                    if let Err(err) = builder.output_processor(&line) {
                        eprintln!("{} {}", "!".yellow(), err);
                    }
                })?;
                bar.finish_with_message("Compilation complete");

                if !failures.is_empty() {
                    for failure in &failures {
                        eprintln!("{} {}", "x".red(), failure);
                    }
                    bail!(tr_args(
                        "build.compile.failed",
                        &[&failures.len().to_string()]
                    ));
                }
            }
            Step::Single(command) => {
                println!("   {} Linking...", "🔗".cyan());
                let code = command.status().context("failed to run the linker")?;
                if code != 0 {
                    bail!(tr_args("build.link.failed", &[&code.to_string()]));
                }
            }
        }
    }
    Ok(())
}

// --- COMMAND: Check ---
fn cmd_check(manifest_path: &Path, toolchain: Option<String>) -> Result<()> {
    // The manifest is optional here; checking a bare toolchain is fine.
    let manifest = if manifest_path.exists() {
        config::load_manifest(manifest_path)?
    } else {
        Manifest::default()
    };
    let toolchain = resolve_toolchain(toolchain, &manifest)?;

    toolchain.check_env()?;
    println!(
        "{} {} toolchain OK ({}, {})",
        "✓".green(),
        toolchain,
        toolchain.cc().display(),
        toolchain.cxx().display()
    );
    Ok(())
}

// --- COMMAND: Init ---
fn cmd_init(name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => std::env::current_dir()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mylib".to_string()),
    };

    if Path::new("solder.toml").exists() {
        bail!("solder.toml already exists in this directory");
    }

    let manifest = format!(
        r#"[package]
name = "{name}"
version = "0.1.0"

[build]
sources = ['src/.*\.(c|cc|cpp|cxx)$']
includes = ["include"]
jobs = 2

[defines]
"#
    );
    fs::write("solder.toml", manifest)?;
    fs::create_dir_all("src")?;
    fs::create_dir_all("include")?;
    fs::write(
        "src/lib.c",
        "int answer(void) {\n    return 42;\n}\n",
    )?;

    println!("{} Created project '{}'", "✓".green(), name.bold());
    println!("   Run {} to produce build/lib{}.so", "solder build".bold(), name);
    Ok(())
}
