use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tf_patcher::manifest::{load_from_path, DependencyFile, FileRole, LockSettings, UpdateManifest};
use tf_patcher::update::{changed_requirements, single_dependency, FileUpdater, UpdatedFile};
use tf_patcher::{write_atomic, SandboxGuard, SourceKind, TerraformCli};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "tf-patcher")]
#[command(about = "Bump one Terraform dependency without touching anything else", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (overridden by TF_PATCHER_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a dependency update to a project
    Update {
        /// Update manifest (TOML or JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Project directory the manifest's file names are relative to
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,

        /// Show what would change without writing files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Program used for `providers lock` (default: TF_PATCHER_TERRAFORM, then the manifest)
        #[arg(long)]
        terraform: Option<PathBuf>,

        /// Seconds before the lock command is killed
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        lock_timeout: Option<u64>,
    },

    /// Report which files an update would change, without running terraform
    Check {
        /// Update manifest (TOML or JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Project directory the manifest's file names are relative to
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,
    },

    /// List the Terraform files found in a project and their roles
    Files {
        /// Project directory
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Update {
            manifest,
            dir,
            dry_run,
            diff,
            terraform,
            lock_timeout,
        } => cmd_update(&manifest, &dir, dry_run, diff, terraform, lock_timeout),

        Commands::Check { manifest, dir } => cmd_check(&manifest, &dir),

        Commands::Files { dir } => cmd_files(&dir),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("TF_PATCHER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the lock runner.
///
/// Priority order:
/// 1. Explicit --terraform flag
/// 2. TF_PATCHER_TERRAFORM environment variable
/// 3. `[lock] command` from the manifest
fn lock_runner(
    settings: &LockSettings,
    terraform: Option<PathBuf>,
    lock_timeout: Option<u64>,
) -> TerraformCli {
    let mut runner = TerraformCli::from_settings(settings);
    let program = terraform.or_else(|| env::var_os("TF_PATCHER_TERRAFORM").map(PathBuf::from));
    if let Some(program) = program {
        runner = TerraformCli::new(program)
            .with_extra_args(settings.extra_args.clone())
            .with_timeout(runner.timeout());
    }
    if let Some(secs) = lock_timeout {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    runner
}

/// Helper: Load the manifest's files, or discover them when none are listed.
fn load_dependency_files(dir: &Path, manifest: &UpdateManifest) -> Result<Vec<DependencyFile>> {
    if manifest.files.is_empty() {
        return discover_files(dir);
    }

    let guard = SandboxGuard::new(dir);
    let mut files = Vec::with_capacity(manifest.files.len());
    for entry in &manifest.files {
        let role = entry
            .resolved_role()
            .with_context(|| format!("cannot infer a role for {}", entry.name))?;
        let path = guard.resolve(&entry.name)?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(DependencyFile::new(entry.name.clone(), content, role));
    }
    Ok(files)
}

/// Helper: Walk `dir` for `*.tf`, `*.hcl` and lock files.
///
/// `.terraform/` and `.git/` are skipped. Names are relative to `dir` with
/// `/` separators, sorted.
fn discover_files(dir: &Path) -> Result<Vec<DependencyFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && matches!(entry.file_name().to_str(), Some(".terraform") | Some(".git")))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Some(role) = FileRole::from_file_name(&name) else {
            continue;
        };
        let content = fs::read_to_string(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        files.push(DependencyFile::new(name, content, role));
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Helper: Show unified diff between original and updated content
fn display_diff(file: &str, original: &str, updated: &str) {
    println!("\n{}", format!("--- {} (original)", file).dimmed());
    println!("{}", format!("+++ {} (updated)", file).dimmed());

    let diff = TextDiff::from_lines(original, updated);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn original_content<'a>(files: &'a [DependencyFile], name: &str) -> &'a str {
    files
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.content.as_str())
        .unwrap_or("")
}

fn load_manifest(path: &Path) -> Result<UpdateManifest> {
    let manifest = load_from_path(path)?;
    Ok(manifest)
}

fn cmd_update(
    manifest_path: &Path,
    dir: &Path,
    dry_run: bool,
    show_diff: bool,
    terraform: Option<PathBuf>,
    lock_timeout: Option<u64>,
) -> Result<()> {
    // 1. Load manifest and inputs
    let manifest = load_manifest(manifest_path)?;
    let dependency = single_dependency(&manifest.dependencies)?;
    let files = load_dependency_files(dir, &manifest)?;
    let runner = lock_runner(&manifest.lock, terraform, lock_timeout);

    println!("Project: {}", dir.display());
    println!("Dependency: {}", dependency.name.bold());
    println!();

    // 2. Compute updated files
    let updated = FileUpdater::new(dependency, &files, &runner).updated_dependency_files()?;

    if dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }

    // 3. Report and write
    let guard = SandboxGuard::new(dir);
    for UpdatedFile { name, content } in &updated {
        if dry_run {
            println!("{} Would update {}", "✓".green(), name);
        } else {
            let path = guard.resolve(name)?;
            write_atomic(&path, content.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Updated {}", "✓".green(), name);
        }

        if show_diff {
            display_diff(name, original_content(&files, name), content);
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} file(s) {}",
        format!("{}", updated.len()).green(),
        if dry_run { "would change" } else { "changed" }
    );

    Ok(())
}

fn cmd_check(manifest_path: &Path, dir: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let dependency = single_dependency(&manifest.dependencies)?;
    let files = load_dependency_files(dir, &manifest)?;

    println!("{}", "Update Check Report".bold());
    println!("Project: {}", dir.display());
    println!("Dependency: {}", dependency.name);
    println!();

    let updated = FileUpdater::without_lock_regeneration(dependency, &files)
        .updated_dependency_files()?;

    println!(
        "{} {} ({} files)",
        "⊙".yellow(),
        "WOULD CHANGE".yellow().bold(),
        updated.len()
    );
    for file in &updated {
        println!("  - {}", file.name);
    }

    let needs_lock = changed_requirements(dependency)?
        .iter()
        .any(|change| change.new.source.kind() == Some(SourceKind::Provider));
    if needs_lock {
        println!();
        println!(
            "{} {}",
            "⊘".cyan(),
            "Provider lock regeneration skipped (run `update` to regenerate)".dimmed()
        );
    }

    Ok(())
}

fn cmd_files(dir: &Path) -> Result<()> {
    let files = discover_files(dir)?;

    if files.is_empty() {
        println!("{}", "No Terraform files found".yellow());
        return Ok(());
    }

    for file in &files {
        println!("{:<28} {}", file.role.to_string().cyan(), file.name);
    }
    println!();
    println!("{} file(s)", files.len());

    Ok(())
}
