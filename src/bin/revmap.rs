//! # revmap CLI - Branching history for key/value documents
//!
//! A command-line interface for the revmap library.
//!
//! ## Features
//! - Commit key/value documents and browse their history
//! - Create, switch and delete branches
//! - Compare any two versions field by field
//! - Three-way merge with explicit conflict resolution
//! - Soft and hard rollback
//! - Verify repository integrity
//!
//! ## Usage
//! ```bash
//! # Initialize a repository in .revmap
//! revmap init
//!
//! # Commit a change to the document
//! revmap commit -m "Set title" --set title=Draft --set pages=3
//!
//! # Branch, edit and merge back
//! revmap branch create review
//! revmap commit -m "Review" --set title=Final
//! revmap switch main
//! revmap merge review --resolve title=a
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use humantime::format_duration;
use revmap::utils::{parse_assignment, preview_value};
use revmap::verification::verify_backend;
use revmap::version::short_id;
use revmap::{
    CompressionStrategy, DiffResult, FileBackend, Resolution, Result, Revmap, RevmapBuilder,
    RevmapError, Version,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Width of value previews in diff and conflict listings
const PREVIEW_WIDTH: usize = 60;

/// revmap CLI - Versioned key/value documents with branches and merges
#[derive(Parser)]
#[command(name = "revmap")]
#[command(version)]
#[command(about = "Branching, diffing and three-way merging for key/value documents")]
#[command(long_about = None)]
struct Cli {
    /// Storage directory (defaults to .revmap)
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository
    Init {
        /// Compression strategy for stored history
        #[arg(long, value_enum, default_value = "fast")]
        compression: CompressionMode,

        /// Default author for commits
        #[arg(long)]
        author: Option<String>,
    },

    /// Commit changes to the active branch
    #[command(alias = "ci")]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Author (defaults to the configured author)
        #[arg(long)]
        author: Option<String>,

        /// Replace the document with a JSON object read from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Set a field (value parsed as JSON, otherwise taken as a string)
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Remove a field
        #[arg(long, value_name = "KEY")]
        unset: Vec<String>,
    },

    /// Show a version (defaults to the active head)
    Show {
        /// Version ID or unique prefix
        id: Option<String>,
    },

    /// Show history of a branch
    Log {
        /// Branch (defaults to the active branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Follow merge parents too
        #[arg(long)]
        full: bool,

        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show every version as a tree
    #[command(alias = "tl")]
    Timeline,

    /// Manage branches
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Switch the active branch
    #[command(alias = "checkout")]
    Switch {
        /// Branch name
        name: String,
    },

    /// Compare two versions
    Diff {
        /// From version
        from: String,

        /// To version
        to: String,

        /// Show only statistics
        #[arg(long)]
        stat: bool,
    },

    /// Merge a branch into the active branch
    Merge {
        /// Branch to merge from
        source: String,

        /// Resolve a conflict: KEY=a|b|base|remove|json:VALUE
        #[arg(short, long, value_name = "KEY=CHOICE")]
        resolve: Vec<String>,

        /// Merge-commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Roll back to an earlier version
    Rollback {
        #[command(subcommand)]
        mode: RollbackMode,
    },

    /// Verify repository integrity
    Verify,

    /// Show current status
    Status,
}

#[derive(Subcommand)]
enum BranchAction {
    /// List branches
    #[command(alias = "ls")]
    List,

    /// Create a branch and switch to it
    Create {
        /// Branch name
        name: String,

        /// Starting version (defaults to the active head)
        #[arg(long)]
        from: Option<String>,
    },

    /// Delete a branch
    #[command(alias = "rm")]
    Delete {
        /// Branch name
        name: String,
    },
}

#[derive(Subcommand)]
enum RollbackMode {
    /// Create a branch at the target and switch to it
    Soft {
        /// Version ID or unique prefix
        target: String,

        /// Name of the new branch
        name: String,
    },

    /// Delete every version newer than the target
    Hard {
        /// Version ID or unique prefix
        target: String,

        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompressionMode {
    None,
    Fast,
    Adaptive,
}

impl From<CompressionMode> for CompressionStrategy {
    fn from(mode: CompressionMode) -> Self {
        match mode {
            CompressionMode::None => CompressionStrategy::None,
            CompressionMode::Fast => CompressionStrategy::Fast,
            CompressionMode::Adaptive => CompressionStrategy::Adaptive { min_size: 4096 },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG drives logging; -v forces debug
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let storage_path = cli.storage.unwrap_or_else(|| PathBuf::from(".revmap"));

    match cli.command {
        Commands::Init { compression, author } => cmd_init(storage_path, compression, author),
        Commands::Commit {
            message,
            author,
            file,
            set,
            unset,
        } => cmd_commit(storage_path, message, author, file, set, unset),
        Commands::Show { id } => cmd_show(storage_path, id),
        Commands::Log { branch, full, limit } => cmd_log(storage_path, branch, full, limit),
        Commands::Timeline => cmd_timeline(storage_path),
        Commands::Branch { action } => cmd_branch(storage_path, action),
        Commands::Switch { name } => cmd_switch(storage_path, name),
        Commands::Diff { from, to, stat } => cmd_diff(storage_path, from, to, stat),
        Commands::Merge {
            source,
            resolve,
            message,
        } => cmd_merge(storage_path, source, resolve, message),
        Commands::Rollback { mode } => cmd_rollback(storage_path, mode),
        Commands::Verify => cmd_verify(storage_path),
        Commands::Status => cmd_status(storage_path),
    }
}

/// Initialize a repository
///
/// The storage directory contains:
/// - metadata.json: configuration and format version
/// - versions.json: every version, optionally LZ4 compressed
/// - branches.json: branch name to head id
/// - HEAD: active branch name
fn cmd_init(
    storage_path: PathBuf,
    compression: CompressionMode,
    author: Option<String>,
) -> Result<()> {
    let mut builder = RevmapBuilder::new().compression_strategy(compression.into());
    if let Some(author) = author {
        builder = builder.default_author(author);
    }
    let repo = builder.init(storage_path.clone())?;

    println!("{} Initialized revmap repository", "✓".green().bold());
    println!("  Storage: {}", storage_path.display().to_string().cyan());
    println!("  Author: {}", repo.config().default_author.cyan());
    println!("  Compression: {}", repo.config().compression_strategy.name().cyan());
    println!("\nNext steps:");
    println!(
        "  - Make your first commit: {}",
        "revmap commit -m \"Initial\" --set key=value".yellow()
    );

    Ok(())
}

/// Commit a new version on the active branch
///
/// The document starts from the active head, is replaced by `--file` when
/// given, then `--set` and `--unset` are applied in that order.
fn cmd_commit(
    storage_path: PathBuf,
    message: String,
    author: Option<String>,
    file: Option<PathBuf>,
    set: Vec<String>,
    unset: Vec<String>,
) -> Result<()> {
    let mut repo = Revmap::open(storage_path)?;

    if let Some(path) = file {
        let raw = std::fs::read_to_string(&path)?;
        let data = serde_json::from_str(&raw)?;
        repo.set_working_data(data);
    }
    for assignment in &set {
        let (key, value) = parse_assignment(assignment)?;
        repo.set(key, value);
    }
    for key in &unset {
        if repo.remove(key).is_none() {
            return Err(RevmapError::validation(format!("no field named '{}'", key)));
        }
    }

    let pending = repo.pending_changes().stats();
    let version = repo.commit_working(&message, author.as_deref())?;

    println!(
        "{} Committed {} on {}",
        "✓".green().bold(),
        version.short_id().yellow().bold(),
        repo.active_branch().name.cyan()
    );
    println!("  Message: {}", version.message.cyan());
    println!(
        "  Changes: {} added, {} modified, {} removed",
        pending.keys_added.to_string().green(),
        pending.keys_modified.to_string().yellow(),
        pending.keys_removed.to_string().red()
    );

    Ok(())
}

/// Show one version and its data
fn cmd_show(storage_path: PathBuf, id: Option<String>) -> Result<()> {
    let repo = Revmap::open(storage_path)?;
    let version = match id {
        Some(id) => repo.get_version(&id)?,
        None => repo.head_version().ok_or_else(|| {
            RevmapError::validation(format!(
                "branch '{}' has no commits",
                repo.active_branch().name
            ))
        })?,
    };

    println!("{} {}", "Version".blue().bold(), version.short_id().yellow().bold());
    println!();
    println!("  Full ID: {}", version.id.dimmed());
    println!("  Author: {}", version.author);
    println!(
        "  Created: {} ({})",
        version.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        age(version.timestamp)
    );
    println!("  Message: {}", version.message.cyan());
    match &version.parent_id {
        Some(parent) => println!("  Parent: {}", short_id(parent).yellow()),
        None => println!("  Parent: {}", "None (root version)".dimmed()),
    }
    if let Some(merge_parent) = &version.merge_parent_id {
        println!("  Merged: {}", short_id(merge_parent).yellow());
    }
    println!("  State hash: {}", version.state_hash.chars().take(16).collect::<String>().dimmed());

    println!("\n{}", "Data:".bold());
    println!("{}", serde_json::to_string_pretty(&version.data)?);

    Ok(())
}

/// Show history, newest first
fn cmd_log(
    storage_path: PathBuf,
    branch: Option<String>,
    full: bool,
    limit: Option<usize>,
) -> Result<()> {
    let repo = Revmap::open(storage_path)?;
    let branch = branch.unwrap_or_else(|| repo.active_branch().name);
    let head = repo.head_of(&branch)?;

    let history = match (&head, full) {
        (Some(head), true) => repo.full_history(head)?,
        _ => repo.history(&branch)?,
    };

    if history.is_empty() {
        println!("{}", format!("No commits on {}.", branch).yellow());
        return Ok(());
    }

    println!("{} {}", "History of".blue().bold(), branch.cyan());
    println!();

    let display_count = limit.unwrap_or(history.len()).min(history.len());
    for version in history.iter().rev().take(display_count) {
        print_version_line(version, head.as_deref() == Some(version.id.as_str()));
    }

    if display_count < history.len() {
        println!(
            "\n{}",
            format!("Showing {} of {} versions", display_count, history.len()).dimmed()
        );
    }

    Ok(())
}

/// Display every version as a tree
fn cmd_timeline(storage_path: PathBuf) -> Result<()> {
    let repo = Revmap::open(storage_path)?;
    if repo.list_versions().is_empty() {
        println!("{}", "No versions yet.".yellow());
        return Ok(());
    }

    println!("{}", "Timeline:".blue().bold());
    println!();
    print!("{}", repo.timeline_tree());
    Ok(())
}

/// List, create or delete branches
fn cmd_branch(storage_path: PathBuf, action: BranchAction) -> Result<()> {
    let mut repo = Revmap::open(storage_path)?;

    match action {
        BranchAction::List => {
            let active = repo.active_branch().name;
            for branch in repo.branches() {
                let marker = if branch.name == active {
                    "*".green().bold()
                } else {
                    " ".normal()
                };
                let head = match &branch.head {
                    Some(id) => short_id(id).yellow(),
                    None => "(no commits)".dimmed(),
                };
                println!("{} {} {}", marker, branch.name.cyan(), head);
            }
        }
        BranchAction::Create { name, from } => {
            let branch = repo.create_branch(&name, from.as_deref())?;
            println!(
                "{} Created branch {} at {}",
                "✓".green().bold(),
                branch.name.cyan(),
                branch.head.as_deref().map(short_id).unwrap_or("-").yellow()
            );
        }
        BranchAction::Delete { name } => {
            repo.delete_branch(&name)?;
            println!("{} Deleted branch {}", "✓".green().bold(), name.cyan());
        }
    }

    Ok(())
}

/// Switch the active branch
fn cmd_switch(storage_path: PathBuf, name: String) -> Result<()> {
    let mut repo = Revmap::open(storage_path)?;
    let branch = repo.switch_branch(&name)?;
    println!(
        "{} Switched to {} ({} fields)",
        "✓".green().bold(),
        branch.name.cyan(),
        repo.working_data().len()
    );
    Ok(())
}

/// Compare two versions
fn cmd_diff(storage_path: PathBuf, from: String, to: String, stat_only: bool) -> Result<()> {
    let repo = Revmap::open(storage_path)?;
    let diff = repo.diff(&from, &to)?;

    println!(
        "{} {} → {}",
        "Comparing".blue().bold(),
        diff.from_id.as_deref().map(short_id).unwrap_or("-").yellow(),
        diff.to_id.as_deref().map(short_id).unwrap_or("-").yellow()
    );
    println!();

    show_diff_stats(&diff);
    if !stat_only {
        show_diff(&diff);
    }

    Ok(())
}

/// Merge a branch into the active branch
///
/// Conflicts must all be resolved with `--resolve`; otherwise they are
/// listed and nothing is committed.
fn cmd_merge(
    storage_path: PathBuf,
    source: String,
    resolve: Vec<String>,
    message: Option<String>,
) -> Result<()> {
    let mut repo = Revmap::open(storage_path)?;
    let target = repo.active_branch().name;
    let result = repo.merge(&source, &target)?;

    let mut resolutions = BTreeMap::new();
    for raw in &resolve {
        let (key, choice) = raw.split_once('=').ok_or_else(|| {
            RevmapError::validation(format!("expected KEY=CHOICE, got '{}'", raw))
        })?;
        resolutions.insert(key.to_string(), choice.parse::<Resolution>()?);
    }

    let unresolved: Vec<_> = result
        .conflicts
        .iter()
        .filter(|c| !resolutions.contains_key(&c.key))
        .collect();
    if !unresolved.is_empty() {
        println!(
            "{} Merging {} into {} has {} conflict(s)",
            "✗".red().bold(),
            source.cyan(),
            target.cyan(),
            result.conflicts.len()
        );
        for conflict in &unresolved {
            println!("\n  {}", conflict.key.yellow().bold());
            println!("    base: {}", preview(conflict.base_value.as_ref()).dimmed());
            println!("    a ({}): {}", source, preview(conflict.value_a.as_ref()).green());
            println!("    b ({}): {}", target, preview(conflict.value_b.as_ref()).red());
        }
        println!(
            "\nResolve with {}",
            "--resolve KEY=a|b|base|remove|json:VALUE".yellow()
        );
    }

    let merged_data =
        revmap::merge::apply_resolutions(&result.merged_data, &result.conflicts, &resolutions)?;
    let source_version_id = result
        .context
        .as_ref()
        .map(|c| c.source_version_id.clone())
        .ok_or_else(|| RevmapError::internal("merge result is missing its context"))?;
    let message =
        message.unwrap_or_else(|| format!("Merge branch '{}' into '{}'", source, target));

    let version = repo.complete_merge(merged_data, &source, &source_version_id, &message)?;

    println!(
        "{} Merged {} into {} as {}",
        "✓".green().bold(),
        source.cyan(),
        target.cyan(),
        version.short_id().yellow().bold()
    );
    if !result.conflicts.is_empty() {
        println!("  Resolved: {} conflict(s)", result.conflicts.len());
    }

    Ok(())
}

/// Soft or hard rollback
fn cmd_rollback(storage_path: PathBuf, mode: RollbackMode) -> Result<()> {
    let mut repo = Revmap::open(storage_path)?;

    match mode {
        RollbackMode::Soft { target, name } => {
            let branch = repo.soft_rollback(&target, &name)?;
            println!(
                "{} Created branch {} at {} and switched to it",
                "✓".green().bold(),
                branch.name.cyan(),
                branch.head.as_deref().map(short_id).unwrap_or("-").yellow()
            );
        }
        RollbackMode::Hard { target, yes } => {
            if !yes {
                return Err(RevmapError::validation(
                    "hard rollback deletes history permanently; pass --yes to confirm",
                ));
            }

            let result = repo.hard_rollback(&target)?;
            println!(
                "{} Rolled {} back to {}",
                "✓".green().bold(),
                result.branch.cyan(),
                short_id(&result.target_id).yellow()
            );
            println!(
                "  Versions deleted: {}",
                result.deleted_ids.len().to_string().red()
            );
            for (name, head) in &result.repointed_branches {
                println!(
                    "  {} branch {} moved to {}",
                    "⚠".yellow().bold(),
                    name.cyan(),
                    head.as_deref().map(short_id).unwrap_or("(no commits)")
                );
            }
        }
    }

    Ok(())
}

/// Verify repository integrity
///
/// Reads the raw collections, so it also reports on storage that would
/// refuse to open.
fn cmd_verify(storage_path: PathBuf) -> Result<()> {
    let backend = FileBackend::open(storage_path)?;
    let report = verify_backend(&backend)?;

    println!("{}", "Verification Report:".bold());
    println!("  Total versions: {}", report.total_versions);
    println!("  Valid versions: {}", report.valid_versions.to_string().green());
    println!("  Branches: {}", report.total_branches);
    println!("  Verification time: {}ms", report.verification_time_ms);

    if report.is_valid() {
        println!("\n{} {}", "✓".green().bold(), report.summary());
        return Ok(());
    }

    println!("\n{}", "Issues:".red().bold());
    for issue in &report.issues {
        println!("  - {}", issue.to_string().red());
    }
    Err(RevmapError::integrity(report.summary()))
}

/// Show current status
fn cmd_status(storage_path: PathBuf) -> Result<()> {
    let repo = Revmap::open(storage_path.clone())?;
    let status = repo.status();

    println!("{}", "revmap status:".blue().bold());
    println!();
    println!("  Branch: {}", status.branch.cyan());
    match repo.head_version() {
        Some(head) => {
            println!(
                "  Head: {} {} ({})",
                head.short_id().yellow(),
                head.message,
                age(head.timestamp).dimmed()
            );
            println!("  Fields: {}", head.data.len());
        }
        None => println!("  Head: {}", "no commits yet".dimmed()),
    }

    let stats = repo.stats();
    println!("\n{}", "Repository:".bold());
    println!("  Location: {}", storage_path.display());
    println!("  Versions: {}", status.version_count);
    println!("  Branches: {}", status.branch_count);
    println!("  Merges: {}", stats.merge_versions);
    println!("  Longest chain: {}", stats.max_depth);

    Ok(())
}

/// Print a one-line summary of a version
fn print_version_line(version: &Version, is_head: bool) {
    let marker = if is_head { "*".green().bold() } else { " ".normal() };
    print!("{} {} ", marker, version.short_id().yellow().bold());
    print!("{} ", age(version.timestamp).dimmed());
    print!("{}", version.message.cyan());
    print!(" {}", format!("<{}>", version.author).dimmed());
    if version.is_merge() {
        print!(" {}", "[merge]".magenta());
    }
    println!();
}

/// Show diff statistics
fn show_diff_stats(diff: &DiffResult) {
    let stats = diff.stats();
    println!("{}", "Summary:".bold());
    println!("  Added: {} fields", stats.keys_added.to_string().green());
    println!("  Modified: {} fields", stats.keys_modified.to_string().yellow());
    println!("  Removed: {} fields", stats.keys_removed.to_string().red());
    println!("  Unchanged: {} fields", stats.keys_unchanged.to_string().dimmed());
}

/// Show field-level changes
fn show_diff(diff: &DiffResult) {
    if !diff.has_changes() {
        println!("\n{}", "No differences.".dimmed());
        return;
    }

    println!();
    for (key, value) in &diff.added {
        println!("{} {} = {}", "+".green(), key.green(), preview(Some(value)).green());
    }
    for (key, change) in &diff.modified {
        println!(
            "{} {}: {} → {}",
            "~".yellow(),
            key.yellow(),
            preview(Some(&change.before)).red(),
            preview(Some(&change.after)).green()
        );
    }
    for (key, value) in &diff.removed {
        println!("{} {} = {}", "-".red(), key.red(), preview(Some(value)).red());
    }
}

fn preview(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(value) => preview_value(value, PREVIEW_WIDTH),
        None => "(absent)".to_string(),
    }
}

/// Relative age such as "3m 12s ago"
fn age(timestamp: DateTime<Utc>) -> String {
    let elapsed = (Utc::now() - timestamp).to_std().unwrap_or_default();
    format!("{} ago", format_duration(Duration::from_secs(elapsed.as_secs())))
}
