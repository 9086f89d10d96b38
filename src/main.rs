#![deny(clippy::mod_module_files)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod object;
mod pack;
mod remote;
mod repository;
mod storage;
mod worktree;

use commands::cat_file::CatFileMode;
use config::GitcoreConfig;

/// A minimal git: loose objects, trees, commits and clone over smart HTTP
#[derive(Parser)]
#[command(name = "gitcore", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty repository in the current directory
    Init,
    /// Compute the blob id of a file
    HashObject {
        /// Also store the blob
        #[arg(short = 'w')]
        write: bool,
        file: PathBuf,
    },
    /// Show a stored object
    CatFile {
        /// Pretty-print the content
        #[arg(short = 'p')]
        pretty: bool,
        /// Print the object kind
        #[arg(short = 't', conflicts_with_all = ["pretty", "size"])]
        kind: bool,
        /// Print the content size
        #[arg(short = 's', conflicts_with = "pretty")]
        size: bool,
        object: String,
    },
    /// Snapshot the working directory as a tree
    WriteTree,
    /// List a tree's entries
    LsTree {
        #[arg(long)]
        name_only: bool,
        tree: String,
    },
    /// Create a commit for a tree
    CommitTree {
        tree: String,
        #[arg(short = 'p')]
        parent: Option<String>,
        #[arg(short = 'm')]
        message: String,
    },
    /// Download a repository and check out its head commit
    Clone { url: String, directory: PathBuf },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("GITCORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = GitcoreConfig::load()?;
    let work_tree = std::env::current_dir().context("Cannot determine current directory")?;
    let stdout = io::stdout();
    let mut output = stdout.lock();

    match cli.command {
        Command::Init => commands::init::handle(&work_tree, &config, &mut output)?,
        Command::HashObject { write, file } => commands::hash_object::handle(&work_tree, &file, write, &mut output)?,
        Command::CatFile {
            pretty: _,
            kind,
            size,
            object,
        } => {
            let mode = if kind {
                CatFileMode::Type
            } else if size {
                CatFileMode::Size
            } else {
                CatFileMode::Pretty
            };
            commands::cat_file::handle(&work_tree, &object, mode, &mut output)?
        }
        Command::WriteTree => commands::write_tree::handle(&work_tree, &mut output)?,
        Command::LsTree { name_only, tree } => commands::ls_tree::handle(&work_tree, &tree, name_only, &mut output)?,
        Command::CommitTree { tree, parent, message } => commands::commit_tree::handle(
            &work_tree,
            &config,
            &tree,
            parent.as_deref(),
            &message,
            &mut output,
        )?,
        Command::Clone { url, directory } => {
            let directory = work_tree.join(directory);
            commands::clone::handle(&url, &directory, &config, &mut output)?
        }
    }

    output.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    // Usage errors exit with 1 like every other failure; --help and --version succeed
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
            let _ = e.print();
            return code;
        }
    };
    init_logging();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
