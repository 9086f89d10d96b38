use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::GitcoreConfig;
use crate::repository::Repository;

/// Handle the init command
pub fn handle<W: Write>(work_tree: &Path, config: &GitcoreConfig, output: &mut W) -> Result<()> {
    Repository::init(work_tree, &config.default_branch)
        .with_context(|| format!("Failed to create git directories in {}", work_tree.display()))?;
    writeln!(output, "Initialized git directory")?;
    Ok(())
}
