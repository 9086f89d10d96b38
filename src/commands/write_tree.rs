use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::repository::Repository;
use crate::worktree;

/// Handle the write-tree command.
///
/// Snapshot the whole working directory and print the root tree id
pub fn handle<W: Write>(work_tree: &Path, output: &mut W) -> Result<()> {
    let repo = Repository::open(work_tree)?;
    let id = worktree::write_tree(repo.store(), repo.work_tree())
        .with_context(|| format!("Failed to write tree for {}", work_tree.display()))?;
    writeln!(output, "{}", id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Kind;
    use crate::storage::ObjectStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_tree_prints_stored_root() -> Result<()> {
        let temp = TempDir::new()?;
        let repo = Repository::init(temp.path(), "main")?;
        fs::write(temp.path().join("f.txt"), "x")?;
        fs::create_dir(temp.path().join("sub"))?;
        fs::write(temp.path().join("sub/g.txt"), "y")?;

        let mut output = Vec::new();
        handle(temp.path(), &mut output)?;

        let printed = String::from_utf8(output)?;
        assert_eq!(printed, "5ea9925412eeee55b371518b0d02583b6adfb2ea\n");
        assert_eq!(repo.store().get(printed.trim())?.kind, Kind::Tree);
        Ok(())
    }
}
