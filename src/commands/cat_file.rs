use anyhow::Result;
use std::io::Write;
use std::path::Path;

use super::ls_tree::write_entries;
use crate::object::{kind_name, Kind, Tree};
use crate::repository::Repository;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// `-p`
    Pretty,
    /// `-t`
    Type,
    /// `-s`
    Size,
}

/// Handle the cat-file command
pub fn handle<W: Write>(work_tree: &Path, id: &str, mode: CatFileMode, output: &mut W) -> Result<()> {
    let repo = Repository::open(work_tree)?;
    let object = repo.store().get(id)?;

    match mode {
        CatFileMode::Type => writeln!(output, "{}", kind_name(object.kind))?,
        CatFileMode::Size => writeln!(output, "{}", object.size())?,
        // Tree content is binary, so show it the way ls-tree does
        CatFileMode::Pretty if object.kind == Kind::Tree => {
            write_entries(&Tree::decode(&object.data)?, false, output)?
        }
        CatFileMode::Pretty => output.write_all(&object.data)?,
    }
    Ok(())
}
