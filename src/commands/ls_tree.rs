use anyhow::{bail, Result};
use std::io::Write;
use std::path::Path;

use crate::object::{kind_name, Kind, Tree};
use crate::repository::Repository;
use crate::storage::ObjectStore;

/// Print tree entries as `<mode> <kind> <id>\t<name>`, modes zero-padded to 6
pub(crate) fn write_entries<W: Write>(tree: &Tree, name_only: bool, output: &mut W) -> Result<()> {
    for entry in tree.entries() {
        if !name_only {
            write!(output, "{:0>6} {} {}\t", entry.mode, kind_name(entry.kind()), entry.id)?;
        }
        // Names are raw bytes and are printed unchanged
        output.write_all(&entry.name)?;
        writeln!(output)?;
    }
    Ok(())
}

/// Handle the ls-tree command
pub fn handle<W: Write>(work_tree: &Path, tree_id: &str, name_only: bool, output: &mut W) -> Result<()> {
    let repo = Repository::open(work_tree)?;
    let object = repo.store().get(tree_id)?;
    if object.kind != Kind::Tree {
        bail!("{} is a {}, not a tree", tree_id, kind_name(object.kind));
    }
    let tree = Tree::decode(&object.data)?;
    write_entries(&tree, name_only, output)
}
