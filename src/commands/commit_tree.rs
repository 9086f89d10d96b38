use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::GitcoreConfig;
use crate::object::{kind_name, Commit, Kind, Signature};
use crate::repository::Repository;
use crate::storage::ObjectStore;

/// Fail unless `id` names a stored object of the given kind
fn require_kind<S: ObjectStore>(store: &S, id: &str, expected: Kind) -> Result<()> {
    let object = store.get(id).with_context(|| format!("Cannot read {} {}", kind_name(expected), id))?;
    if object.kind != expected {
        bail!("{} is a {}, expected a {}", id, kind_name(object.kind), kind_name(expected));
    }
    Ok(())
}

/// Handle the commit-tree command.
///
/// Author and committer come from the configured identity, stamped now
pub fn handle<W: Write>(
    work_tree: &Path,
    config: &GitcoreConfig,
    tree: &str,
    parent: Option<&str>,
    message: &str,
    output: &mut W,
) -> Result<()> {
    let repo = Repository::open(work_tree)?;
    let store = repo.store();

    require_kind(store, tree, Kind::Tree)?;
    if let Some(parent) = parent {
        require_kind(store, parent, Kind::Commit)?;
    }

    let signature = Signature::now(&config.author_name, &config.author_email, &config.timezone_offset);
    let commit = Commit {
        tree: tree.to_ascii_lowercase(),
        parent: parent.map(str::to_ascii_lowercase),
        author: signature.clone(),
        committer: signature,
        message: message.to_string(),
    };

    let id = store.put_object(&commit.to_object()).context("Failed to create commit object")?;
    tracing::debug!("created commit {} for tree {}", id, tree);
    writeln!(output, "{}", id)?;
    Ok(())
}
