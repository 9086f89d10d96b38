use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::GitcoreConfig;
use crate::object::{kind_name, Commit, Kind};
use crate::pack::PackReader;
use crate::remote::{extract_head_commit_hash, RemoteClient};
use crate::repository::Repository;
use crate::storage::ObjectStore;
use crate::worktree::{self, CheckoutStats};

/// The destination may exist only as an empty directory
fn prepare_directory(directory: &Path) -> Result<()> {
    if directory.exists() {
        if !directory.is_dir() {
            bail!("{} exists and is not a directory", directory.display());
        }
        if fs::read_dir(directory)?.next().is_some() {
            bail!("destination {} already exists and is not empty", directory.display());
        }
        return Ok(());
    }
    fs::create_dir_all(directory).with_context(|| format!("Failed to create {}", directory.display()))
}

/// Store every object in an upload-pack `response`, point `branch` at
/// `head`, and check out the head commit's tree.
pub(crate) fn materialize(repo: &Repository, head: &str, response: &[u8], branch: &str) -> Result<CheckoutStats> {
    let store = repo.store();
    let summary = PackReader::new(store)
        .unpack_response(response)
        .context("Failed to unpack fetched objects")?;
    tracing::info!(
        "stored {} of {} objects (pack version {})",
        summary.objects.len(),
        summary.object_count,
        summary.version
    );

    let object = store
        .get(head)
        .with_context(|| format!("Head commit {} is missing after unpacking", head))?;
    if object.kind != Kind::Commit {
        bail!("{} is a {}, not a commit", head, kind_name(object.kind));
    }
    let commit = Commit::parse(&object.data)?;
    repo.update_branch(branch, head)?;

    let stats = worktree::checkout(store, &commit.tree, repo.work_tree())?;
    tracing::info!(
        "checked out {} files in {} directories ({} entries skipped)",
        stats.files,
        stats.directories,
        stats.skipped
    );
    Ok(stats)
}

/// Handle the clone command
pub fn handle<W: Write>(url: &str, directory: &Path, config: &GitcoreConfig, output: &mut W) -> Result<()> {
    prepare_directory(directory)?;
    let repo = Repository::init(directory, &config.default_branch)?;

    let client = RemoteClient::new(url, config)?;
    let advertisement = client
        .fetch_refs()
        .with_context(|| format!("Failed to fetch refs from {}", client.base_url()))?;
    let head = extract_head_commit_hash(&advertisement)?;
    tracing::info!("cloning {} into {}", head, repo.git_dir().display());

    let response = client.fetch_pack(&head).context("Failed to fetch pack")?;
    let stats = materialize(&repo, &head, &response, &config.default_branch)?;

    writeln!(
        output,
        "Cloned {} into {} ({} files)",
        client.base_url(),
        directory.display(),
        stats.files
    )?;
    Ok(())
}
