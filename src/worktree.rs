//! Moving between directories on disk and tree objects
//!
//! `checkout` expands a stored tree into files and directories;
//! `write_tree` snapshots a directory into blob and tree objects.

use std::{
    ffi::{OsStr, OsString},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use crate::object::{
    Kind, ObjectId, Tree, TreeEntry, MODE_EXECUTABLE, MODE_FILE, MODE_GITLINK, MODE_SYMLINK, MODE_TREE,
};
use crate::storage::ObjectStore;

/// Counts of what a checkout wrote
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutStats {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
}

/// Materialize `tree_id` into `destination`.
///
/// Walks the tree depth-first with an explicit stack of
/// `(tree id, directory)` pairs. Existing files are truncated and
/// existing directories reused.
pub fn checkout<S: ObjectStore>(store: &S, tree_id: &str, destination: &Path) -> Result<CheckoutStats> {
    let mut stats = CheckoutStats::default();
    let mut pending: Vec<(ObjectId, PathBuf)> = vec![(tree_id.to_string(), destination.to_path_buf())];

    while let Some((id, dir)) = pending.pop() {
        let tree = read_tree(store, &id)?;

        for entry in tree.entries() {
            check_entry_name(entry)?;
            let path = dir.join(entry_file_name(entry)?);

            if entry.is_tree() {
                create_dir(&path)?;
                stats.directories += 1;
                pending.push((entry.id.clone(), path));
                continue;
            }

            match entry.mode.as_str() {
                MODE_SYMLINK | MODE_GITLINK => {
                    tracing::warn!("skipping {} (mode {})", path.display(), entry.mode);
                    stats.skipped += 1;
                }
                mode => {
                    if mode != MODE_FILE && mode != MODE_EXECUTABLE {
                        tracing::warn!("unknown mode {} for {}, writing as a regular file", mode, path.display());
                    }
                    let blob = store.get(&entry.id)?;
                    if blob.kind != Kind::Blob {
                        return Err(Error::CheckoutError(format!(
                            "{} points at a {} object, expected a blob",
                            path.display(),
                            crate::object::kind_name(blob.kind)
                        )));
                    }
                    fs::write(&path, &blob.data)?;
                    if mode == MODE_EXECUTABLE {
                        set_executable(&path)?;
                    }
                    stats.files += 1;
                }
            }
        }
    }

    tracing::debug!(
        "checked out {} files in {} directories into {}",
        stats.files,
        stats.directories,
        destination.display()
    );
    Ok(stats)
}

fn read_tree<S: ObjectStore>(store: &S, id: &str) -> Result<Tree> {
    let object = store.get(id).map_err(|e| match e {
        Error::ObjectNotFound(id) => Error::CheckoutError(format!("tree {} is not in the object store", id)),
        other => other,
    })?;
    if object.kind != Kind::Tree {
        return Err(Error::CheckoutError(format!(
            "{} is a {}, not a tree",
            id,
            crate::object::kind_name(object.kind)
        )));
    }
    Tree::decode(&object.data)
}

/// Entry names come from the network; refuse anything that escapes the directory
fn check_entry_name(entry: &TreeEntry) -> Result<()> {
    match entry.name.as_slice() {
        b"." | b".." | b".git" => {}
        name if name.contains(&b'\\') => {}
        _ => return Ok(()),
    }
    Err(Error::CheckoutError(format!(
        "refusing to check out entry named {:?}",
        entry.display_name()
    )))
}

#[cfg(unix)]
fn entry_file_name(entry: &TreeEntry) -> Result<&OsStr> {
    use std::os::unix::ffi::OsStrExt;

    Ok(OsStr::from_bytes(&entry.name))
}

#[cfg(not(unix))]
fn entry_file_name(entry: &TreeEntry) -> Result<&OsStr> {
    std::str::from_utf8(&entry.name).map(OsStr::new).map_err(|_| {
        Error::CheckoutError(format!(
            "entry name {:?} is not representable on this platform",
            entry.display_name()
        ))
    })
}

#[cfg(unix)]
fn file_name_bytes(name: OsString) -> Option<Vec<u8>> {
    use std::os::unix::ffi::OsStringExt;

    Some(name.into_vec())
}

#[cfg(not(unix))]
fn file_name_bytes(name: OsString) -> Option<Vec<u8>> {
    name.into_string().ok().map(String::into_bytes)
}

fn create_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Store every file under `dir` as a blob and every directory as a tree,
/// returning the id of the root tree.
///
/// `.git` is skipped, as are symlinks, special files and directories
/// that end up with no entries.
pub fn write_tree<S: ObjectStore>(store: &S, dir: &Path) -> Result<ObjectId> {
    let (id, _) = write_tree_recursive(store, dir)?;
    Ok(id)
}

fn write_tree_recursive<S: ObjectStore>(store: &S, dir: &Path) -> Result<(ObjectId, usize)> {
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let name = match file_name_bytes(dir_entry.file_name()) {
            Some(name) => name,
            None => {
                tracing::warn!("skipping unrepresentable path {}", path.display());
                continue;
            }
        };
        if name == b".git" {
            continue;
        }

        let metadata = fs::symlink_metadata(&path)?;
        if metadata.is_dir() {
            let (id, count) = write_tree_recursive(store, &path)?;
            if count == 0 {
                tracing::debug!("skipping empty directory {}", path.display());
                continue;
            }
            entries.push(TreeEntry::new(MODE_TREE, name, id)?);
        } else if metadata.is_file() {
            let content = fs::read(&path)?;
            let id = store.put(Kind::Blob, &content)?;
            let mode = if is_executable(&metadata) { MODE_EXECUTABLE } else { MODE_FILE };
            entries.push(TreeEntry::new(mode, name, id)?);
        } else {
            tracing::debug!("skipping {} (not a regular file)", path.display());
        }
    }

    let tree = Tree::new(entries)?;
    let count = tree.entries().len();
    let id = store.put_object(&tree.to_object()?)?;
    Ok((id, count))
}
