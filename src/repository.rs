use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use crate::object::is_valid_object_id;
use crate::storage::LooseObjectStore;

const GIT_DIR: &str = ".git";

/// A working directory with its `.git` metadata directory
pub struct Repository {
    work_tree: PathBuf,
    git_dir: PathBuf,
    store: LooseObjectStore,
}

impl Repository {
    /// Create the `.git` skeleton (objects, refs, HEAD) inside `work_tree`.
    ///
    /// An existing HEAD is left untouched, so re-running is harmless.
    pub fn init<P: AsRef<Path>>(work_tree: P, default_branch: &str) -> Result<Self> {
        let work_tree = work_tree.as_ref().to_path_buf();
        let git_dir = work_tree.join(GIT_DIR);

        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs"))?;

        let head = git_dir.join("HEAD");
        if !head.exists() {
            fs::write(&head, format!("ref: refs/heads/{}\n", default_branch))?;
        }

        tracing::debug!("initialized repository at {}", git_dir.display());
        Ok(Self::at(work_tree, git_dir))
    }

    /// Open the repository whose `.git` lives directly in `work_tree`
    pub fn open<P: AsRef<Path>>(work_tree: P) -> Result<Self> {
        let work_tree = work_tree.as_ref().to_path_buf();
        let git_dir = work_tree.join(GIT_DIR);
        if !git_dir.join("objects").is_dir() {
            return Err(Error::Io(io::Error::new(
                ErrorKind::NotFound,
                format!("not a repository (no {} found)", git_dir.join("objects").display()),
            )));
        }
        Ok(Self::at(work_tree, git_dir))
    }

    fn at(work_tree: PathBuf, git_dir: PathBuf) -> Self {
        let store = LooseObjectStore::new(git_dir.join("objects"));
        Self {
            work_tree,
            git_dir,
            store,
        }
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn store(&self) -> &LooseObjectStore {
        &self.store
    }

    /// Point `refs/heads/<branch>` at a commit
    pub fn update_branch(&self, branch: &str, id: &str) -> Result<()> {
        if !is_valid_object_id(id) {
            return Err(Error::MalformedObject(format!("invalid object id: {:?}", id)));
        }
        let ref_path = self.git_dir.join("refs").join("heads").join(branch);
        if let Some(parent) = ref_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&ref_path, format!("{}\n", id.to_ascii_lowercase()))?;
        tracing::debug!("refs/heads/{} -> {}", branch, id);
        Ok(())
    }
}
