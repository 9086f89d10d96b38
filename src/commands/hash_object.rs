use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::object::{GitObject, Kind};
use crate::repository::Repository;
use crate::storage::ObjectStore;

/// Handle the hash-object command.
///
/// Print the blob id of `file`, storing the blob when `write` is set
pub fn handle<W: Write>(work_tree: &Path, file: &Path, write: bool, output: &mut W) -> Result<()> {
    let content = std::fs::read(file).with_context(|| format!("Could not open file {}", file.display()))?;

    let id = if write {
        let repo = Repository::open(work_tree)?;
        repo.store()
            .put(Kind::Blob, &content)
            .with_context(|| format!("Failed to store blob for {}", file.display()))?
    } else {
        GitObject::from_raw(Kind::Blob, content).id
    };

    writeln!(output, "{}", id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_ID: &str = "ce013625030ba8dba906f756967f9e9ca394464a";

    #[test]
    fn test_hash_without_write_needs_no_repository() -> Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("hello.txt");
        std::fs::write(&file, "hello\n")?;

        let mut output = Vec::new();
        handle(temp.path(), &file, false, &mut output)?;

        assert_eq!(String::from_utf8(output)?, format!("{}\n", HELLO_ID));
        assert!(!temp.path().join(".git").exists());
        Ok(())
    }

    #[test]
    fn test_hash_with_write_stores_blob() -> Result<()> {
        let temp = TempDir::new()?;
        let repo = Repository::init(temp.path(), "main")?;
        let file = temp.path().join("hello.txt");
        std::fs::write(&file, "hello\n")?;

        let mut output = Vec::new();
        handle(temp.path(), &file, true, &mut output)?;

        assert_eq!(String::from_utf8(output)?, format!("{}\n", HELLO_ID));
        assert_eq!(repo.store().get(HELLO_ID)?.data, b"hello\n");
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let mut output = Vec::new();
        let result = handle(temp.path(), &temp.path().join("absent"), false, &mut output);
        assert!(result.is_err());
        assert!(output.is_empty());
    }
}
