use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::compression::{Compressor, ZlibCompressor};
use super::traits::ObjectStore;
use crate::error::{Error, Result};
use crate::object::{is_valid_object_id, GitObject, ObjectId};

/// Loose object storage under `.git/objects/<2 hex>/<38 hex>`
pub struct LooseObjectStore<C = ZlibCompressor> {
    objects_dir: PathBuf,
    compressor: C,
}

impl LooseObjectStore {
    /// Create a store rooted at `objects_dir` using zlib at the default level
    pub fn new<P: AsRef<Path>>(objects_dir: P) -> Self {
        Self::with_compressor(objects_dir, ZlibCompressor::default())
    }
}

impl<C: Compressor> LooseObjectStore<C> {
    pub fn with_compressor<P: AsRef<Path>>(objects_dir: P, compressor: C) -> Self {
        LooseObjectStore {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compressor,
        }
    }

    /// Path an object with this id is (or would be) stored at
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_object_id(id) {
            return Err(Error::MalformedObject(format!("invalid object id: {:?}", id)));
        }
        let id = id.to_ascii_lowercase();
        let (dir, file) = id.split_at(2);
        Ok(self.objects_dir.join(dir).join(file))
    }
}

/// Loose objects are immutable; git writes them as 0444
#[cfg(unix)]
fn set_read_only(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(0o444))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_read_only(file: &fs::File) -> Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(true);
    file.set_permissions(permissions)?;
    Ok(())
}

impl<C: Compressor> ObjectStore for LooseObjectStore<C> {
    fn put_object(&self, object: &GitObject) -> Result<ObjectId> {
        let path = self.path_for(&object.id)?;
        if path.exists() {
            tracing::debug!("object {} already stored", object.id);
            return Ok(object.id.clone());
        }

        // create_dir_all treats an existing fan-out directory as success
        let obj_dir = path.parent().unwrap_or(&self.objects_dir);
        fs::create_dir_all(obj_dir)?;

        let compressed = self.compressor.compress(&object.to_loose_format())?;

        // Write beside the target and rename so readers never see a partial file
        let mut temp = NamedTempFile::new_in(obj_dir)?;
        temp.write_all(&compressed)?;
        set_read_only(temp.as_file())?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            "stored {} {} ({} bytes, {} compressed)",
            crate::object::kind_name(object.kind),
            object.id,
            object.size(),
            compressed.len()
        );
        Ok(object.id.clone())
    }

    fn get(&self, id: &str) -> Result<GitObject> {
        let path = self.path_for(id)?;
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound(id.to_string()))
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let content = self
            .compressor
            .decompress(&compressed)
            .map_err(|e| Error::CorruptObject(format!("{}: failed to inflate: {}", id, e)))?;

        let object = GitObject::from_loose_format(&content)
            .map_err(|e| Error::CorruptObject(format!("{}: {}", id, e)))?;

        if !object.id.eq_ignore_ascii_case(id) {
            return Err(Error::CorruptObject(format!(
                "{}: content hashes to {}",
                id, object.id
            )));
        }
        Ok(object)
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.path_for(id)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Kind;
    use tempfile::TempDir;

    fn count_object_files(objects_dir: &Path) -> usize {
        fs::read_dir(objects_dir)
            .unwrap()
            .map(|dir| fs::read_dir(dir.unwrap().path()).unwrap().count())
            .sum()
    }

    #[test]
    fn test_put_and_get_object() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());

        let id = store.put(Kind::Blob, b"hello\n")?;
        assert_eq!(id, "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(temp_dir
            .path()
            .join("ce")
            .join("013625030ba8dba906f756967f9e9ca394464a")
            .is_file());

        let object = store.get(&id)?;
        assert_eq!(object.kind, Kind::Blob);
        assert_eq!(object.size(), 6);
        assert_eq!(object.data, b"hello\n");
        Ok(())
    }

    #[test]
    fn test_roundtrip_binary_content() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());

        let content: Vec<u8> = (0..=255u8).chain([0, 0, 0]).collect();
        let id = store.put(Kind::Blob, &content)?;
        let object = store.get(&id)?;
        assert_eq!(object.data, content);

        let empty = store.put(Kind::Blob, b"")?;
        assert_eq!(empty, "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert!(store.get(&empty)?.data.is_empty());
        Ok(())
    }

    #[test]
    fn test_stored_file_is_compressed_loose_format() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());
        let id = store.put(Kind::Blob, b"test\n")?;

        let raw = fs::read(store.path_for(&id)?)?;
        let inflated = ZlibCompressor::default().decompress(&raw)?;
        assert_eq!(inflated, b"blob 5\0test\n");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_object_files_are_read_only() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());
        let id = store.put(Kind::Blob, b"test\n")?;

        let mode = fs::metadata(store.path_for(&id)?)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
        // a second put of the same object leaves the file alone
        store.put(Kind::Blob, b"test\n")?;
        Ok(())
    }

    #[test]
    fn test_object_deduplication() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());

        let id1 = store.put(Kind::Blob, b"Test content")?;
        let id2 = store.put(Kind::Blob, b"Test content")?;

        assert_eq!(id1, id2);
        assert_eq!(count_object_files(temp_dir.path()), 1);
        Ok(())
    }

    #[test]
    fn test_missing_object() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());
        let id = "9daeafb9864cf43055ae93beb0afd6c7d144bfa4";

        assert!(!store.contains(id)?);
        assert!(matches!(store.get(id), Err(Error::ObjectNotFound(_))));
        assert!(matches!(store.get("not-a-hash"), Err(Error::MalformedObject(_))));
        Ok(())
    }

    #[test]
    fn test_corrupt_object() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = LooseObjectStore::new(temp_dir.path());
        let id = "9daeafb9864cf43055ae93beb0afd6c7d144bfa4";

        let path = store.path_for(id)?;
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, b"this is not zlib data at all")?;
        assert!(matches!(store.get(id), Err(Error::CorruptObject(_))));

        // Valid zlib, but no header separator
        fs::write(&path, ZlibCompressor::default().compress(b"blob 5 test")?)?;
        assert!(matches!(store.get(id), Err(Error::CorruptObject(_))));

        // Valid object stored under the wrong id
        fs::write(&path, ZlibCompressor::default().compress(b"blob 5\0best\n")?)?;
        assert!(matches!(store.get(id), Err(Error::CorruptObject(_))));
        Ok(())
    }
}
