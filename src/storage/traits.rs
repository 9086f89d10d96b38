use crate::error::Result;
use crate::object::{GitObject, Kind, ObjectId};

/// Append-only, content-addressed object storage.
///
/// There is no update or delete: an id permanently names its bytes.
pub trait ObjectStore {
    /// Store an object given in canonical form and return its id.
    /// Storing an object that already exists succeeds without rewriting it.
    fn put_object(&self, object: &GitObject) -> Result<ObjectId>;

    /// Read object by id.
    /// Returns `ObjectNotFound` if nothing is stored under the id.
    fn get(&self, id: &str) -> Result<GitObject>;

    /// Check if object exists by id.
    fn contains(&self, id: &str) -> Result<bool>;

    /// Wrap `content` with its header, hash it and store it.
    fn put(&self, kind: Kind, content: &[u8]) -> Result<ObjectId> {
        self.put_object(&GitObject::from_raw(kind, content.to_vec()))
    }
}
