//! Git object model
//!
//! Objects are stored and hashed in their canonical loose form,
//! `"<kind> <size>\0<content>"`. Trees and commits are thin structured
//! views over that content.

mod codec;
mod commit;
mod hash;
mod tree;

pub use codec::{kind_name, GitObject};
pub use commit::{Commit, Signature};
pub use hash::{digest, hex_to_raw, is_valid_object_id, raw_to_hex, ObjectId, RAW_HASH_LEN};
pub use tree::{Tree, TreeEntry, MODE_EXECUTABLE, MODE_FILE, MODE_GITLINK, MODE_SYMLINK, MODE_TREE};

pub use gix_object::Kind;
