//! Smart HTTP protocol, minimal subset: ref discovery and a single-want
//! pack request.

mod client;
mod pktline;
mod refs;

pub use client::RemoteClient;
pub use refs::extract_head_commit_hash;
