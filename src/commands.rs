//! One handler per CLI subcommand. Handlers write primary output to the
//! supplied writer and leave diagnostics to `tracing`.

pub mod cat_file;
pub mod clone;
pub mod commit_tree;
pub mod hash_object;
pub mod init;
pub mod ls_tree;
pub mod write_tree;
