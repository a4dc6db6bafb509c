#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Cross-platform filesystem primitives the install orchestrator builds on:
//! directory moves for backup/restore, and unique temp-directory naming.
//!
//! The teacher's platform layer leans on macOS APFS clonefile/atomic-swap
//! syscalls; none of that is grounded in anything §4.F asks for, so this
//! crate is a plain `tokio::fs` implementation in the same spirit as the
//! teacher's `store` crate's own `tokio::fs::rename` fallback path.

mod tempdir;
mod tree;

pub use tempdir::unique_temp_dir;
pub use tree::{
    count_files, empty_dir, move_entry, move_listed_files, move_tree_contents,
    move_tree_with_progress, remove_tree,
};
