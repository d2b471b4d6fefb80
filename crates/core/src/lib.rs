//! Domain logic for the process portal. Nothing in this crate performs I/O.

pub mod access;
pub mod error;
pub mod form_lifecycle;
pub mod lifecycle;
pub mod permissions;
pub mod process_tree;
pub mod roles;
pub mod rules;
pub mod status;
pub mod summary;
pub mod types;
