//! Filesystem and digest helpers shared by the `dcos` crates.

pub mod archive;
pub mod checksum;
pub mod error;
