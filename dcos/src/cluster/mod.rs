//! Cluster listing and the links API.

mod linker;
mod lister;

pub use linker::{Link, LinkProvider, Linker};
pub use lister::{Filters, Item, Lister, PROBE_TIMEOUT, Status};
