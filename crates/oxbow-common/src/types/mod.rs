//! Core types for OxbowDB.

mod access;
mod ids;

pub use access::AccessType;
pub use ids::PageId;
