// Thin re-export module: implementation is in `blockchain/core.rs` to keep
// the chain, its derived views and validation in separate files.

pub mod core;
pub use self::core::*;
