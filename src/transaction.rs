//! Transactions: the wire type and its validation rules

pub mod types;
pub mod validation;

pub use types::*;
