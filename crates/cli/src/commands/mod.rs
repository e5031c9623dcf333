//! Command implementations.

pub mod history;
pub mod normalize;
pub mod search;
