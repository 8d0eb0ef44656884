//! Helpers shared by unit tests: fast chains, funded keys and signed raw
//! transactions.

pub mod test_utils;

pub use test_utils::*;
