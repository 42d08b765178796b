//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestCatalog, BACH};
//!
//! #[test]
//! fn test_entries() {
//!     let catalog = TestCatalog::seeded();
//!     assert!(!catalog.db.get_entries(None).unwrap().is_empty());
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::TestCatalog;
