//! Repertoire: a personal media catalog on SQLite.
//!
//! Tracks with composer, interpreter and genre lookups, grouped into named
//! collections. The library exposes the storage layers and the view models a
//! front-end binds to.

pub mod catalog;
pub mod config;
pub mod error;
pub mod sqlite_persistence;
pub mod table_handler;
pub mod view;

pub use catalog::{CollectionHandler, TrackDbHandler};
pub use error::{CatalogError, Result};
pub use table_handler::TableHandler;
