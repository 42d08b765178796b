mod collection;
mod models;
pub mod schema;
mod track_handler;

pub use collection::{CollectionHandler, Facet};
pub use models::{Dimension, EntryFilter, NewTrack, TrackEntry, Year};
pub use track_handler::TrackDbHandler;
