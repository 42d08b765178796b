#![allow(dead_code)]

use super::constants::*;
use repertoire::catalog::{NewTrack, TrackDbHandler};
use std::path::PathBuf;
use tempfile::TempDir;

/// A catalog database in its own temporary directory.
pub struct TestCatalog {
    pub db: TrackDbHandler,
    pub db_path: PathBuf,
    // Removes the directory on drop.
    _dir: TempDir,
}

impl TestCatalog {
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("catalog.db");
        let db = TrackDbHandler::open(&db_path, true).unwrap();
        TestCatalog {
            db,
            db_path,
            _dir: dir,
        }
    }

    /// Four tracks by two composers, see the ids in `constants`.
    pub fn seeded() -> Self {
        let catalog = Self::empty();
        catalog
            .db
            .input_entries(&seed_tracks())
            .unwrap();
        catalog
    }

    /// A second handle on the same file.
    pub fn reopen(&self) -> TrackDbHandler {
        TrackDbHandler::open(&self.db_path, true).unwrap()
    }
}

pub fn seed_tracks() -> Vec<NewTrack> {
    vec![
        NewTrack::new("Prelude in C")
            .year(1722)
            .composer(BACH)
            .interpreter(GOULD)
            .genre(BAROQUE)
            .sheet_location("sheets/prelude.pdf"),
        NewTrack::new("Fugue in C")
            .year(1722)
            .composer(BACH)
            .interpreter(GOULD)
            .genre(BAROQUE),
        NewTrack::new("Nocturne Op. 9 No. 2")
            .year(1832)
            .composer(CHOPIN)
            .interpreter(ARGERICH)
            .genre(ROMANTIC)
            .media_location("media/nocturne.flac"),
        NewTrack::new("Ballade No. 1")
            .year(1835)
            .composer(CHOPIN)
            .genre(ROMANTIC),
    ]
}
