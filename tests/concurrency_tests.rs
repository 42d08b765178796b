//! Two connections on one file racing the get-or-create lookup.

mod common;

use common::*;
use repertoire::table_handler::SelectQuery;
use rusqlite::types::Value;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_get_or_create_race_creates_one_row() {
    let catalog = TestCatalog::empty();
    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let db = catalog.reopen();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..20)
                    .map(|i| {
                        db.table_handler()
                            .get_foreign_key_value(
                                "genres",
                                "genre_id",
                                "genre_name",
                                format!("genre-{}", i % 5),
                            )
                            .unwrap()
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let results: Vec<Vec<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }

    let genres = catalog
        .db
        .table_handler()
        .fetch_table(&SelectQuery::new("genres"))
        .unwrap();
    assert_eq!(genres.len(), 5);
}

#[test]
fn test_clones_share_one_connection() {
    let catalog = TestCatalog::empty();
    let clone = catalog.db.clone();
    let handle = thread::spawn(move || {
        clone
            .table_handler()
            .get_foreign_key_value("composers", "composer_id", "composer_name", BACH.to_string())
            .unwrap()
    });
    let id = handle.join().unwrap();

    let composers = catalog
        .db
        .table_handler()
        .fetch_table(&SelectQuery::new("composers"))
        .unwrap();
    assert_eq!(composers, vec![vec![Value::Integer(id), Value::Text(BACH.to_string())]]);
}
