//! End-to-end tests of the catalog database on a real file.

mod common;

use common::*;
use repertoire::catalog::{Dimension, EntryFilter, NewTrack};
use repertoire::sqlite_column;
use repertoire::sqlite_persistence::SqlType;
use repertoire::table_handler::{Condition, ConditionOperator, Record, SelectQuery};
use repertoire::view::{SortOrder, TableModel};
use repertoire::CatalogError;
use rusqlite::types::Value;

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn test_fresh_file_validates_and_is_versioned() {
    let catalog = TestCatalog::empty();
    catalog.db.validate_schema().unwrap();

    let conn = rusqlite::Connection::open(&catalog.db_path).unwrap();
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, 99999);
}

#[test]
fn test_table_descriptions_match_declared_order() {
    let catalog = TestCatalog::empty();
    let tables = catalog.db.table_handler();
    assert_eq!(
        tables.fetch_table_description("tracks").unwrap(),
        vec![
            "track_id",
            "track_name",
            "year",
            "interpreter_id",
            "composer_id",
            "genre_id",
            "media_location",
            "sheet_location",
            "thumbnail_location",
        ]
    );
    assert_eq!(
        tables.fetch_table_description("collections_tracks").unwrap(),
        vec!["track_id", "collection_id"]
    );
}

#[test]
fn test_data_survives_reopen() {
    let catalog = TestCatalog::seeded();
    let reopened = catalog.reopen();
    let entries = reopened.get_entries(None).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].sheet_location.as_deref(), Some("sheets/prelude.pdf"));
    assert_eq!(entries[3].interpreter, None);
}

#[test]
fn test_entries_filtered_by_dimension() {
    let catalog = TestCatalog::seeded();

    let filter = EntryFilter::new("composers", "composer_name", text(CHOPIN));
    let names: Vec<String> = catalog
        .db
        .get_entries(Some(&filter))
        .unwrap()
        .into_iter()
        .filter_map(|e| e.track_name)
        .collect();
    assert_eq!(names, vec!["Nocturne Op. 9 No. 2", "Ballade No. 1"]);

    let filter = EntryFilter::new("tracks", "year", 1722);
    assert_eq!(catalog.db.get_entries(Some(&filter)).unwrap().len(), 2);
}

#[test]
fn test_dimension_rows_are_shared() {
    let catalog = TestCatalog::seeded();
    let composers = catalog
        .db
        .table_handler()
        .fetch_table(&SelectQuery::new("composers"))
        .unwrap();
    assert_eq!(
        composers,
        vec![
            vec![Value::Integer(1), text(BACH)],
            vec![Value::Integer(2), text(CHOPIN)],
        ]
    );
    assert_eq!(
        catalog.db.find_dimension_id(Dimension::Interpreter, ARGERICH).unwrap(),
        Some(2)
    );
}

#[test]
fn test_input_entries_twice_inserts_once() {
    let catalog = TestCatalog::seeded();
    let again = catalog
        .db
        .input_entries(&[NewTrack::new("Fugue in C")
            .year(1722)
            .composer(BACH)
            .interpreter(GOULD)
            .genre(BAROQUE)])
        .unwrap();
    assert_eq!(again, 0);
    assert_eq!(catalog.db.get_entries(None).unwrap().len(), 4);
}

#[test]
fn test_update_with_and_leaves_other_rows() {
    let catalog = TestCatalog::empty();
    let tables = catalog.db.table_handler();
    tables
        .insert_into_table(
            "tracks",
            &[
                Record::new()
                    .with("track_id", 1)
                    .with("track_name", text("A"))
                    .with("year", 1900),
                Record::new()
                    .with("track_id", 2)
                    .with("track_name", text("B"))
                    .with("year", 1950),
            ],
        )
        .unwrap();

    tables
        .update_table(
            "tracks",
            &Record::new().with("year", 1901),
            &[Condition::eq("track_id", 1)],
            ConditionOperator::And,
        )
        .unwrap();

    let years = tables
        .fetch_table(&SelectQuery::new("tracks").columns(["track_id", "year"]))
        .unwrap();
    assert_eq!(
        years,
        vec![
            vec![Value::Integer(1), Value::Integer(1901)],
            vec![Value::Integer(2), Value::Integer(1950)],
        ]
    );
}

#[test]
fn test_update_without_conditions_touches_every_row() {
    let catalog = TestCatalog::seeded();
    let changed = catalog
        .db
        .table_handler()
        .update_table(
            "tracks",
            &Record::new().with("thumbnail_location", text("thumb.png")),
            &[],
            ConditionOperator::And,
        )
        .unwrap();
    assert_eq!(changed, 4);
}

#[test]
fn test_deleting_a_composer_keeps_tracks() {
    let catalog = TestCatalog::seeded();
    let tables = catalog.db.table_handler();
    tables.delete_from_table("composers", "composer_name", text(BACH)).unwrap();

    let entries = catalog.db.get_entries(None).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].composer, None);
    assert_eq!(entries[2].composer.as_deref(), Some(CHOPIN));
}

#[test]
fn test_alter_tracks_drops_removed_column_data() {
    let catalog = TestCatalog::seeded();
    let tables = catalog.db.table_handler();
    tables
        .alter_table(
            "tracks",
            &[
                sqlite_column!("track_id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!("track_name", &SqlType::Text),
                sqlite_column!("year", &SqlType::Integer),
                sqlite_column!("duration", &SqlType::Integer),
            ],
        )
        .unwrap();

    assert_eq!(
        tables.fetch_table_description("tracks").unwrap(),
        vec!["track_id", "track_name", "year", "duration"]
    );
    let result = tables.fetch_table(&SelectQuery::new("tracks").columns(["sheet_location"]));
    assert!(matches!(result, Err(CatalogError::InvalidColumn { .. })));
    assert!(catalog.db.validate_schema().is_err());
}

#[test]
fn test_alter_parent_keeps_collection_memberships() {
    let catalog = TestCatalog::seeded();
    let mut collection = repertoire::CollectionHandler::new("Favourites", &catalog.db).unwrap();
    collection.add_entry(PRELUDE_ID).unwrap();

    let tables = catalog.db.table_handler();
    tables
        .alter_table(
            "collections",
            &[
                sqlite_column!("collection_id", &SqlType::Integer, is_primary_key = true),
                sqlite_column!("collection_name", &SqlType::Text),
                sqlite_column!("description", &SqlType::Text),
            ],
        )
        .unwrap();

    assert_eq!(collection.track_ids().unwrap(), vec![PRELUDE_ID]);
    let conn = rusqlite::Connection::open(&catalog.db_path).unwrap();
    let violations: i64 = conn
        .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |r| r.get(0))
        .unwrap();
    assert_eq!(violations, 0);
}

#[test]
fn test_remove_duplicates_over_all_columns() {
    let catalog = TestCatalog::seeded();
    let tables = catalog.db.table_handler();
    let copy = Record::new()
        .with("track_name", text("Fugue in C"))
        .with("year", 1722)
        .with("interpreter_id", 1)
        .with("composer_id", 1)
        .with("genre_id", 1);
    tables.insert_into_table("tracks", &[copy.clone(), copy]).unwrap();
    assert_eq!(catalog.db.get_entries(None).unwrap().len(), 6);

    assert_eq!(catalog.db.remove_duplicates().unwrap(), 2);
    let ids: Vec<i64> = catalog
        .db
        .get_entries(None)
        .unwrap()
        .iter()
        .map(|e| e.track_id)
        .collect();
    assert_eq!(ids, vec![PRELUDE_ID, NOCTURNE_ID, BALLADE_ID, 6]);
}

#[test]
fn test_table_model_over_catalog() {
    let catalog = TestCatalog::seeded();
    let mut model = TableModel::from_entries(&catalog.db.get_entries(None).unwrap());
    assert_eq!(model.column_count(), 9);
    assert_eq!(model.header(3), Some("interpreter_name"));

    model.sort_by_column(3, SortOrder::Ascending);
    // Ballade has no interpreter and sorts first.
    assert_eq!(model.cell(0, 1), Some(&text("Ballade No. 1")));
    assert_eq!(model.cell(1, 3), Some(&text(ARGERICH)));

    let model = TableModel::load(catalog.db.table_handler(), &SelectQuery::new("nope"));
    assert_eq!(model.row_count(), 0);
}

#[test]
fn test_wipe_then_reinitialize() {
    let catalog = TestCatalog::seeded();
    catalog.db.wipe_db().unwrap();
    assert!(catalog.db.table_handler().fetch_table_list().unwrap().is_empty());

    catalog.db.initialize_schema().unwrap();
    assert!(catalog.db.get_entries(None).unwrap().is_empty());
    catalog.db.validate_schema().unwrap();
}
