use crate::catalog::TrackEntry;
use crate::table_handler::{ResultSet, SelectQuery, TableSource};
use rusqlite::types::Value;
use std::cmp::Ordering;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Tabular data source for a grid view: a header row plus the rows of the
/// last loaded query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableModel {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TableModel {
    /// Loads `query` from `source`. A failing query leaves the model empty.
    pub fn load<S: TableSource>(source: &S, query: &SelectQuery) -> Self {
        match source.select(query) {
            Ok(result) => Self::from_result_set(result),
            Err(err) if err.is_schema_fault() => {
                warn!("Could not load table {}: {}", query.table, err);
                Self::default()
            }
            Err(err) => {
                error!("Query on {} failed: {}", query.table, err);
                Self::default()
            }
        }
    }

    pub fn from_result_set(result: ResultSet) -> Self {
        TableModel {
            headers: result.columns,
            rows: result.rows,
        }
    }

    pub fn from_entries(entries: &[TrackEntry]) -> Self {
        TableModel {
            headers: TrackEntry::HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: entries.iter().map(TrackEntry::to_row).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row)?.get(column)
    }

    pub fn header(&self, column: usize) -> Option<&str> {
        self.headers.get(column).map(String::as_str)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Stable sort of the loaded rows. NULL sorts like an empty string.
    /// Out-of-range columns are ignored.
    pub fn sort_by_column(&mut self, column: usize, order: SortOrder) {
        if column >= self.column_count() {
            return;
        }
        self.rows.sort_by(|a, b| {
            let ordering = compare_cells(a.get(column), b.get(column));
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }
}

/// Numbers before text before blobs, the way SQLite orders mixed columns.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let empty = Value::Text(String::new());
    let a = normalize(a.unwrap_or(&empty), &empty);
    let b = normalize(b.unwrap_or(&empty), &empty);
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Integer(x), Value::Real(y)) => (*x as f64).total_cmp(y),
        (Value::Real(x), Value::Integer(y)) => x.total_cmp(&(*y as f64)),
        (Value::Real(x), Value::Real(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

fn normalize<'a>(value: &'a Value, empty: &'a Value) -> &'a Value {
    match value {
        Value::Null => empty,
        other => other,
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Integer(_) | Value::Real(_) => 1,
        Value::Text(_) => 2,
        Value::Blob(_) => 3,
    }
}

/// Display text of a cell; NULL renders empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::table_handler::{Record, TableHandler};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn model() -> TableModel {
        TableModel::from_result_set(ResultSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Value::Integer(1), text("Prelude")],
                vec![Value::Integer(2), Value::Null],
                vec![Value::Integer(3), text("Fugue")],
            ],
        })
    }

    #[test]
    fn sort_treats_null_as_empty_text() {
        let mut model = model();
        model.sort_by_column(1, SortOrder::Ascending);
        assert_eq!(model.cell(0, 1), Some(&Value::Null));
        assert_eq!(model.cell(1, 1), Some(&text("Fugue")));
        assert_eq!(model.cell(2, 1), Some(&text("Prelude")));

        model.sort_by_column(0, SortOrder::Descending);
        assert_eq!(model.cell(0, 0), Some(&Value::Integer(3)));

        // Ignored.
        model.sort_by_column(7, SortOrder::Ascending);
        assert_eq!(model.cell(0, 0), Some(&Value::Integer(3)));
    }

    #[test]
    fn dimensions_and_headers() {
        let model = model();
        assert_eq!(model.row_count(), 3);
        assert_eq!(model.column_count(), 2);
        assert_eq!(model.header(1), Some("name"));
        assert_eq!(model.header(2), None);
        assert_eq!(model.cell(3, 0), None);
    }

    #[test]
    fn missing_table_loads_empty() {
        let handler = TableHandler::open_in_memory().unwrap();
        let model = TableModel::load(&handler, &SelectQuery::new("tracks"));
        assert_eq!(model.row_count(), 0);
        assert_eq!(model.column_count(), 0);
    }

    #[test]
    fn headers_follow_projection() {
        let handler = TableHandler::open_in_memory().unwrap();
        handler
            .create_table(
                "t",
                &[
                    crate::sqlite_column!("a", &crate::sqlite_persistence::SqlType::Integer),
                    crate::sqlite_column!("b", &crate::sqlite_persistence::SqlType::Text),
                ],
            )
            .unwrap();
        handler
            .insert_into_table("t", &[Record::new().with("a", 1).with("b", text("x"))])
            .unwrap();

        let model = TableModel::load(&handler, &SelectQuery::new("t").columns(["b"]));
        assert_eq!(model.headers(), &["b".to_string()]);
        assert_eq!(model.cell(0, 0), Some(&text("x")));
    }

    struct Failing;

    impl TableSource for Failing {
        fn select(&self, _query: &SelectQuery) -> Result<ResultSet> {
            Err(rusqlite::Error::QueryReturnedNoRows.into())
        }
    }

    #[test]
    fn any_error_degrades_to_empty() {
        assert_eq!(
            TableModel::load(&Failing, &SelectQuery::new("x")),
            TableModel::default()
        );
    }

    #[test]
    fn display_renders_null_empty() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&Value::Integer(1722)), "1722");
    }
}
