//! Row types of the catalog.

use rusqlite::types::Value;
use serde::Serialize;

/// One of the three lookup tables referenced from `tracks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Interpreter,
    Composer,
    Genre,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Interpreter, Dimension::Composer, Dimension::Genre];

    pub fn table(&self) -> &'static str {
        match self {
            Dimension::Interpreter => "interpreters",
            Dimension::Composer => "composers",
            Dimension::Genre => "genres",
        }
    }

    /// Primary key of the dimension table, also the column name in `tracks`.
    pub fn id_column(&self) -> &'static str {
        match self {
            Dimension::Interpreter => "interpreter_id",
            Dimension::Composer => "composer_id",
            Dimension::Genre => "genre_id",
        }
    }

    pub fn name_column(&self) -> &'static str {
        match self {
            Dimension::Interpreter => "interpreter_name",
            Dimension::Composer => "composer_name",
            Dimension::Genre => "genre_name",
        }
    }

    /// The dimension a `tracks` foreign-key column points to.
    pub fn from_key_column(column: &str) -> Option<Dimension> {
        Self::ALL.into_iter().find(|d| d.id_column() == column)
    }
}

/// Year cell of a track. The column has INTEGER affinity, but text such as
/// "ca. 1720" is stored unchanged and read back as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Year {
    Number(i64),
    Text(String),
}

impl Year {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(year) => Some(Year::Number(year)),
            Value::Real(year) => Some(Year::Text(year.to_string())),
            Value::Text(text) => Some(Year::Text(text)),
            Value::Null | Value::Blob(_) => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Year::Number(year) => Value::Integer(*year),
            Year::Text(text) => Value::Text(text.clone()),
        }
    }
}

/// A track joined with its interpreter, composer and genre names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntry {
    pub track_id: i64,
    pub track_name: Option<String>,
    pub year: Option<Year>,
    pub interpreter: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub media_location: Option<String>,
    pub sheet_location: Option<String>,
    pub thumbnail_location: Option<String>,
}

impl TrackEntry {
    pub const HEADERS: [&'static str; 9] = [
        "track_id",
        "track_name",
        "year",
        "interpreter_name",
        "composer_name",
        "genre_name",
        "media_location",
        "sheet_location",
        "thumbnail_location",
    ];

    pub(crate) fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(TrackEntry {
            track_id: row.get(0)?,
            track_name: row.get(1)?,
            year: Year::from_value(row.get(2)?),
            interpreter: row.get(3)?,
            composer: row.get(4)?,
            genre: row.get(5)?,
            media_location: row.get(6)?,
            sheet_location: row.get(7)?,
            thumbnail_location: row.get(8)?,
        })
    }

    /// Cells in [`TrackEntry::HEADERS`] order.
    pub fn to_row(&self) -> Vec<Value> {
        fn text(s: &Option<String>) -> Value {
            s.clone().map(Value::Text).unwrap_or(Value::Null)
        }
        vec![
            Value::Integer(self.track_id),
            text(&self.track_name),
            self.year.as_ref().map(Year::to_value).unwrap_or(Value::Null),
            text(&self.interpreter),
            text(&self.composer),
            text(&self.genre),
            text(&self.media_location),
            text(&self.sheet_location),
            text(&self.thumbnail_location),
        ]
    }
}

/// Input row for a new track, with dimension values given by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTrack {
    pub track_name: String,
    pub year: Option<i64>,
    pub interpreter: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub media_location: Option<String>,
    pub sheet_location: Option<String>,
    pub thumbnail_location: Option<String>,
}

impl NewTrack {
    pub fn new(track_name: impl Into<String>) -> Self {
        NewTrack {
            track_name: track_name.into(),
            ..Default::default()
        }
    }

    pub fn year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn interpreter(mut self, name: impl Into<String>) -> Self {
        self.interpreter = Some(name.into());
        self
    }

    pub fn composer(mut self, name: impl Into<String>) -> Self {
        self.composer = Some(name.into());
        self
    }

    pub fn genre(mut self, name: impl Into<String>) -> Self {
        self.genre = Some(name.into());
        self
    }

    pub fn media_location(mut self, location: impl Into<String>) -> Self {
        self.media_location = Some(location.into());
        self
    }

    pub fn sheet_location(mut self, location: impl Into<String>) -> Self {
        self.sheet_location = Some(location.into());
        self
    }

    pub fn thumbnail_location(mut self, location: impl Into<String>) -> Self {
        self.thumbnail_location = Some(location.into());
        self
    }

    /// Empty names count as absent.
    pub fn dimension_name(&self, dimension: Dimension) -> Option<&str> {
        let name = match dimension {
            Dimension::Interpreter => self.interpreter.as_deref(),
            Dimension::Composer => self.composer.as_deref(),
            Dimension::Genre => self.genre.as_deref(),
        };
        name.filter(|n| !n.is_empty())
    }
}

/// Equality filter on one `table.column` of the joined track view.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFilter {
    pub table: String,
    pub column: String,
    pub value: Value,
}

impl EntryFilter {
    pub fn new(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        EntryFilter {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// Parses `table.column`.
    pub fn parse(target: &str, value: impl Into<Value>) -> Option<Self> {
        let (table, column) = target.split_once('.')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some(Self::new(table, column, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_lookup() {
        assert_eq!(Dimension::from_key_column("genre_id"), Some(Dimension::Genre));
        assert_eq!(Dimension::from_key_column("track_id"), None);
    }

    #[test]
    fn entry_filter_parse() {
        let filter = EntryFilter::parse("composers.composer_name", "Bach".to_string()).unwrap();
        assert_eq!(filter.table, "composers");
        assert_eq!(filter.column, "composer_name");
        assert!(EntryFilter::parse("composer_name", 1).is_none());
        assert!(EntryFilter::parse(".x", 1).is_none());
    }

    #[test]
    fn empty_dimension_names_are_absent() {
        let track = NewTrack::new("Prelude").composer("").genre("Baroque");
        assert_eq!(track.dimension_name(Dimension::Composer), None);
        assert_eq!(track.dimension_name(Dimension::Genre), Some("Baroque"));
    }

    #[test]
    fn serializes_to_json() {
        let entry = TrackEntry {
            track_id: 1,
            track_name: Some("Prelude".to_string()),
            year: Some(Year::Number(1722)),
            interpreter: None,
            composer: Some("Bach".to_string()),
            genre: None,
            media_location: None,
            sheet_location: None,
            thumbnail_location: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["composer"], "Bach");
        assert_eq!(json["year"], 1722);
        assert!(json["genre"].is_null());
        assert_eq!(entry.to_row().len(), TrackEntry::HEADERS.len());
    }

    #[test]
    fn year_keeps_non_numeric_text() {
        assert_eq!(Year::from_value(Value::Integer(1832)), Some(Year::Number(1832)));
        assert_eq!(
            Year::from_value(Value::Text("ca. 1720".to_string())),
            Some(Year::Text("ca. 1720".to_string()))
        );
        assert_eq!(Year::from_value(Value::Null), None);
        assert_eq!(
            Year::Text("ca. 1720".to_string()).to_value(),
            Value::Text("ca. 1720".to_string())
        );
    }
}
