//! Building blocks for the statements the table handler assembles.

use rusqlite::types::Value;

/// An ordered set of column/value pairs, i.e. one row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, replacing the previous value while keeping its position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(field) => field.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Splits the record into the fields whose column is in `known` and the
    /// names of the columns that were dropped.
    pub fn retain_known(&self, known: &[String]) -> (Record, Vec<String>) {
        let mut kept = Record::new();
        let mut dropped = Vec::new();
        for (name, value) in &self.fields {
            if known.iter().any(|k| k == name) {
                kept.fields.push((name.clone(), value.clone()));
            } else {
                dropped.push(name.clone());
            }
        }
        (kept, dropped)
    }
}

impl<C: Into<String>, V: Into<Value>> FromIterator<(C, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (C, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    /// Null-safe equality.
    Is,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::NotEq => "<>",
            Comparison::Lt => "<",
            Comparison::LtEq => "<=",
            Comparison::Gt => ">",
            Comparison::GtEq => ">=",
            Comparison::Like => "LIKE",
            Comparison::Is => "IS",
        }
    }

    pub fn parse(s: &str) -> Option<Comparison> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Some(Comparison::Eq),
            "<>" | "!=" => Some(Comparison::NotEq),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::LtEq),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::GtEq),
            "LIKE" => Some(Comparison::Like),
            "IS" => Some(Comparison::Is),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparison: Comparison,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            comparison,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Eq, value)
    }
}

/// Boolean operator joining the conditions of a WHERE clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConditionOperator {
    #[default]
    And,
    Or,
}

impl ConditionOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConditionOperator::And => "AND",
            ConditionOperator::Or => "OR",
        }
    }
}

/// Renders `WHERE a = ? AND b > ?` (empty string for no conditions) and the
/// values to bind, in placeholder order.
pub(crate) fn where_clause(
    conditions: &[Condition],
    operator: ConditionOperator,
) -> (String, Vec<Value>) {
    if conditions.is_empty() {
        return (String::new(), Vec::new());
    }
    let clause = conditions
        .iter()
        .map(|c| format!("{} {} ?", c.column, c.comparison.as_sql()))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", operator.as_sql()));
    let values = conditions.iter().map(|c| c.value.clone()).collect();
    (format!(" WHERE {}", clause), values)
}

/// A `SELECT` against a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    /// Projection; empty selects every column.
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub operator: ConditionOperator,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            operator: ConditionOperator::And,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn operator(mut self, operator: ConditionOperator) -> Self {
        self.operator = operator;
        self
    }
}
