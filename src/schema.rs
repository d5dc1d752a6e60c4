//! Table data source for the evaluator.
//!
//! The evaluator never holds references into provider data: `get_table` hands
//! out an owned copy so operators are free to rebuild rows.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::models::{Row, TableData, Value};

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("invalid dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table {table}: row {row} has column {column} which is not declared")]
    UndeclaredColumn { table: String, row: usize, column: String },
}

/// Maps a table name to its columns and rows. Immutable for a session.
pub trait SchemaProvider: Send + Sync {
    /// Owned copy of the named table, `None` when unknown. Lookup ignores case.
    fn get_table(&self, name: &str) -> Option<TableData>;

    fn table_names(&self) -> Vec<String>;
}

#[derive(Clone, Debug, Default)]
pub struct MockSchema {
    // keyed by lowercase name; value keeps the display name
    tables: HashMap<String, (String, TableData)>,
}

#[derive(Deserialize)]
struct DatasetTable {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl MockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: TableData) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, table: TableData) {
        let name = name.into();
        self.tables.insert(name.to_ascii_lowercase(), (name, table));
    }

    /// Loads tables from a JSON array of `{name, columns, rows}` objects.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let tables: Vec<DatasetTable> = serde_json::from_str(json)?;
        let mut schema = Self::new();
        for table in tables {
            for (index, row) in table.rows.iter().enumerate() {
                if let Some(extra) = row.keys().find(|k| !table.columns.contains(k)) {
                    return Err(SchemaError::UndeclaredColumn {
                        table: table.name.clone(),
                        row: index,
                        column: extra.clone(),
                    });
                }
            }
            log::debug!("dataset table {} loaded with {} rows", table.name, table.rows.len());
            schema.insert(table.name, TableData::new(table.columns, table.rows));
        }
        Ok(schema)
    }

    /// The classroom dataset used by the interactive lessons.
    pub fn sample() -> Self {
        let students = TableData::from_tuples(
            &["id", "name", "cohort"],
            vec![
                vec![1.into(), "Ada".into(), 2023.into()],
                vec![2.into(), "Linus".into(), 2023.into()],
                vec![3.into(), "Grace".into(), 2024.into()],
            ],
        );
        let enrollments = TableData::from_tuples(
            &["student_id", "course"],
            vec![
                vec![1.into(), "SQL 101".into()],
                vec![2.into(), "Databases".into()],
                vec![4.into(), "Intro to CS".into()],
            ],
        );
        let courses = TableData::from_tuples(
            &["title", "credits", "department"],
            vec![
                vec!["SQL 101".into(), 3.into(), "Data".into()],
                vec!["Databases".into(), 4.into(), "Data".into()],
                vec!["Intro to CS".into(), 3.into(), "Computing".into()],
                vec!["Algorithms".into(), 5.into(), "Computing".into()],
            ],
        );
        let grades = TableData::from_tuples(
            &["student_id", "course", "score"],
            vec![
                vec![1.into(), "SQL 101".into(), 95.into()],
                vec![1.into(), "Databases".into(), 88.into()],
                vec![2.into(), "Databases".into(), 72.into()],
                vec![3.into(), "Intro to CS".into(), 91.into()],
                vec![3.into(), "SQL 101".into(), Value::Null],
            ],
        );
        Self::new()
            .with_table("Students", students)
            .with_table("Enrollments", enrollments)
            .with_table("Courses", courses)
            .with_table("Grades", grades)
    }

    /// Process-wide sample schema, built once.
    pub fn global() -> &'static MockSchema {
        static INSTANCE: Lazy<MockSchema> = Lazy::new(MockSchema::sample);
        &INSTANCE
    }
}

impl SchemaProvider for MockSchema {
    fn get_table(&self, name: &str) -> Option<TableData> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .map(|(_, table)| table.clone())
    }

    fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|(name, _)| name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let schema = MockSchema::sample();
        let students = schema.get_table("students").expect("students");
        assert_eq!(students.columns, vec!["id", "name", "cohort"]);
        assert_eq!(students.len(), 3);
        assert!(schema.get_table("Teachers").is_none());
    }

    #[test]
    fn get_table_returns_independent_copy() {
        let schema = MockSchema::sample();
        let mut copy = schema.get_table("Students").unwrap();
        copy.rows.clear();
        assert_eq!(schema.get_table("Students").unwrap().len(), 3);
    }

    #[test]
    fn dataset_json_round_trips_into_schema() {
        let json = r#"[{
            "name": "Pets",
            "columns": ["id", "kind"],
            "rows": [{"id": 1, "kind": "cat"}, {"id": 2, "kind": null}]
        }]"#;
        let schema = MockSchema::from_json(json).expect("dataset");
        let pets = schema.get_table("PETS").unwrap();
        assert_eq!(pets.value(0, "kind"), Value::text("cat"));
        assert_eq!(pets.value(1, "kind"), Value::Null);
        assert_eq!(schema.table_names(), vec!["Pets".to_string()]);
    }

    #[test]
    fn dataset_rejects_undeclared_columns() {
        let json = r#"[{"name": "Pets", "columns": ["id"], "rows": [{"id": 1, "age": 3}]}]"#;
        let err = MockSchema::from_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::UndeclaredColumn { row: 0, .. }));
    }
}
