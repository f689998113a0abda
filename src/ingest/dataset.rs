//! In-memory tabular batch parsed from a CSV drop.
//!
//! A `Dataset` is the unit the reconciler and the load strategies operate
//! on: column names with inferred types plus typed row values. Inference
//! widens per column across all rows (Integer ⊂ Float ⊂ Text; Boolean
//! only stays Boolean if every non-null cell parses as one).

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{GridironError, Result};

/// Inferred column type, in widening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    /// Postgres type used when the column is created.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
        }
    }

    /// Can a value of `self` be inserted into a live column of `other`
    /// without any DDL? Widening on insert is fine; narrowing is not.
    pub fn loads_into(&self, other: ColumnType) -> bool {
        use ColumnType::*;
        match (self, other) {
            (a, b) if *a == b => true,
            (Integer, Float) => true,
            // Text accepts any rendering
            (_, Text) => true,
            _ => false,
        }
    }

    fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed == "NULL" {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        match trimmed.to_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering used for key comparison and Text-column inserts.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

/// A named, typed column within a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
}

/// Parsed source batch: header + typed rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Read and type-infer a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path.as_ref())?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| normalize_column_name(h))
            .collect();

        if headers.is_empty() {
            return Err(GridironError::InvalidSource(format!(
                "{}: no header row",
                path.as_ref().display()
            )));
        }

        let mut seen = HashSet::new();
        for h in &headers {
            if !seen.insert(h.clone()) {
                return Err(GridironError::InvalidSource(format!(
                    "{}: duplicate column '{}'",
                    path.as_ref().display(),
                    h
                )));
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<Value> = record.iter().map(Value::parse).collect();
            // Short records pad with NULL, long ones are truncated
            row.resize(headers.len(), Value::Null);
            rows.push(row);
        }

        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name,
                col_type: infer_column_type(&rows, idx),
            })
            .collect();

        Ok(Dataset { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Append a computed column. `values` must match the current row count.
    pub fn push_column(
        &mut self,
        name: &str,
        col_type: ColumnType,
        values: Vec<Value>,
    ) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(GridironError::InvalidSource(format!(
                "computed column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        if self.has_column(name) {
            return Err(GridironError::InvalidSource(format!(
                "column '{}' already exists",
                name
            )));
        }
        self.columns.push(Column {
            name: name.to_string(),
            col_type,
        });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Composite key of a row, rendered for comparison.
    pub fn key_of(&self, row: usize, key_columns: &[&str]) -> Option<Vec<String>> {
        key_columns
            .iter()
            .map(|k| self.value(row, k).map(Value::render))
            .collect()
    }

    /// Keep, per key, only the row maximizing `order_by` (text-rendered
    /// comparison for text columns, numeric otherwise). Row order of the
    /// survivors follows first appearance of each key.
    pub fn dedup_by_key_keeping_max(
        &mut self,
        key_columns: &[&str],
        order_by: &str,
    ) -> Result<usize> {
        for k in key_columns.iter().chain(std::iter::once(&order_by)) {
            if !self.has_column(k) {
                return Err(GridironError::InvalidSource(format!(
                    "dedup column '{}' not in dataset",
                    k
                )));
            }
        }

        let mut best: Vec<usize> = Vec::new();
        let mut index_of_key: std::collections::HashMap<Vec<String>, usize> =
            std::collections::HashMap::new();

        for row in 0..self.rows.len() {
            let key = match self.key_of(row, key_columns) {
                Some(k) => k,
                None => continue,
            };
            match index_of_key.get(&key) {
                None => {
                    index_of_key.insert(key, best.len());
                    best.push(row);
                }
                Some(&slot) => {
                    let incumbent = best[slot];
                    if self.row_orders_after(row, incumbent, order_by) {
                        best[slot] = row;
                    }
                }
            }
        }

        let removed = self.rows.len() - best.len();
        let mut kept = Vec::with_capacity(best.len());
        for idx in best {
            kept.push(self.rows[idx].clone());
        }
        self.rows = kept;
        Ok(removed)
    }

    fn row_orders_after(&self, a: usize, b: usize, order_by: &str) -> bool {
        let va = self.value(a, order_by);
        let vb = self.value(b, order_by);
        match (va, vb) {
            (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
                (Some(fx), Some(fy)) => fx > fy,
                _ => x.render() > y.render(),
            },
            (Some(_), None) => true,
            _ => false,
        }
    }
}

fn infer_column_type(rows: &[Vec<Value>], idx: usize) -> ColumnType {
    let mut inferred: Option<ColumnType> = None;
    for row in rows {
        if let Some(t) = row.get(idx).and_then(Value::column_type) {
            inferred = Some(match inferred {
                None => t,
                Some(prev) => prev.widen(t),
            });
            if inferred == Some(ColumnType::Text) {
                break;
            }
        }
    }
    // An all-null column stays loadable as text
    inferred.unwrap_or(ColumnType::Text)
}

fn normalize_column_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn infers_widening_types() {
        let f = write_csv("a,b,c,d\n1,1.5,true,x\n2,2,false,y\n");
        let ds = Dataset::from_csv_path(f.path()).unwrap();
        assert_eq!(ds.columns[0].col_type, ColumnType::Integer);
        assert_eq!(ds.columns[1].col_type, ColumnType::Float);
        assert_eq!(ds.columns[2].col_type, ColumnType::Boolean);
        assert_eq!(ds.columns[3].col_type, ColumnType::Text);
    }

    #[test]
    fn int_then_float_widens_to_float() {
        let f = write_csv("a\n1\n2.5\n");
        let ds = Dataset::from_csv_path(f.path()).unwrap();
        assert_eq!(ds.columns[0].col_type, ColumnType::Float);
    }

    #[test]
    fn mixed_numeric_text_widens_to_text() {
        let f = write_csv("a\n1\nDNP\n");
        let ds = Dataset::from_csv_path(f.path()).unwrap();
        assert_eq!(ds.columns[0].col_type, ColumnType::Text);
    }

    #[test]
    fn empty_cells_are_null_and_dont_narrow() {
        let f = write_csv("a,b\n1,\n,2\n");
        let ds = Dataset::from_csv_path(f.path()).unwrap();
        assert_eq!(ds.columns[0].col_type, ColumnType::Integer);
        assert_eq!(ds.columns[1].col_type, ColumnType::Integer);
        assert!(ds.value(0, "b").unwrap().is_null());
    }

    #[test]
    fn normalizes_header_names() {
        let f = write_csv("Player ID,Snap-Pct\nx,0.5\n");
        let ds = Dataset::from_csv_path(f.path()).unwrap();
        assert!(ds.has_column("player_id"));
        assert!(ds.has_column("snap_pct"));
    }

    #[test]
    fn duplicate_header_rejected() {
        let f = write_csv("a,a\n1,2\n");
        assert!(Dataset::from_csv_path(f.path()).is_err());
    }

    #[test]
    fn dedup_keeps_latest_by_order_column() {
        let f = write_csv(
            "player_id,week,status,report_time\n\
             p1,5,Questionable,100\n\
             p1,5,Out,200\n\
             p2,5,Active,50\n",
        );
        let mut ds = Dataset::from_csv_path(f.path()).unwrap();
        let removed = ds
            .dedup_by_key_keeping_max(&["player_id", "week"], "report_time")
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(0, "status").unwrap().as_str(), Some("Out"));
        assert_eq!(ds.value(1, "status").unwrap().as_str(), Some("Active"));
    }

    #[test]
    fn loads_into_lattice() {
        use ColumnType::*;
        assert!(Integer.loads_into(Float));
        assert!(Integer.loads_into(Text));
        assert!(Float.loads_into(Text));
        assert!(!Float.loads_into(Integer));
        assert!(!Text.loads_into(Float));
        assert!(!Text.loads_into(Boolean));
        assert!(Boolean.loads_into(Boolean));
    }
}
