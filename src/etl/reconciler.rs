//! Column reconciliation: additive-only schema evolution.
//!
//! Compares an incoming dataset's columns against a table's live schema
//! and produces the minimal set of `ADD COLUMN` operations. Evolution is
//! strictly additive (no drops, no retypes), so rows written under any
//! earlier schema stay readable. Conflicting types fail the step instead
//! of coercing silently.

use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::{GridironError, Result};
use crate::ingest::{Column, ColumnType};

/// One live column as reported by information_schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub col_type: ColumnType,
}

/// Live schema of a target table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<LiveColumn>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A planned `ADD COLUMN` operation. Added columns are always nullable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    pub name: String,
    pub col_type: ColumnType,
}

/// Read the live schema from information_schema, `None` if the table
/// does not exist. The schema is always re-derived from here, never
/// trusted from the migration marker table.
pub async fn load_live_schema(pool: &PgPool, table: &str) -> Result<Option<TableSchema>> {
    let rows = sqlx::query(
        r#"
        SELECT column_name, data_type
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let columns = rows
        .iter()
        .map(|r| LiveColumn {
            name: r.get("column_name"),
            col_type: pg_type_to_column_type(r.get::<String, _>("data_type").as_str()),
        })
        .collect();

    Ok(Some(TableSchema {
        table: table.to_string(),
        columns,
    }))
}

/// Plan the additive changes needed to load `incoming` into `live`.
///
/// Pure: no database access. Returns the ordered ADD COLUMN list for
/// source-only columns; raises `SchemaConflict` when a shared column's
/// incoming type cannot load into the existing one.
pub fn plan(live: &TableSchema, incoming: &[Column]) -> Result<Vec<ColumnChange>> {
    let mut changes = Vec::new();

    for col in incoming {
        match live.column(&col.name) {
            None => changes.push(ColumnChange {
                name: col.name.clone(),
                col_type: col.col_type,
            }),
            Some(existing) => {
                if !col.col_type.loads_into(existing.col_type) {
                    return Err(GridironError::SchemaConflict {
                        table: live.table.clone(),
                        column: col.name.clone(),
                        incoming: col.col_type.sql_type().to_string(),
                        existing: existing.col_type.sql_type().to_string(),
                    });
                }
            }
        }
    }

    Ok(changes)
}

/// Apply the planned changes inside a single transaction and record each
/// one in the migration log. On failure the whole reconciliation rolls
/// back; the table is never left partially migrated.
pub async fn apply(pool: &PgPool, table: &str, changes: &[ColumnChange]) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for change in changes {
        let ddl = format!(
            "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
            table,
            change.name,
            change.col_type.sql_type()
        );
        sqlx::query(&ddl).execute(&mut *tx).await?;

        sqlx::query(
            r#"
            INSERT INTO schema_migrations (table_name, operation, applied_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(table)
        .bind(&ddl)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(table, count = changes.len(), "Applied schema changes");
    Ok(())
}

/// Effective column types for an insert: live schema types where known,
/// the dataset's inferred types for freshly planned columns.
pub fn effective_types(live: &TableSchema, incoming: &[Column]) -> Vec<(String, ColumnType)> {
    incoming
        .iter()
        .map(|c| {
            let ty = live
                .column(&c.name)
                .map(|l| l.col_type)
                .unwrap_or(c.col_type);
            (c.name.clone(), ty)
        })
        .collect()
}

fn pg_type_to_column_type(data_type: &str) -> ColumnType {
    match data_type {
        "bigint" | "integer" | "smallint" => ColumnType::Integer,
        "double precision" | "real" | "numeric" => ColumnType::Float,
        "boolean" => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(cols: &[(&str, ColumnType)]) -> TableSchema {
        TableSchema {
            table: "weekly_player_stats_2025".to_string(),
            columns: cols
                .iter()
                .map(|(n, t)| LiveColumn {
                    name: n.to_string(),
                    col_type: *t,
                })
                .collect(),
        }
    }

    fn incoming(cols: &[(&str, ColumnType)]) -> Vec<Column> {
        cols.iter()
            .map(|(n, t)| Column {
                name: n.to_string(),
                col_type: *t,
            })
            .collect()
    }

    #[test]
    fn new_source_column_is_planned_as_add() {
        let live = live(&[("a", ColumnType::Integer), ("b", ColumnType::Integer)]);
        let inc = incoming(&[
            ("a", ColumnType::Integer),
            ("b", ColumnType::Integer),
            ("c", ColumnType::Float),
        ]);
        let changes = plan(&live, &inc).unwrap();
        assert_eq!(
            changes,
            vec![ColumnChange {
                name: "c".to_string(),
                col_type: ColumnType::Float,
            }]
        );
    }

    #[test]
    fn matching_schema_plans_nothing() {
        let live = live(&[("a", ColumnType::Integer), ("b", ColumnType::Text)]);
        let inc = incoming(&[("a", ColumnType::Integer), ("b", ColumnType::Text)]);
        assert!(plan(&live, &inc).unwrap().is_empty());
    }

    #[test]
    fn live_columns_absent_from_source_are_never_dropped() {
        // Source lost a column; the plan must not touch it.
        let live = live(&[("a", ColumnType::Integer), ("legacy", ColumnType::Float)]);
        let inc = incoming(&[("a", ColumnType::Integer)]);
        let changes = plan(&live, &inc).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn text_into_numeric_is_a_conflict() {
        let live = live(&[("yards", ColumnType::Float)]);
        let inc = incoming(&[("yards", ColumnType::Text)]);
        let err = plan(&live, &inc).unwrap_err();
        match err {
            GridironError::SchemaConflict { column, .. } => assert_eq!(column, "yards"),
            other => panic!("expected SchemaConflict, got {:?}", other),
        }
    }

    #[test]
    fn integer_widens_into_float_without_ddl() {
        let live = live(&[("yards", ColumnType::Float)]);
        let inc = incoming(&[("yards", ColumnType::Integer)]);
        assert!(plan(&live, &inc).unwrap().is_empty());
    }

    #[test]
    fn float_into_integer_is_a_conflict() {
        let live = live(&[("week", ColumnType::Integer)]);
        let inc = incoming(&[("week", ColumnType::Float)]);
        assert!(matches!(
            plan(&live, &inc),
            Err(GridironError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn effective_types_prefer_live_schema() {
        let live = live(&[("yards", ColumnType::Float)]);
        let inc = incoming(&[("yards", ColumnType::Integer), ("new", ColumnType::Integer)]);
        let eff = effective_types(&live, &inc);
        assert_eq!(eff[0], ("yards".to_string(), ColumnType::Float));
        assert_eq!(eff[1], ("new".to_string(), ColumnType::Integer));
    }

    #[test]
    fn pg_type_mapping() {
        assert_eq!(pg_type_to_column_type("bigint"), ColumnType::Integer);
        assert_eq!(
            pg_type_to_column_type("double precision"),
            ColumnType::Float
        );
        assert_eq!(pg_type_to_column_type("boolean"), ColumnType::Boolean);
        assert_eq!(
            pg_type_to_column_type("character varying"),
            ColumnType::Text
        );
    }
}
