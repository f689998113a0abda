//! Physical table loads: create, bulk insert, upsert, replace.
//!
//! All statements are runtime-built because target schemas are inferred
//! from the source. Every multi-row write runs inside a single
//! transaction per table so readers see pre-load or post-load state,
//! never an interleaving.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::debug;

use crate::error::{GridironError, Result};
use crate::ingest::{ColumnType, Dataset, Value};

/// Create a table from the dataset's inferred schema.
///
/// Key columns become the primary key (NOT NULL); everything else is
/// nullable, which is what keeps later additive evolution append-safe.
pub async fn create_table(
    pool: &PgPool,
    table: &str,
    dataset: &Dataset,
    key_columns: &[&str],
) -> Result<()> {
    for k in key_columns {
        if !dataset.has_column(k) {
            return Err(GridironError::InvalidSource(format!(
                "key column '{}' missing from source for table {}",
                k, table
            )));
        }
    }

    let mut defs: Vec<String> = dataset
        .columns
        .iter()
        .map(|c| {
            let not_null = if key_columns.contains(&c.name.as_str()) {
                " NOT NULL"
            } else {
                ""
            };
            format!("\"{}\" {}{}", c.name, c.col_type.sql_type(), not_null)
        })
        .collect();

    if !key_columns.is_empty() {
        let key_list = key_columns
            .iter()
            .map(|k| format!("\"{}\"", k))
            .collect::<Vec<_>>()
            .join(", ");
        defs.push(format!("PRIMARY KEY ({})", key_list));
    }

    let ddl = format!("CREATE TABLE \"{}\" ({})", table, defs.join(", "));
    sqlx::query(&ddl).execute(pool).await?;
    debug!(table, "Created table");
    Ok(())
}

/// Bulk insert every row in one transaction.
pub async fn insert_all(
    pool: &PgPool,
    table: &str,
    dataset: &Dataset,
    types: &[(String, ColumnType)],
) -> Result<u64> {
    let sql = insert_sql(table, types, &[]);
    let mut tx = pool.begin().await?;
    for row in &dataset.rows {
        bind_row(sqlx::query(&sql), row, types)?
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(dataset.rows.len() as u64)
}

/// Upsert every row by primary key in one transaction: new keys insert,
/// existing keys update their non-key columns. Re-running with identical
/// data is a no-op on content.
pub async fn upsert_all(
    pool: &PgPool,
    table: &str,
    dataset: &Dataset,
    types: &[(String, ColumnType)],
    key_columns: &[&str],
) -> Result<u64> {
    let sql = insert_sql(table, types, key_columns);
    let mut tx = pool.begin().await?;
    for row in &dataset.rows {
        bind_row(sqlx::query(&sql), row, types)?
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(dataset.rows.len() as u64)
}

/// Truncate and reload in one transaction. Callers must have already
/// reconciled the schema; this function never alters structure.
pub async fn replace_all(
    pool: &PgPool,
    table: &str,
    dataset: &Dataset,
    types: &[(String, ColumnType)],
) -> Result<u64> {
    let sql = insert_sql(table, types, &[]);
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("TRUNCATE TABLE \"{}\"", table))
        .execute(&mut *tx)
        .await?;
    for row in &dataset.rows {
        bind_row(sqlx::query(&sql), row, types)?
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(dataset.rows.len() as u64)
}

/// Existence + row count probe.
pub async fn table_state(pool: &PgPool, table: &str) -> Result<super::TableState> {
    let exists: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
        .bind(format!("public.\"{}\"", table))
        .fetch_one(pool)
        .await?;

    if exists.is_none() {
        return Ok(super::TableState::missing());
    }

    let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM \"{}\"", table))
        .fetch_one(pool)
        .await?;
    let count: i64 = row.get("cnt");

    Ok(super::TableState {
        exists: true,
        row_count: count,
    })
}

fn insert_sql(table: &str, types: &[(String, ColumnType)], key_columns: &[&str]) -> String {
    let columns = types
        .iter()
        .map(|(n, _)| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=types.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    if key_columns.is_empty() {
        return format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table, columns, placeholders
        );
    }

    let conflict = key_columns
        .iter()
        .map(|k| format!("\"{}\"", k))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = types
        .iter()
        .filter(|(n, _)| !key_columns.contains(&n.as_str()))
        .map(|(n, _)| format!("\"{}\" = EXCLUDED.\"{}\"", n, n))
        .collect::<Vec<_>>()
        .join(", ");

    if updates.is_empty() {
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            table, columns, placeholders, conflict
        )
    } else {
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            table, columns, placeholders, conflict, updates
        )
    }
}

/// Bind one dataset row against the live column types, widening where the
/// lattice allows it.
fn bind_row<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    row: &'q [Value],
    types: &[(String, ColumnType)],
) -> Result<Query<'q, Postgres, PgArguments>> {
    for (value, (name, ty)) in row.iter().zip(types) {
        query = match (ty, value) {
            (ColumnType::Integer, Value::Null) => query.bind(None::<i64>),
            (ColumnType::Integer, Value::Integer(i)) => query.bind(*i),
            (ColumnType::Float, Value::Null) => query.bind(None::<f64>),
            (ColumnType::Float, Value::Integer(i)) => query.bind(*i as f64),
            (ColumnType::Float, Value::Float(f)) => query.bind(*f),
            (ColumnType::Boolean, Value::Null) => query.bind(None::<bool>),
            (ColumnType::Boolean, Value::Boolean(b)) => query.bind(*b),
            (ColumnType::Text, Value::Null) => query.bind(None::<String>),
            (ColumnType::Text, v) => query.bind(v.render()),
            (ty, v) => {
                return Err(GridironError::InvalidSource(format!(
                    "value {:?} cannot bind to {} column '{}'",
                    v,
                    ty.sql_type(),
                    name
                )))
            }
        };
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(cols: &[(&str, ColumnType)]) -> Vec<(String, ColumnType)> {
        cols.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn plain_insert_sql_shape() {
        let sql = insert_sql(
            "schedule_2025",
            &types(&[("game_id", ColumnType::Text), ("week", ColumnType::Integer)]),
            &[],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"schedule_2025\" (\"game_id\", \"week\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn upsert_sql_updates_only_non_key_columns() {
        let sql = insert_sql(
            "weekly_player_stats_2025",
            &types(&[
                ("player_id", ColumnType::Text),
                ("season", ColumnType::Integer),
                ("week", ColumnType::Integer),
                ("rushing_yards", ColumnType::Float),
            ]),
            &["player_id", "season", "week"],
        );
        assert!(sql.contains("ON CONFLICT (\"player_id\", \"season\", \"week\")"));
        assert!(sql.contains("\"rushing_yards\" = EXCLUDED.\"rushing_yards\""));
        assert!(!sql.contains("\"player_id\" = EXCLUDED"));
    }

    #[test]
    fn all_key_upsert_degrades_to_do_nothing() {
        let sql = insert_sql(
            "t",
            &types(&[("a", ColumnType::Text)]),
            &["a"],
        );
        assert!(sql.ends_with("DO NOTHING"));
    }
}
