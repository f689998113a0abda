use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Column, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    GameLine, InjuryReport, InjuryStatus, PlayerProfile, Position, ScheduleGame, SnapCount,
    WeeklyStat,
};
use crate::error::Result;
use crate::etl::{EtlReport, TableState};
use crate::features::FeatureRow;

/// Advisory lock key serializing ETL runs across processes.
pub const ETL_LOCK_KEY: i64 = 0x4752_4944; // "GRID"

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Create a new store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the bookkeeping tables. Fact tables are created by the ETL
    /// itself from inferred source schemas, never here.
    pub async fn ensure_base_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                id BIGSERIAL PRIMARY KEY,
                table_name TEXT NOT NULL,
                operation TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS etl_runs (
                run_id UUID PRIMARY KEY,
                state TEXT NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                finished_at TIMESTAMPTZ,
                report TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Base schema ensured");
        Ok(())
    }

    // ==================== ETL coordination ====================

    /// Try to take the cross-process ETL lock. `false` means another run
    /// is in flight and this one must skip, not interleave.
    pub async fn try_acquire_etl_lock(&self) -> Result<bool> {
        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(ETL_LOCK_KEY)
            .fetch_one(&self.pool)
            .await?;
        Ok(locked)
    }

    pub async fn release_etl_lock(&self) -> Result<()> {
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(ETL_LOCK_KEY)
            .fetch_one(&self.pool)
            .await?;
        if !released {
            warn!("ETL advisory lock was not held at release");
        }
        Ok(())
    }

    /// Probe whether the weekly stats table has any rows, the signal the
    /// bootstrap decision is resolved from.
    pub async fn weekly_stats_populated(&self, season: i32) -> Result<bool> {
        let table = format!("weekly_player_stats_{}", season);
        let state = crate::etl::loader::table_state(&self.pool, &table).await?;
        Ok(state.seeded())
    }

    pub async fn table_state(&self, table: &str) -> Result<TableState> {
        crate::etl::loader::table_state(&self.pool, table).await
    }

    /// Persist a finished run for audit.
    pub async fn record_run(&self, report: &EtlReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO etl_runs (run_id, state, started_at, finished_at, report)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (run_id) DO UPDATE SET
                state = EXCLUDED.state,
                finished_at = EXCLUDED.finished_at,
                report = EXCLUDED.report
            "#,
        )
        .bind(report.run_id)
        .bind(report.state.as_str())
        .bind(report.started_at)
        .bind(report.finished_at)
        .bind(serde_json::to_string(&report.steps)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest run id and state, for the health endpoint.
    pub async fn last_run(&self) -> Result<Option<(Uuid, String, DateTime<Utc>)>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, state, started_at
            FROM etl_runs
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| (r.get("run_id"), r.get("state"), r.get("started_at"))))
    }

    // ==================== Fact table readers ====================
    //
    // Numeric columns are cast in SQL because their physical type depends
    // on what the source inferred (an all-integer week of yardage creates
    // a BIGINT column; corrections later widen values, not the column).

    pub async fn load_profiles(&self) -> Result<Vec<PlayerProfile>> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, player_name, position, team, status,
                   age::int8 AS age, years_exp::int8 AS years_exp,
                   draft_year::int8 AS draft_year, draft_number::int8 AS draft_number,
                   headshot_url
            FROM player_profiles
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut profiles = Vec::with_capacity(rows.len());
        for r in rows {
            let position: String = r.get("position");
            let position = match Position::try_from(position.as_str()) {
                Ok(p) => p,
                // Non-offensive rows slip into some feeds; they are not ours
                Err(_) => continue,
            };
            let status: Option<String> = r.try_get("status").ok();
            profiles.push(PlayerProfile {
                player_id: r.get("player_id"),
                name: r.get("player_name"),
                position,
                team: r.get("team"),
                status: status
                    .map(|s| InjuryStatus::decode(&s))
                    .unwrap_or(InjuryStatus::Active),
                age: r.try_get::<Option<i64>, _>("age").ok().flatten().map(|v| v as i32),
                years_exp: r
                    .try_get::<Option<i64>, _>("years_exp")
                    .ok()
                    .flatten()
                    .map(|v| v as i32),
                draft_year: r
                    .try_get::<Option<i64>, _>("draft_year")
                    .ok()
                    .flatten()
                    .map(|v| v as i32),
                draft_number: r
                    .try_get::<Option<i64>, _>("draft_number")
                    .ok()
                    .flatten()
                    .map(|v| v as i32),
                headshot_url: r.try_get("headshot_url").ok(),
            });
        }
        Ok(profiles)
    }

    pub async fn load_schedule(&self, season: i32) -> Result<Vec<ScheduleGame>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT game_id, season::int8 AS season, week::int8 AS week,
                   home_team, away_team,
                   home_score::float8 AS home_score, away_score::float8 AS away_score,
                   home_moneyline::float8 AS home_moneyline,
                   spread_line::float8 AS spread_line, total_line::float8 AS total_line
            FROM "schedule_{}"
            ORDER BY week
            "#,
            season
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ScheduleGame {
                game_id: r.get("game_id"),
                season: r.get::<i64, _>("season") as i32,
                week: r.get::<i64, _>("week") as i32,
                home_team: r.get("home_team"),
                away_team: r.get("away_team"),
                home_score: r.get("home_score"),
                away_score: r.get("away_score"),
                home_moneyline: r.get("home_moneyline"),
                spread_line: r.get("spread_line"),
                total_line: r.get("total_line"),
            })
            .collect())
    }

    pub async fn load_weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStat>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT player_id, season::int8 AS season, week::int8 AS week,
                   team, opponent_team,
                   COALESCE(passing_yards::float8, 0) AS passing_yards,
                   COALESCE(passing_tds::float8, 0) AS passing_tds,
                   COALESCE(interceptions::float8, 0) AS interceptions,
                   COALESCE(pass_attempts::float8, 0) AS pass_attempts,
                   COALESCE(rushing_yards::float8, 0) AS rushing_yards,
                   COALESCE(rushing_tds::float8, 0) AS rushing_tds,
                   COALESCE(rush_attempts::float8, 0) AS rush_attempts,
                   COALESCE(receiving_yards::float8, 0) AS receiving_yards,
                   COALESCE(receiving_tds::float8, 0) AS receiving_tds,
                   COALESCE(receptions::float8, 0) AS receptions,
                   COALESCE(targets::float8, 0) AS targets,
                   COALESCE(fumbles_lost::float8, 0) AS fumbles_lost,
                   COALESCE(fantasy_points_ppr::float8, 0) AS fantasy_points_ppr
            FROM "weekly_player_stats_{}"
            ORDER BY week
            "#,
            season
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| WeeklyStat {
                player_id: r.get("player_id"),
                season: r.get::<i64, _>("season") as i32,
                week: r.get::<i64, _>("week") as i32,
                team: r.try_get("team").unwrap_or_default(),
                opponent_team: r.try_get("opponent_team").unwrap_or_default(),
                passing_yards: r.get("passing_yards"),
                passing_tds: r.get("passing_tds"),
                interceptions: r.get("interceptions"),
                pass_attempts: r.get("pass_attempts"),
                rushing_yards: r.get("rushing_yards"),
                rushing_tds: r.get("rushing_tds"),
                rush_attempts: r.get("rush_attempts"),
                receiving_yards: r.get("receiving_yards"),
                receiving_tds: r.get("receiving_tds"),
                receptions: r.get("receptions"),
                targets: r.get("targets"),
                fumbles_lost: r.get("fumbles_lost"),
                fantasy_points_ppr: r.get("fantasy_points_ppr"),
            })
            .collect())
    }

    pub async fn load_snap_counts(&self, season: i32) -> Result<Vec<SnapCount>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT player_id, season::int8 AS season, week::int8 AS week,
                   COALESCE(snap_count::float8, 0) AS snap_count,
                   COALESCE(snap_share::float8, 0) AS snap_share,
                   COALESCE(team_total_snaps::float8, 0) AS team_total_snaps
            FROM "weekly_snap_counts_{}"
            ORDER BY week
            "#,
            season
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| SnapCount {
                player_id: r.get("player_id"),
                season: r.get::<i64, _>("season") as i32,
                week: r.get::<i64, _>("week") as i32,
                snap_count: r.get("snap_count"),
                snap_share: r.get("snap_share"),
                team_total_snaps: r.get("team_total_snaps"),
            })
            .collect())
    }

    pub async fn load_injuries(&self, season: i32) -> Result<Vec<InjuryReport>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT player_id, season::int8 AS season, week::int8 AS week,
                   status, raw_status, report_time
            FROM "weekly_injuries_{}"
            ORDER BY week
            "#,
            season
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let report_time: String = r.try_get("report_time").unwrap_or_default();
                InjuryReport {
                    player_id: r.get("player_id"),
                    season: r.get::<i64, _>("season") as i32,
                    week: r.get::<i64, _>("week") as i32,
                    status: InjuryStatus::decode(
                        &r.try_get::<String, _>("status").unwrap_or_default(),
                    ),
                    raw_status: r.try_get("raw_status").unwrap_or_default(),
                    report_time: report_time
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH),
                }
            })
            .collect())
    }

    pub async fn load_game_lines(&self, season: i32) -> Result<Vec<GameLine>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT game_id, season::int8 AS season, week::int8 AS week,
                   home_team, away_team,
                   total::float8 AS total, home_spread::float8 AS home_spread,
                   home_moneyline::float8 AS home_moneyline,
                   away_moneyline::float8 AS away_moneyline
            FROM "game_lines_{}"
            "#,
            season
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| GameLine {
                game_id: r.get("game_id"),
                season: r.get::<i64, _>("season") as i32,
                week: r.get::<i64, _>("week") as i32,
                home_team: r.get("home_team"),
                away_team: r.get("away_team"),
                total: r.get("total"),
                home_spread: r.get("home_spread"),
                home_moneyline: r.get("home_moneyline"),
                away_moneyline: r.get("away_moneyline"),
            })
            .collect())
    }

    /// Read the derived feature table back into feature rows. Columns are
    /// discovered from the row itself so the reader keeps up with an
    /// evolved feature set without a code change.
    pub async fn load_feature_rows(&self, season: i32) -> Result<Vec<FeatureRow>> {
        let table = format!("weekly_feature_set_{}", season);
        let rows = sqlx::query(&format!("SELECT * FROM \"{}\"", table))
            .fetch_all(&self.pool)
            .await?;

        const META: &[&str] = &["player_id", "season", "week", "team", "opponent", "position"];

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let position: String = r.try_get("position").unwrap_or_default();
            let position = match Position::try_from(position.as_str()) {
                Ok(p) => p,
                Err(_) => continue,
            };

            let mut values = std::collections::BTreeMap::new();
            for col in r.columns() {
                let name = col.name();
                if META.contains(&name) {
                    continue;
                }
                let value = r
                    .try_get::<Option<f64>, _>(name)
                    .ok()
                    .flatten()
                    .or_else(|| {
                        r.try_get::<Option<i64>, _>(name)
                            .ok()
                            .flatten()
                            .map(|v| v as f64)
                    });
                if let Some(v) = value {
                    values.insert(name.to_string(), v);
                }
            }

            out.push(FeatureRow {
                player_id: r.get("player_id"),
                season: r.get::<i64, _>("season") as i32,
                week: r.get::<i64, _>("week") as i32,
                team: r.try_get("team").unwrap_or_default(),
                opponent: r.try_get("opponent").unwrap_or_default(),
                position,
                values,
            });
        }
        Ok(out)
    }
}
