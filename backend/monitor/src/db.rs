//! Database layer: migrations, upserts and reads for jobs and domains.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::snapshot::{DomainSnapshot, JobSnapshot};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Create the file on first start.
    let url = if url.contains('?') || url.contains(":memory:") {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────

/// Insert or refresh job snapshots; returns the number of rows written.
pub async fn upsert_jobs(pool: &SqlitePool, jobs: &[JobSnapshot]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;
    for job in jobs {
        count += sqlx::query(
            r#"
            INSERT INTO jobs
                (address, owner, status, mode, domains, balance, cost_per_cycle,
                 runway_cycles, next_call_time, repeat_every, salt, message_hash,
                 truncated_branches, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(address) DO UPDATE SET
                owner              = excluded.owner,
                status             = excluded.status,
                mode               = COALESCE(excluded.mode, jobs.mode),
                domains            = CASE WHEN excluded.message_hash IS NULL
                                          THEN jobs.domains ELSE excluded.domains END,
                balance            = excluded.balance,
                cost_per_cycle     = COALESCE(excluded.cost_per_cycle, jobs.cost_per_cycle),
                runway_cycles      = excluded.runway_cycles,
                next_call_time     = COALESCE(excluded.next_call_time, jobs.next_call_time),
                repeat_every       = COALESCE(excluded.repeat_every, jobs.repeat_every),
                salt               = COALESCE(excluded.salt, jobs.salt),
                message_hash       = COALESCE(excluded.message_hash, jobs.message_hash),
                truncated_branches = excluded.truncated_branches,
                updated_at         = excluded.updated_at
            "#,
        )
        .bind(&job.address)
        .bind(&job.owner)
        .bind(&job.status)
        .bind(&job.mode)
        .bind(&job.domains)
        .bind(&job.balance)
        .bind(&job.cost_per_cycle)
        .bind(job.runway_cycles)
        .bind(job.next_call_time)
        .bind(job.repeat_every)
        .bind(job.salt)
        .bind(&job.message_hash)
        .bind(job.truncated_branches)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected() as usize;
    }
    tx.commit().await?;
    Ok(count)
}

/// Mark every live job of `owner` whose address is not in `registered` as
/// destroyed; returns the number of rows changed.
///
/// Destroying or redeploying a job removes it from the wallet's extensions,
/// after which the poller no longer fetches it.
pub async fn mark_unregistered_destroyed(
    pool: &SqlitePool,
    owner: &str,
    registered: &[String],
    now: i64,
) -> Result<usize> {
    let registered = serde_json::to_string(registered)?;
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET    status = 'destroyed', runway_cycles = NULL, updated_at = ?3
        WHERE  owner = ?1
          AND  status <> 'destroyed'
          AND  address NOT IN (SELECT value FROM json_each(?2))
        "#,
    )
    .bind(owner)
    .bind(registered)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() as usize)
}

const JOB_COLUMNS: &str = "address, owner, status, mode, domains, balance, cost_per_cycle, \
     runway_cycles, next_call_time, repeat_every, salt, message_hash, truncated_branches, \
     updated_at";

/// All known jobs, soonest next call first.
pub async fn get_all_jobs(pool: &SqlitePool) -> Result<Vec<JobSnapshot>> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY next_call_time IS NULL, next_call_time ASC, address ASC"
    );
    Ok(sqlx::query_as::<_, JobSnapshot>(&sql).fetch_all(pool).await?)
}

pub async fn get_job(pool: &SqlitePool, address: &str) -> Result<Option<JobSnapshot>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE address = ?1");
    Ok(sqlx::query_as::<_, JobSnapshot>(&sql)
        .bind(address)
        .fetch_optional(pool)
        .await?)
}

// ─────────────────────────────────────────────────────────
// Domains
// ─────────────────────────────────────────────────────────

/// Replace the domain set with `domains`; domains no longer held are dropped.
pub async fn replace_domains(pool: &SqlitePool, domains: &[DomainSnapshot]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM domains").execute(&mut *tx).await?;
    let mut count = 0usize;
    for d in domains {
        count += sqlx::query(
            r#"
            INSERT OR REPLACE INTO domains (address, name, expires_at, covered_by, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&d.address)
        .bind(&d.name)
        .bind(d.expires_at)
        .bind(&d.covered_by)
        .bind(d.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected() as usize;
    }
    tx.commit().await?;
    Ok(count)
}

/// All held domains, earliest expiry first.
pub async fn get_all_domains(pool: &SqlitePool) -> Result<Vec<DomainSnapshot>> {
    let rows = sqlx::query_as::<_, DomainSnapshot>(
        r#"
        SELECT address, name, expires_at, covered_by, updated_at
        FROM   domains
        ORDER  BY expires_at ASC, name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
