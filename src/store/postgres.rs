//! PostgreSQL-backed [`AuthStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tracing::Instrument;

use super::{Account, AuthStore, HistoryPage, InsertOutcome, LoginAttempt, Outcome, SessionGrant};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const ACCOUNT_COLUMNS: &str = r"
    account_id, user_name, credential, active, lock_until,
    fail_threshold, fail_window_seconds, lock_duration_seconds,
    session_id, expiry_seconds, expires_at
";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `sql/schema.sql`. Every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement.as_str()
            );
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(span)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

/// Split a schema file into statements on lines ending with `;`, dropping
/// comment-only lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        account_id: row.get("account_id"),
        user_name: row.get("user_name"),
        credential: row.get("credential"),
        active: row.get("active"),
        lock_until: row.get("lock_until"),
        fail_threshold: row.get("fail_threshold"),
        fail_window_seconds: row.get("fail_window_seconds"),
        lock_duration_seconds: row.get("lock_duration_seconds"),
        session_token: row.get("session_id"),
        session_ttl_seconds: row.get("expiry_seconds"),
        session_expires_at: row.get("expires_at"),
    }
}

fn attempt_from_row(row: &PgRow) -> Result<LoginAttempt> {
    let outcome: String = row.get("outcome");
    Ok(LoginAttempt {
        id: row.get("id"),
        account_id: row.get("account_id"),
        occurred_at: row.get("occurred_at"),
        outcome: outcome.parse()?,
    })
}

/// Take the account row lock inside `tx`. Returns `false` when the account
/// does not exist.
async fn lock_account_row(tx: &mut Transaction<'_, Postgres>, account_id: &str) -> Result<bool> {
    let query = "SELECT account_id FROM accounts WHERE account_id = $1 FOR UPDATE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to lock account row")?;
    Ok(row.is_some())
}

/// Keep the latest success, or the latest row of any outcome.
async fn trim_history(tx: &mut Transaction<'_, Postgres>, account_id: &str) -> Result<()> {
    let query = r"
        DELETE FROM login_history
        WHERE account_id = $1
          AND id <> (
            SELECT id FROM login_history
            WHERE account_id = $1
            ORDER BY (outcome = 'success') DESC, occurred_at DESC, id DESC
            LIMIT 1
          )
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to trim login history")?;
    Ok(())
}

impl PgStore {
    async fn fetch_account(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to lookup account by {column}"))?;
        Ok(row.as_ref().map(account_from_row))
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO accounts
                (account_id, user_name, credential, active,
                 fail_threshold, fail_window_seconds, lock_duration_seconds, expiry_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&account.account_id)
            .bind(&account.user_name)
            .bind(&account.credential)
            .bind(account.active)
            .bind(account.fail_threshold)
            .bind(account.fail_window_seconds)
            .bind(account.lock_duration_seconds)
            .bind(account.session_ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn account_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        self.fetch_account("account_id", account_id).await
    }

    async fn account_by_name(&self, user_name: &str) -> Result<Option<Account>> {
        self.fetch_account("user_name", user_name).await
    }

    async fn account_by_session(&self, token: &str) -> Result<Option<Account>> {
        self.fetch_account("session_id", token).await
    }

    async fn set_lock_until(&self, account_id: &str, unlock_at: i64) -> Result<bool> {
        let query = "UPDATE accounts SET lock_until = $2 WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(unlock_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set lock_until")?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_lock(&self, account_id: &str, clear_history: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("begin unlock transaction")?;

        if !lock_account_row(&mut tx, account_id).await? {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        let query = "UPDATE accounts SET lock_until = NULL WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to clear lock_until")?;

        if clear_history {
            trim_history(&mut tx, account_id).await?;
        }

        tx.commit().await.context("commit unlock transaction")?;
        Ok(true)
    }

    async fn clear_expired_lock(&self, account_id: &str, unlock_at: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("begin unlock transaction")?;

        let query = r"
            UPDATE accounts SET lock_until = NULL
            WHERE account_id = $1 AND lock_until = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(unlock_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to clear expired lock")?;

        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        trim_history(&mut tx, account_id).await?;
        tx.commit().await.context("commit unlock transaction")?;
        Ok(true)
    }

    async fn append_attempt(
        &self,
        account_id: &str,
        outcome: Outcome,
        occurred_at: i64,
        max_rows: i64,
    ) -> Result<Option<LoginAttempt>> {
        // The account row lock serializes concurrent appends for one account.
        let mut tx = self.pool.begin().await.context("begin history transaction")?;

        if !lock_account_row(&mut tx, account_id).await? {
            let _ = tx.rollback().await;
            return Ok(None);
        }

        let query = "SELECT COUNT(*) FROM login_history WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let count: i64 = sqlx::query(query)
            .bind(account_id)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to count login history")?
            .get(0);

        if count >= max_rows {
            let excess = count - max_rows + 1;
            let query = r"
                DELETE FROM login_history
                WHERE id IN (
                    SELECT id FROM login_history
                    WHERE account_id = $1
                    ORDER BY occurred_at ASC, id ASC
                    LIMIT $2
                )
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(account_id)
                .bind(excess)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to evict oldest login history")?;
        }

        let query = r"
            INSERT INTO login_history (account_id, occurred_at, outcome)
            VALUES ($1, $2, $3)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id: i64 = sqlx::query(query)
            .bind(account_id)
            .bind(occurred_at)
            .bind(outcome.as_str())
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert login history")?
            .get("id");

        tx.commit().await.context("commit history transaction")?;

        Ok(Some(LoginAttempt {
            id,
            account_id: account_id.to_string(),
            occurred_at,
            outcome,
        }))
    }

    async fn recent_attempts(&self, account_id: &str, limit: i64) -> Result<Vec<LoginAttempt>> {
        let query = r"
            SELECT id, account_id, occurred_at, outcome
            FROM login_history
            WHERE account_id = $1
            ORDER BY occurred_at DESC, id DESC
            LIMIT $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(account_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch recent login history")?;
        rows.iter().map(attempt_from_row).collect()
    }

    async fn page_attempts(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage> {
        let query = "SELECT COUNT(*) FROM login_history WHERE account_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let total: i64 = sqlx::query(query)
            .bind(account_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count login history")?
            .get(0);

        let query = r"
            SELECT id, account_id, occurred_at, outcome
            FROM login_history
            WHERE account_id = $1
            ORDER BY occurred_at DESC, id DESC
            LIMIT $2 OFFSET $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to page login history")?;

        Ok(HistoryPage {
            rows: rows.iter().map(attempt_from_row).collect::<Result<_>>()?,
            total,
        })
    }

    async fn purge_attempts_before(&self, cutoff: i64) -> Result<u64> {
        let query = "DELETE FROM login_history WHERE occurred_at < $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge login history")?;
        Ok(result.rows_affected())
    }

    async fn set_session(&self, account_id: &str, grant: &SessionGrant) -> Result<bool> {
        let query = r"
            UPDATE accounts
            SET session_id = $2, expiry_seconds = $3, expires_at = $4, active = TRUE
            WHERE account_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(&grant.token)
            .bind(grant.ttl_seconds)
            .bind(grant.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn end_session(&self, token: &str, expired_at: i64) -> Result<bool> {
        let query = "UPDATE accounts SET active = FALSE, expires_at = $2 WHERE session_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token)
            .bind(expired_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to end session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 6);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS accounts"));
        assert!(statements.iter().all(|s| s.ends_with(';')));
        assert!(statements.iter().all(|s| !s.contains("--")));
    }
}
