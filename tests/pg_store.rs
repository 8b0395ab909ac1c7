//! Postgres backend checks. Skipped unless `OVPANEL_TEST_DSN` points at a
//! disposable database.

use anyhow::Result;
use ovpanel::store::{Account, AuthStore, InsertOutcome, Outcome, PgStore, SessionGrant};
use sqlx::postgres::PgPoolOptions;
use ulid::Ulid;

async fn connect() -> Result<Option<PgStore>> {
    let Ok(dsn) = std::env::var("OVPANEL_TEST_DSN") else {
        eprintln!("OVPANEL_TEST_DSN not set, skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(8).connect(&dsn).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;
    Ok(Some(store))
}

async fn account(store: &PgStore) -> Result<Account> {
    let id = Ulid::new().to_string().to_lowercase();
    let account = Account::new(id.clone(), format!("user-{id}"), "sealed".to_string());
    assert_eq!(store.insert_account(&account).await?, InsertOutcome::Created);
    Ok(account)
}

#[tokio::test]
async fn migrate_is_idempotent_and_names_are_unique() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    store.migrate().await?;
    store.ping().await?;

    let first = account(&store).await?;
    let duplicate = Account::new(
        Ulid::new().to_string(),
        first.user_name.clone(),
        "other".to_string(),
    );
    assert_eq!(
        store.insert_account(&duplicate).await?,
        InsertOutcome::Conflict
    );
    let loaded = store.account_by_name(&first.user_name).await?;
    assert_eq!(loaded.map(|a| a.account_id), Some(first.account_id));
    Ok(())
}

#[tokio::test]
async fn append_keeps_ten_newest_rows() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;

    for second in 0..15 {
        let row = store
            .append_attempt(&acct.account_id, Outcome::Failure, 1_000 + second, 10)
            .await?;
        assert!(row.is_some());
    }

    let page = store.page_attempts(&acct.account_id, 50, 0).await?;
    assert_eq!(page.total, 10);
    assert_eq!(page.rows.first().map(|r| r.occurred_at), Some(1_014));
    assert_eq!(page.rows.last().map(|r| r.occurred_at), Some(1_005));

    assert!(store
        .append_attempt("missing", Outcome::Success, 1_000, 10)
        .await?
        .is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_respect_cap() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;

    let mut handles = Vec::new();
    for second in 0..30 {
        let store = store.clone();
        let id = acct.account_id.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_attempt(&id, Outcome::Failure, 2_000 + second, 10)
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await??.is_some());
    }

    let page = store.page_attempts(&acct.account_id, 50, 0).await?;
    assert_eq!(page.total, 10);
    assert_eq!(page.rows.len(), 10);
    Ok(())
}

#[tokio::test]
async fn clear_lock_without_success_keeps_latest_row() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;
    let id = acct.account_id.as_str();

    for at in 200..205 {
        store.append_attempt(id, Outcome::Failure, at, 10).await?;
    }
    assert!(store.clear_lock(id, true).await?);
    let rows = store.recent_attempts(id, 10).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].outcome, Outcome::Failure);
    assert_eq!(rows[0].occurred_at, 204);
    Ok(())
}

#[tokio::test]
async fn expired_lock_clears_only_the_observed_deadline() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;
    let id = acct.account_id.as_str();

    for at in 300..303 {
        store.append_attempt(id, Outcome::Failure, at, 10).await?;
    }
    assert!(store.set_lock_until(id, 900).await?);

    assert!(!store.clear_expired_lock(id, 800).await?);
    assert_eq!(store.account_by_id(id).await?.and_then(|a| a.lock_until), Some(900));
    assert_eq!(store.recent_attempts(id, 10).await?.len(), 3);

    assert!(store.clear_expired_lock(id, 900).await?);
    assert_eq!(store.account_by_id(id).await?.and_then(|a| a.lock_until), None);
    assert_eq!(store.recent_attempts(id, 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn clear_lock_trims_to_latest_success() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;
    let id = acct.account_id.as_str();

    store.append_attempt(id, Outcome::Success, 100, 10).await?;
    for at in 101..104 {
        store.append_attempt(id, Outcome::Failure, at, 10).await?;
    }
    assert!(store.set_lock_until(id, 1_000).await?);
    assert_eq!(
        store.account_by_id(id).await?.and_then(|a| a.lock_until),
        Some(1_000)
    );

    assert!(store.clear_lock(id, true).await?);
    let rows = store.recent_attempts(id, 10).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].outcome, Outcome::Success);
    assert_eq!(rows[0].occurred_at, 100);
    assert_eq!(store.account_by_id(id).await?.and_then(|a| a.lock_until), None);

    assert!(!store.clear_lock("missing", true).await?);
    Ok(())
}

#[tokio::test]
async fn sessions_are_replaced_and_ended() -> Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };
    let acct = account(&store).await?;
    let id = acct.account_id.as_str();
    let first = SessionGrant {
        token: Ulid::new().to_string(),
        ttl_seconds: 600,
        expires_at: 2_000,
    };
    let second = SessionGrant {
        token: Ulid::new().to_string(),
        ttl_seconds: 600,
        expires_at: 2_100,
    };

    assert!(store.set_session(id, &first).await?);
    assert!(store.set_session(id, &second).await?);
    assert!(store.account_by_session(&first.token).await?.is_none());

    let holder = store.account_by_session(&second.token).await?;
    assert_eq!(holder.as_ref().map(|a| a.active), Some(true));

    assert!(store.end_session(&second.token, 1_500).await?);
    let ended = store.account_by_session(&second.token).await?;
    assert_eq!(ended.as_ref().map(|a| a.active), Some(false));
    assert_eq!(ended.and_then(|a| a.session_expires_at), Some(1_500));
    assert!(!store.end_session("missing", 1_500).await?);
    Ok(())
}
