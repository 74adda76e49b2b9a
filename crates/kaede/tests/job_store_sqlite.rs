//! SeaORM job store against a file-backed SQLite database

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use kaede::config::DatabaseConfig;
use kaede::database::Database;
use kaede::database::repositories::{ProgramRecord, SeaOrmJobStore};
use kaede::errors::StoreError;
use kaede::job_scheduling::JobStore;

async fn open_store(dir: &TempDir) -> Result<SeaOrmJobStore> {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("kaede.db").display()),
        max_connections: 4,
    };
    let database = Database::new(&config).await?;
    database.migrate().await?;
    Ok(SeaOrmJobStore::new(database.connection()))
}

fn program_record(pid: i64, channel_id: i32) -> ProgramRecord {
    ProgramRecord {
        pid,
        tid: 100,
        start_time: Utc.with_ymd_and_hms(2024, 3, 3, 13, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 3, 3, 13, 30, 0).unwrap(),
        channel_id,
        count: Some("1".to_string()),
        start_offset: 0,
        subtitle: "first".to_string(),
        title: "Show".to_string(),
        comment: None,
    }
}

#[tokio::test]
async fn test_due_jobs_skip_finished_and_past_jobs() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let channel = store.add_channel("MX", 9, 19).await?;
    for pid in 1..=4 {
        store.upsert_program(&program_record(pid, channel.id)).await?;
    }

    let now = Utc::now();
    store.add_job(1, now + TimeDelta::hours(2)).await?;
    store.add_job(2, now + TimeDelta::hours(1)).await?;
    store.add_job(3, now - TimeDelta::hours(1)).await?;
    store.add_job(4, now + TimeDelta::hours(3)).await?;
    store.mark_finished(4).await?;

    let jobs = store.due_jobs(now).await?;
    let pids: Vec<i64> = jobs.iter().map(|job| job.pid).collect();
    assert_eq!(pids, vec![2, 1]);
    assert!(jobs.iter().all(|job| !job.is_finished()));
    Ok(())
}

#[tokio::test]
async fn test_program_joins_channel() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let channel = store.add_channel("TOKYO MX", 9, 19).await?;
    store.upsert_program(&program_record(10, channel.id)).await?;

    let program = store.program(10).await?;
    assert_eq!(program.channel_name, "TOKYO MX");
    assert_eq!(program.channel_for_recorder, 9);
    assert_eq!(program.channel_for_syoboi, 19);
    assert_eq!(program.title, "Show");

    let mut updated = program_record(10, channel.id);
    updated.subtitle = "second".to_string();
    store.upsert_program(&updated).await?;
    assert_eq!(store.program(10).await?.subtitle, "second");

    assert!(store.programs(&[10, 11]).await?.iter().all(|p| p.pid == 10));
    Ok(())
}

#[tokio::test]
async fn test_missing_rows_are_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    assert!(matches!(
        store.program(404).await,
        Err(StoreError::RecordNotFound { .. })
    ));
    assert!(matches!(
        store.mark_finished(404).await,
        Err(StoreError::RecordNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_update_job_makes_a_finished_job_pending_again() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let channel = store.add_channel("MX", 9, 19).await?;
    store.upsert_program(&program_record(1, channel.id)).await?;

    let due = Utc::now() + TimeDelta::hours(1);
    store.add_job(1, due).await?;
    store.mark_finished(1).await?;
    assert!(store.due_jobs(Utc::now()).await?.is_empty());

    store.update_job(1, due + TimeDelta::minutes(5)).await?;
    let jobs = store.due_jobs(Utc::now()).await?;
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].finished_at.is_none());

    store.delete_job(1).await?;
    assert!(store.due_jobs(Utc::now()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_constraint_violations_are_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let channel = store.add_channel("MX", 9, 19).await?;
    store.upsert_program(&program_record(1, channel.id)).await?;
    store.add_job(1, Utc::now()).await?;

    assert!(matches!(
        store.add_channel("MX", 10, 20).await,
        Err(StoreError::ConstraintViolation { .. })
    ));
    assert!(matches!(
        store.add_job(1, Utc::now()).await,
        Err(StoreError::ConstraintViolation { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let channel = store.add_channel("MX", 9, 19).await?;
    let channel_id = channel.id;

    let result: Result<(), StoreError> = store
        .transaction(move |txn| {
            Box::pin(async move {
                kaede::database::repositories::job_store::upsert_program(
                    txn,
                    &program_record(1, channel_id),
                )
                .await?;
                Err(StoreError::not_found("programs", "pid", 2))
            })
        })
        .await;

    assert!(result.is_err());
    assert!(matches!(
        store.program(1).await,
        Err(StoreError::RecordNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_tracking_titles_and_channels() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    store.add_tracking_title(5678).await?;
    store.add_tracking_title(1234).await?;
    store.add_channel("NHK", 27, 1).await?;

    assert_eq!(store.tracking_titles().await?, vec![1234, 5678]);
    let channels = store.channels().await?;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "NHK");
    Ok(())
}
