//! SeaORM-based Job Store implementation
//!
//! Serves the scheduler and recorder through [`JobStore`] and exposes the
//! write side used by the CLI and the sync collaborator. Writes are also
//! available as free functions over any [`ConnectionTrait`] so they can run
//! inside [`SeaOrmJobStore::transaction`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionError, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{channels, jobs, prelude::*, programs, tracking_titles};
use crate::errors::{StoreError, StoreResult};
use crate::job_scheduling::JobStore;
use crate::models::{Channel, Job, Program};

/// Program listing as written by the sync collaborator.
#[derive(Debug, Clone)]
pub struct ProgramRecord {
    pub pid: i64,
    pub tid: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub channel_id: i32,
    pub count: Option<String>,
    pub start_offset: i32,
    pub subtitle: String,
    pub title: String,
    pub comment: Option<String>,
}

/// SeaORM-backed [`JobStore`]
#[derive(Clone)]
pub struct SeaOrmJobStore {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmJobStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn add_channel(
        &self,
        name: &str,
        for_recorder: i32,
        for_syoboi: i32,
    ) -> StoreResult<Channel> {
        let active_model = channels::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            for_recorder: Set(for_recorder),
            for_syoboi: Set(for_syoboi),
        };
        let result = Channels::insert(active_model)
            .exec(&*self.connection)
            .await
            .map_err(|e| map_write_error(e, "channels"))?;

        debug!(channel_id = result.last_insert_id, name, "Added channel");
        Ok(Channel {
            id: result.last_insert_id,
            name: name.to_string(),
            for_recorder,
            for_syoboi,
        })
    }

    pub async fn upsert_program(&self, record: &ProgramRecord) -> StoreResult<()> {
        upsert_program(&*self.connection, record).await
    }

    pub async fn add_job(&self, pid: i64, enqueued_at: DateTime<Utc>) -> StoreResult<()> {
        add_job(&*self.connection, pid, enqueued_at).await
    }

    pub async fn update_job(&self, pid: i64, enqueued_at: DateTime<Utc>) -> StoreResult<()> {
        update_job(&*self.connection, pid, enqueued_at).await
    }

    pub async fn delete_job(&self, pid: i64) -> StoreResult<()> {
        delete_job(&*self.connection, pid).await
    }

    pub async fn add_tracking_title(&self, tid: i64) -> StoreResult<()> {
        let active_model = tracking_titles::ActiveModel {
            tid: Set(tid),
            created_at: Set(Utc::now()),
        };
        TrackingTitles::insert(active_model)
            .exec_without_returning(&*self.connection)
            .await
            .map_err(|e| map_write_error(e, "tracking_titles"))?;
        Ok(())
    }

    pub async fn tracking_titles(&self) -> StoreResult<Vec<i64>> {
        let models = TrackingTitles::find()
            .order_by_asc(tracking_titles::Column::Tid)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(|m| m.tid).collect())
    }

    /// Run `callback` atomically. Any error rolls the whole callback back.
    pub async fn transaction<F, T>(&self, callback: F) -> StoreResult<T>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'c>>
            + Send,
        T: Send,
    {
        self.connection
            .transaction::<F, T, StoreError>(callback)
            .await
            .map_err(|e| match e {
                TransactionError::Connection(err) => StoreError::Database(err),
                TransactionError::Transaction(err) => err,
            })
    }

    fn program_to_domain(model: programs::Model, channel: channels::Model) -> Program {
        Program {
            pid: model.pid,
            tid: model.tid,
            start_time: model.start_time,
            end_time: model.end_time,
            channel_name: channel.name,
            channel_for_syoboi: channel.for_syoboi,
            channel_for_recorder: channel.for_recorder,
            count: model.count,
            start_offset: model.start_offset,
            subtitle: model.subtitle,
            title: model.title,
            comment: model.comment,
        }
    }
}

#[async_trait]
impl JobStore for SeaOrmJobStore {
    async fn due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let models = Jobs::find()
            .filter(jobs::Column::FinishedAt.is_null())
            .filter(jobs::Column::EnqueuedAt.gte(now))
            .order_by_asc(jobs::Column::EnqueuedAt)
            .all(&*self.connection)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| Job {
                pid: m.pid,
                enqueued_at: m.enqueued_at,
                finished_at: m.finished_at,
            })
            .collect())
    }

    async fn program(&self, pid: i64) -> StoreResult<Program> {
        let (model, channel) = Programs::find_by_id(pid)
            .find_also_related(Channels)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| StoreError::not_found("programs", "pid", pid))?;
        let channel_id = model.channel_id;
        let channel =
            channel.ok_or_else(|| StoreError::not_found("channels", "id", channel_id))?;
        Ok(Self::program_to_domain(model, channel))
    }

    async fn programs(&self, pids: &[i64]) -> StoreResult<Vec<Program>> {
        if pids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Programs::find()
            .filter(programs::Column::Pid.is_in(pids.iter().copied()))
            .find_also_related(Channels)
            .all(&*self.connection)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(model, channel)| {
                channel.map(|channel| Self::program_to_domain(model, channel))
            })
            .collect())
    }

    async fn mark_finished(&self, pid: i64) -> StoreResult<()> {
        let result = Jobs::update_many()
            .col_expr(jobs::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(jobs::Column::Pid.eq(pid))
            .exec(&*self.connection)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::not_found("jobs", "pid", pid));
        }
        Ok(())
    }

    async fn channels(&self) -> StoreResult<Vec<Channel>> {
        let models = Channels::find()
            .order_by_asc(channels::Column::Id)
            .all(&*self.connection)
            .await?;
        Ok(models
            .into_iter()
            .map(|m| Channel {
                id: m.id,
                name: m.name,
                for_recorder: m.for_recorder,
                for_syoboi: m.for_syoboi,
            })
            .collect())
    }
}

/// Insert or overwrite a program listing.
pub async fn upsert_program<C: ConnectionTrait>(db: &C, record: &ProgramRecord) -> StoreResult<()> {
    let active_model = programs::ActiveModel {
        pid: Set(record.pid),
        tid: Set(record.tid),
        start_time: Set(record.start_time),
        end_time: Set(record.end_time),
        channel_id: Set(record.channel_id),
        count: Set(record.count.clone()),
        start_offset: Set(record.start_offset),
        subtitle: Set(record.subtitle.clone()),
        title: Set(record.title.clone()),
        comment: Set(record.comment.clone()),
    };
    Programs::insert(active_model)
        .on_conflict(
            OnConflict::column(programs::Column::Pid)
                .update_columns([
                    programs::Column::Tid,
                    programs::Column::StartTime,
                    programs::Column::EndTime,
                    programs::Column::ChannelId,
                    programs::Column::Count,
                    programs::Column::StartOffset,
                    programs::Column::Subtitle,
                    programs::Column::Title,
                    programs::Column::Comment,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(|e| map_write_error(e, "programs"))?;
    Ok(())
}

/// Insert a new pending job. Fails if the program already has one.
pub async fn add_job<C: ConnectionTrait>(
    db: &C,
    pid: i64,
    enqueued_at: DateTime<Utc>,
) -> StoreResult<()> {
    Jobs::insert(new_job(pid, enqueued_at))
        .exec_without_returning(db)
        .await
        .map_err(|e| map_write_error(e, "jobs"))?;
    Ok(())
}

/// Insert or replace a job; a replaced job becomes pending again.
pub async fn update_job<C: ConnectionTrait>(
    db: &C,
    pid: i64,
    enqueued_at: DateTime<Utc>,
) -> StoreResult<()> {
    Jobs::insert(new_job(pid, enqueued_at))
        .on_conflict(
            OnConflict::column(jobs::Column::Pid)
                .update_columns([
                    jobs::Column::EnqueuedAt,
                    jobs::Column::FinishedAt,
                    jobs::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(|e| map_write_error(e, "jobs"))?;
    Ok(())
}

pub async fn delete_job<C: ConnectionTrait>(db: &C, pid: i64) -> StoreResult<()> {
    Jobs::delete_by_id(pid).exec(db).await?;
    Ok(())
}

fn new_job(pid: i64, enqueued_at: DateTime<Utc>) -> jobs::ActiveModel {
    jobs::ActiveModel {
        pid: Set(pid),
        enqueued_at: Set(enqueued_at),
        finished_at: Set(None),
        created_at: Set(Utc::now()),
    }
}

fn map_write_error(err: DbErr, table: &str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => StoreError::ConstraintViolation {
            constraint: format!("{table} unique"),
            message,
        },
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => StoreError::ConstraintViolation {
            constraint: format!("{table} foreign key"),
            message,
        },
        _ => StoreError::Database(err),
    }
}
