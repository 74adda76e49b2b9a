//! Initial schema: channels, programs, jobs and tracking titles.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Channels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Channels::Name).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(Channels::ForRecorder)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Channels::ForSyoboi)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Programs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Programs::Pid)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Programs::Tid).big_integer().not_null())
                    .col(Self::create_timestamp_column(manager, Programs::StartTime))
                    .col(Self::create_timestamp_column(manager, Programs::EndTime))
                    .col(ColumnDef::new(Programs::ChannelId).integer().not_null())
                    .col(ColumnDef::new(Programs::Count).string_len(16).null())
                    .col(
                        ColumnDef::new(Programs::StartOffset)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Programs::Subtitle)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Programs::Title).string().not_null())
                    .col(ColumnDef::new(Programs::Comment).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_programs_channel_id")
                            .from(Programs::Table, Programs::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Jobs::Pid)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(Self::create_timestamp_column(manager, Jobs::EnqueuedAt))
                    .col(Self::create_nullable_timestamp_column(manager, Jobs::FinishedAt))
                    .col(Self::create_timestamp_column(manager, Jobs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_jobs_pid")
                            .from(Jobs::Table, Jobs::Pid)
                            .to(Programs::Table, Programs::Pid)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Due-job lookups filter on both columns
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_enqueued_at_finished_at")
                    .table(Jobs::Table)
                    .col(Jobs::EnqueuedAt)
                    .col(Jobs::FinishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TrackingTitles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingTitles::Tid)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(Self::create_timestamp_column(manager, TrackingTitles::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackingTitles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Programs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channels::Table).to_owned())
            .await
    }
}

impl Migration {
    /// Timestamp column with the best fitting type for each backend
    fn create_timestamp_column(
        manager: &SchemaManager<'_>,
        column_name: impl sea_orm::Iden + 'static,
    ) -> ColumnDef {
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => ColumnDef::new(column_name)
                .timestamp_with_time_zone()
                .not_null()
                .to_owned(),
            _ => ColumnDef::new(column_name).timestamp().not_null().to_owned(),
        }
    }

    fn create_nullable_timestamp_column(
        manager: &SchemaManager<'_>,
        column_name: impl sea_orm::Iden + 'static,
    ) -> ColumnDef {
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => ColumnDef::new(column_name)
                .timestamp_with_time_zone()
                .null()
                .to_owned(),
            _ => ColumnDef::new(column_name).timestamp().null().to_owned(),
        }
    }
}

#[derive(DeriveIden)]
enum Channels {
    Table,
    Id,
    Name,
    ForRecorder,
    ForSyoboi,
}

#[derive(DeriveIden)]
enum Programs {
    Table,
    Pid,
    Tid,
    StartTime,
    EndTime,
    ChannelId,
    Count,
    StartOffset,
    Subtitle,
    Title,
    Comment,
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Pid,
    EnqueuedAt,
    FinishedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TrackingTitles {
    Table,
    Tid,
    CreatedAt,
}
