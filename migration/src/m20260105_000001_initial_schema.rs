// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 监控数据初始模式迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    /// 应用数据库迁移
    ///
    /// # 参数
    ///
    /// * `manager` - 数据库模式管理器
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 迁移成功
    /// * `Err(DbErr)` - 迁移失败
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. targets (No dependencies)
        manager
            .create_table(
                Table::create()
                    .table(Targets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Targets::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Targets::Name).string().not_null())
                    .col(ColumnDef::new(Targets::Url).string().not_null())
                    .col(ColumnDef::new(Targets::Platform).string().null())
                    .col(ColumnDef::new(Targets::Category).string().not_null())
                    .col(ColumnDef::new(Targets::Selector).text().null())
                    .col(
                        ColumnDef::new(Targets::IntervalSecs)
                            .big_integer()
                            .not_null()
                            .default(3600),
                    )
                    .col(
                        ColumnDef::new(Targets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Targets::LastRunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Targets::LastOutcome).string().null())
                    .col(
                        ColumnDef::new(Targets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Targets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 2. snapshots (Depends on targets, one row per target)
        manager
            .create_table(
                Table::create()
                    .table(Snapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Snapshots::TargetId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Snapshots::Value).json().not_null())
                    .col(ColumnDef::new(Snapshots::ContentHash).string().not_null())
                    .col(
                        ColumnDef::new(Snapshots::CapturedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Snapshots::CheckedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshots_target")
                            .from(Snapshots::Table, Snapshots::TargetId)
                            .to(Targets::Table, Targets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 3. snapshot_history (Depends on targets)
        manager
            .create_table(
                Table::create()
                    .table(SnapshotHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SnapshotHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SnapshotHistory::TargetId).uuid().not_null())
                    .col(ColumnDef::new(SnapshotHistory::Value).json().not_null())
                    .col(
                        ColumnDef::new(SnapshotHistory::ContentHash)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SnapshotHistory::CapturedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshot_history_target")
                            .from(SnapshotHistory::Table, SnapshotHistory::TargetId)
                            .to(Targets::Table, Targets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 4. changes (Depends on targets; deleting a referenced target is refused)
        manager
            .create_table(
                Table::create()
                    .table(Changes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Changes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Changes::TargetId).uuid().not_null())
                    .col(ColumnDef::new(Changes::Kind).string().not_null())
                    .col(ColumnDef::new(Changes::Field).string().null())
                    .col(ColumnDef::new(Changes::OldValue).text().null())
                    .col(ColumnDef::new(Changes::NewValue).text().null())
                    .col(ColumnDef::new(Changes::Confidence).double().not_null())
                    .col(
                        ColumnDef::new(Changes::DetectedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Changes::Insight).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_changes_target")
                            .from(Changes::Table, Changes::TargetId)
                            .to(Targets::Table, Targets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // 5. jobs (Depends on targets)
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::TargetId).uuid().not_null())
                    .col(ColumnDef::new(Jobs::Status).string().not_null())
                    .col(ColumnDef::new(Jobs::Stage).string().not_null())
                    .col(
                        ColumnDef::new(Jobs::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Jobs::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::FailureKind).string().null())
                    .col(ColumnDef::new(Jobs::FailureReason).text().null())
                    .col(
                        ColumnDef::new(Jobs::ChangesDetected)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::WorkerId).uuid().null())
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Jobs::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Jobs::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_jobs_target")
                            .from(Jobs::Table, Jobs::TargetId)
                            .to(Targets::Table, Targets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 6. notifications (No foreign keys, outlives deleted targets)
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::Kind).string().not_null())
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(ColumnDef::new(Notifications::TargetId).uuid().null())
                    .col(ColumnDef::new(Notifications::ChangeId).uuid().null())
                    .col(
                        ColumnDef::new(Notifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    /// 回滚数据库迁移
    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Changes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SnapshotHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Snapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Targets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Targets {
    Table,
    Id,
    Name,
    Url,
    Platform,
    Category,
    Selector,
    IntervalSecs,
    IsActive,
    LastRunAt,
    LastOutcome,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Snapshots {
    Table,
    TargetId,
    Value,
    ContentHash,
    CapturedAt,
    CheckedAt,
}

#[derive(DeriveIden)]
pub enum SnapshotHistory {
    Table,
    Id,
    TargetId,
    Value,
    ContentHash,
    CapturedAt,
}

#[derive(DeriveIden)]
pub enum Changes {
    Table,
    Id,
    TargetId,
    Kind,
    Field,
    OldValue,
    NewValue,
    Confidence,
    DetectedAt,
    Insight,
}

#[derive(DeriveIden)]
pub enum Jobs {
    Table,
    Id,
    TargetId,
    Status,
    Stage,
    Progress,
    AttemptCount,
    FailureKind,
    FailureReason,
    ChangesDetected,
    WorkerId,
    CreatedAt,
    StartedAt,
    FinishedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Notifications {
    Table,
    Id,
    Kind,
    Title,
    Message,
    TargetId,
    ChangeId,
    IsRead,
    CreatedAt,
}
