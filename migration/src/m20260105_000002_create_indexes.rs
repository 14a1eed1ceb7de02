use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Index for jobs: oldest waiting job first
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_status_created_at")
                    .table(Jobs::Table)
                    .col(Jobs::Status)
                    .col(Jobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // At most one waiting or active job per target across processes
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_target_in_flight \
                 ON jobs (target_id) WHERE status IN ('waiting', 'active')",
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_changes_target_detected_at")
                    .table(Changes::Table)
                    .col(Changes::TargetId)
                    .col(Changes::DetectedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_snapshot_history_target_captured_at")
                    .table(SnapshotHistory::Table)
                    .col(SnapshotHistory::TargetId)
                    .col(SnapshotHistory::CapturedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_created_at")
                    .table(Notifications::Table)
                    .col(Notifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_notifications_created_at",
            "idx_snapshot_history_target_captured_at",
            "idx_changes_target_detected_at",
            "idx_jobs_target_in_flight",
            "idx_jobs_status_created_at",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Changes {
    Table,
    TargetId,
    DetectedAt,
}

#[derive(DeriveIden)]
enum SnapshotHistory {
    Table,
    TargetId,
    CapturedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    CreatedAt,
}
