// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{map_write_error, to_fixed, to_utc};
use crate::domain::models::job::{FailureKind, Job, JobStage, JobStatus};
use crate::domain::repositories::job_repository::{JobRepository, JobStats, RepositoryError};
use crate::infrastructure::database::entities::job as job_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层。`jobs(target_id)` 上的部分唯一索引
/// 保证每个目标最多一个等待或执行中的任务。
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn in_flight_statuses() -> Vec<String> {
    vec![JobStatus::Waiting.to_string(), JobStatus::Active.to_string()]
}

/// 写入任务终止状态，只作用于仍在途的任务，供快照仓库在同一事务中复用
pub(crate) async fn finish_on<C: ConnectionTrait>(
    conn: &C,
    job: &Job,
) -> Result<u64, RepositoryError> {
    let mut update = job_entity::Entity::update_many();
    let mut expected = in_flight_statuses();
    // 失败时阶段停留在数据库中已记录的位置，不回退
    if job.status == JobStatus::Completed {
        update = update
            .col_expr(job_entity::Column::Stage, Expr::value(job.stage.to_string()))
            .col_expr(job_entity::Column::Progress, Expr::value(job.progress));
        expected = vec![JobStatus::Active.to_string()];
    }
    let result = update
        .col_expr(job_entity::Column::Status, Expr::value(job.status.to_string()))
        .col_expr(job_entity::Column::AttemptCount, Expr::value(job.attempt_count))
        .col_expr(
            job_entity::Column::FailureKind,
            Expr::value(job.failure_kind.map(|k| k.to_string())),
        )
        .col_expr(
            job_entity::Column::FailureReason,
            Expr::value(job.failure_reason.clone()),
        )
        .col_expr(
            job_entity::Column::ChangesDetected,
            Expr::value(job.changes_detected),
        )
        .col_expr(
            job_entity::Column::FinishedAt,
            Expr::value::<Option<DateTime<FixedOffset>>>(job.finished_at.map(to_fixed)),
        )
        .col_expr(
            job_entity::Column::UpdatedAt,
            Expr::value(to_fixed(job.updated_at)),
        )
        .filter(job_entity::Column::Id.eq(job.id))
        .filter(job_entity::Column::Status.is_in(expected))
        .exec(conn)
        .await?;

    Ok(result.rows_affected)
}

impl From<job_entity::Model> for Job {
    fn from(model: job_entity::Model) -> Self {
        Self {
            id: model.id,
            target_id: model.target_id,
            status: model.status.parse().unwrap_or_default(),
            stage: model.stage.parse().unwrap_or_default(),
            progress: model.progress,
            attempt_count: model.attempt_count,
            failure_kind: model.failure_kind.and_then(|k| k.parse().ok()),
            failure_reason: model.failure_reason,
            changes_detected: model.changes_detected,
            worker_id: model.worker_id,
            created_at: to_utc(model.created_at),
            started_at: model.started_at.map(to_utc),
            finished_at: model.finished_at.map(to_utc),
            updated_at: to_utc(model.updated_at),
        }
    }
}

impl From<&Job> for job_entity::ActiveModel {
    fn from(job: &Job) -> Self {
        Self {
            id: Set(job.id),
            target_id: Set(job.target_id),
            status: Set(job.status.to_string()),
            stage: Set(job.stage.to_string()),
            progress: Set(job.progress),
            attempt_count: Set(job.attempt_count),
            failure_kind: Set(job.failure_kind.map(|k| k.to_string())),
            failure_reason: Set(job.failure_reason.clone()),
            changes_detected: Set(job.changes_detected),
            worker_id: Set(job.worker_id),
            created_at: Set(to_fixed(job.created_at)),
            started_at: Set(job.started_at.map(to_fixed)),
            finished_at: Set(job.finished_at.map(to_fixed)),
            updated_at: Set(to_fixed(job.updated_at)),
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError> {
        let model: job_entity::ActiveModel = job.into();

        let inserted = model
            .insert(self.db.as_ref())
            .await
            .map_err(map_write_error)?;
        Ok(inserted.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_in_flight(&self, target_id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let model = job_entity::Entity::find()
            .filter(job_entity::Column::TargetId.eq(target_id))
            .filter(job_entity::Column::Status.is_in(in_flight_statuses()))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn acquire_next(&self, worker_id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let txn = self.db.begin().await?;

        let candidate = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(JobStatus::Waiting.to_string()))
            .order_by_asc(job_entity::Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(candidate) = candidate else {
            txn.commit().await?;
            return Ok(None);
        };

        // 乐观条件更新：不支持行锁的后端上由状态条件兜底
        let now = to_fixed(Utc::now());
        let claimed = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Active.to_string()),
            )
            .col_expr(job_entity::Column::WorkerId, Expr::value(Some(worker_id)))
            .col_expr(job_entity::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(candidate.id))
            .filter(job_entity::Column::Status.eq(JobStatus::Waiting.to_string()))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            txn.commit().await?;
            return Ok(None);
        }

        let job = job_entity::Entity::find_by_id(candidate.id).one(&txn).await?;
        txn.commit().await?;

        Ok(job.map(Into::into))
    }

    async fn advance_stage(
        &self,
        id: Uuid,
        from: JobStage,
        to: JobStage,
    ) -> Result<bool, RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(job_entity::Column::Stage, Expr::value(to.to_string()))
            .col_expr(job_entity::Column::Progress, Expr::value(to.progress()))
            .col_expr(
                job_entity::Column::UpdatedAt,
                Expr::value(to_fixed(Utc::now())),
            )
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Stage.eq(from.to_string()))
            .filter(job_entity::Column::Status.eq(JobStatus::Active.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn record_attempts(&self, id: Uuid, attempts: i32) -> Result<(), RepositoryError> {
        job_entity::Entity::update_many()
            .col_expr(job_entity::Column::AttemptCount, Expr::value(attempts))
            .col_expr(
                job_entity::Column::UpdatedAt,
                Expr::value(to_fixed(Utc::now())),
            )
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(JobStatus::Active.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn finish(&self, job: &Job) -> Result<bool, RepositoryError> {
        Ok(finish_on(self.db.as_ref(), job).await? > 0)
    }

    async fn cancel(
        &self,
        id: Uuid,
        kind: FailureKind,
        reason: &str,
    ) -> Result<bool, RepositoryError> {
        let now = to_fixed(Utc::now());
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Failed.to_string()),
            )
            .col_expr(
                job_entity::Column::FailureKind,
                Expr::value(Some(kind.to_string())),
            )
            .col_expr(
                job_entity::Column::FailureReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(job_entity::Column::FinishedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(job_entity::Column::Status.eq(JobStatus::Waiting.to_string()))
                    .add(
                        Condition::all()
                            .add(job_entity::Column::Status.eq(JobStatus::Active.to_string()))
                            .add(job_entity::Column::Stage.eq(JobStage::Admitted.to_string())),
                    ),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_recent(&self, limit: u64, offset: u64) -> Result<Vec<Job>, RepositoryError> {
        let models = job_entity::Entity::find()
            .order_by_desc(job_entity::Column::CreatedAt)
            .order_by_desc(job_entity::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Job::from).collect())
    }

    async fn list_active(&self) -> Result<Vec<Job>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(JobStatus::Active.to_string()))
            .order_by_asc(job_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Job::from).collect())
    }

    async fn prune_terminal(&self, keep: u64) -> Result<u64, RepositoryError> {
        let terminal: Vec<(Uuid, Uuid)> = job_entity::Entity::find()
            .select_only()
            .column(job_entity::Column::Id)
            .column(job_entity::Column::TargetId)
            .filter(job_entity::Column::Status.is_not_in(in_flight_statuses()))
            .order_by_desc(job_entity::Column::CreatedAt)
            .into_tuple::<(Uuid, Uuid)>()
            .all(self.db.as_ref())
            .await?;

        let mut kept: HashMap<Uuid, u64> = HashMap::new();
        let mut expired = Vec::new();
        for (id, target_id) in terminal {
            let seen = kept.entry(target_id).or_insert(0);
            if *seen < keep {
                *seen += 1;
            } else {
                expired.push(id);
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let result = job_entity::Entity::delete_many()
            .filter(job_entity::Column::Id.is_in(expired))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn stats(&self) -> Result<JobStats, RepositoryError> {
        let count = |status: JobStatus| {
            job_entity::Entity::find()
                .filter(job_entity::Column::Status.eq(status.to_string()))
                .count(self.db.as_ref())
        };

        Ok(JobStats {
            waiting: count(JobStatus::Waiting).await?,
            active: count(JobStatus::Active).await?,
            completed: count(JobStatus::Completed).await?,
            failed: count(JobStatus::Failed).await?,
        })
    }
}
