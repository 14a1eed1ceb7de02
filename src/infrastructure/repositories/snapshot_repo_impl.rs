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

use super::change_repo_impl::insert_changes;
use super::job_repo_impl::finish_on;
use super::target_repo_impl::record_run_on;
use super::{to_fixed, to_utc};
use crate::domain::models::job::Job;
use crate::domain::models::snapshot::{ExtractedValue, Snapshot};
use crate::domain::models::target::RunOutcome;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::snapshot_repository::{Observation, SnapshotRepository};
use crate::infrastructure::database::entities::{
    snapshot as snapshot_entity, snapshot_history as history_entity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 快照仓库实现
///
/// 当前快照、历史快照、变更与目标运行记录在同一事务中提交
#[derive(Clone)]
pub struct SnapshotRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SnapshotRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn encode_value(value: &ExtractedValue) -> Result<serde_json::Value, DbErr> {
    serde_json::to_value(value).map_err(|e| DbErr::Json(e.to_string()))
}

fn decode_value(value: serde_json::Value) -> Result<ExtractedValue, DbErr> {
    serde_json::from_value(value).map_err(|e| DbErr::Json(e.to_string()))
}

/// 在事务内完成任务；任务已被回收或终止时整个事务放弃
async fn complete_job_on<C: ConnectionTrait>(
    conn: &C,
    job: Option<&Job>,
) -> Result<(), RepositoryError> {
    if let Some(job) = job {
        if finish_on(conn, job).await? == 0 {
            return Err(RepositoryError::JobNotActive(job.id));
        }
    }
    Ok(())
}

impl TryFrom<snapshot_entity::Model> for Snapshot {
    type Error = DbErr;

    fn try_from(model: snapshot_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            target_id: model.target_id,
            value: decode_value(model.value)?,
            content_hash: model.content_hash,
            captured_at: to_utc(model.captured_at),
            checked_at: to_utc(model.checked_at),
        })
    }
}

impl TryFrom<history_entity::Model> for Snapshot {
    type Error = DbErr;

    fn try_from(model: history_entity::Model) -> Result<Self, Self::Error> {
        let captured_at = to_utc(model.captured_at);
        Ok(Self {
            target_id: model.target_id,
            value: decode_value(model.value)?,
            content_hash: model.content_hash,
            captured_at,
            checked_at: captured_at,
        })
    }
}

#[async_trait]
impl SnapshotRepository for SnapshotRepositoryImpl {
    async fn find_current(&self, target_id: Uuid) -> Result<Option<Snapshot>, RepositoryError> {
        let model = snapshot_entity::Entity::find_by_id(target_id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Snapshot::try_from).transpose()?)
    }

    async fn touch(
        &self,
        target_id: Uuid,
        at: DateTime<Utc>,
        job: Option<&Job>,
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        complete_job_on(&txn, job).await?;

        let result = snapshot_entity::Entity::update_many()
            .col_expr(snapshot_entity::Column::CheckedAt, Expr::value(to_fixed(at)))
            .filter(snapshot_entity::Column::TargetId.eq(target_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }

        if record_run_on(&txn, target_id, at, RunOutcome::Unchanged).await? == 0 {
            return Err(RepositoryError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    async fn commit_observation(&self, observation: Observation) -> Result<(), RepositoryError> {
        let Observation {
            job,
            snapshot,
            previous_hash,
            changes,
            outcome,
        } = observation;
        let value = encode_value(&snapshot.value)?;

        let txn = self.db.begin().await?;

        complete_job_on(&txn, job.as_ref()).await?;

        let current = snapshot_entity::Entity::find_by_id(snapshot.target_id)
            .one(&txn)
            .await?;

        // 当前快照必须仍是比较时读取的那一个
        match (current, previous_hash) {
            (None, None) => {
                snapshot_entity::ActiveModel {
                    target_id: Set(snapshot.target_id),
                    value: Set(value.clone()),
                    content_hash: Set(snapshot.content_hash.clone()),
                    captured_at: Set(to_fixed(snapshot.captured_at)),
                    checked_at: Set(to_fixed(snapshot.checked_at)),
                }
                .insert(&txn)
                .await?;
            }
            (Some(current), Some(expected)) if current.content_hash == expected => {
                snapshot_entity::Entity::update_many()
                    .col_expr(snapshot_entity::Column::Value, Expr::value(value.clone()))
                    .col_expr(
                        snapshot_entity::Column::ContentHash,
                        Expr::value(snapshot.content_hash.clone()),
                    )
                    .col_expr(
                        snapshot_entity::Column::CapturedAt,
                        Expr::value(to_fixed(snapshot.captured_at)),
                    )
                    .col_expr(
                        snapshot_entity::Column::CheckedAt,
                        Expr::value(to_fixed(snapshot.checked_at)),
                    )
                    .filter(snapshot_entity::Column::TargetId.eq(snapshot.target_id))
                    .filter(snapshot_entity::Column::ContentHash.eq(expected))
                    .exec(&txn)
                    .await?;
            }
            (current, _) => {
                return Err(RepositoryError::Conflict(format!(
                    "current snapshot of target {} changed concurrently (now {:?})",
                    snapshot.target_id,
                    current.map(|c| c.content_hash)
                )));
            }
        }

        history_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            target_id: Set(snapshot.target_id),
            value: Set(value),
            content_hash: Set(snapshot.content_hash.clone()),
            captured_at: Set(to_fixed(snapshot.captured_at)),
        }
        .insert(&txn)
        .await?;

        insert_changes(&txn, &changes).await?;

        if record_run_on(&txn, snapshot.target_id, snapshot.captured_at, outcome).await? == 0 {
            return Err(RepositoryError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    async fn list_history(
        &self,
        target_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Snapshot>, RepositoryError> {
        let models = history_entity::Entity::find()
            .filter(history_entity::Column::TargetId.eq(target_id))
            .order_by_desc(history_entity::Column::CapturedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .map(Snapshot::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
