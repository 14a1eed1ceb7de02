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
use crate::domain::models::target::{RunOutcome, Target};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::infrastructure::database::entities::{
    change as change_entity, job as job_entity, snapshot as snapshot_entity,
    snapshot_history as history_entity, target as target_entity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 目标仓库实现
#[derive(Clone)]
pub struct TargetRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl TargetRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<target_entity::Model> for Target {
    fn from(model: target_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            platform: model.platform,
            category: model.category.parse().unwrap_or_default(),
            selector: model.selector,
            interval_secs: model.interval_secs,
            is_active: model.is_active,
            last_run_at: model.last_run_at.map(to_utc),
            last_outcome: model.last_outcome.and_then(|o| o.parse().ok()),
            created_at: to_utc(model.created_at),
            updated_at: to_utc(model.updated_at),
        }
    }
}

impl From<&Target> for target_entity::ActiveModel {
    fn from(target: &Target) -> Self {
        Self {
            id: Set(target.id),
            name: Set(target.name.clone()),
            url: Set(target.url.clone()),
            platform: Set(target.platform.clone()),
            category: Set(target.category.to_string()),
            selector: Set(target.selector.clone()),
            interval_secs: Set(target.interval_secs),
            is_active: Set(target.is_active),
            last_run_at: Set(target.last_run_at.map(to_fixed)),
            last_outcome: Set(target.last_outcome.map(|o| o.to_string())),
            created_at: Set(to_fixed(target.created_at)),
            updated_at: Set(to_fixed(target.updated_at)),
        }
    }
}

/// 记录目标的运行时间与结果，供快照仓库在同一事务中复用
pub(crate) async fn record_run_on<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    at: DateTime<Utc>,
    outcome: RunOutcome,
) -> Result<u64, RepositoryError> {
    let result = target_entity::Entity::update_many()
        .col_expr(target_entity::Column::LastRunAt, Expr::value(Some(to_fixed(at))))
        .col_expr(
            target_entity::Column::LastOutcome,
            Expr::value(Some(outcome.to_string())),
        )
        .filter(target_entity::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

#[async_trait]
impl TargetRepository for TargetRepositoryImpl {
    async fn create(&self, target: &Target) -> Result<Target, RepositoryError> {
        let model: target_entity::ActiveModel = target.into();

        let inserted = model
            .insert(self.db.as_ref())
            .await
            .map_err(map_write_error)?;
        Ok(inserted.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Target>, RepositoryError> {
        let model = target_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn update(&self, target: &Target) -> Result<Target, RepositoryError> {
        // 只写用户可编辑的列，运行记录由调度流程维护
        let result = target_entity::Entity::update_many()
            .col_expr(target_entity::Column::Name, Expr::value(target.name.clone()))
            .col_expr(
                target_entity::Column::Platform,
                Expr::value(target.platform.clone()),
            )
            .col_expr(
                target_entity::Column::Selector,
                Expr::value(target.selector.clone()),
            )
            .col_expr(
                target_entity::Column::IntervalSecs,
                Expr::value(target.interval_secs),
            )
            .col_expr(target_entity::Column::IsActive, Expr::value(target.is_active))
            .col_expr(
                target_entity::Column::UpdatedAt,
                Expr::value(to_fixed(Utc::now())),
            )
            .filter(target_entity::Column::Id.eq(target.id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.find_by_id(target.id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Target>, RepositoryError> {
        let models = target_entity::Entity::find()
            .order_by_asc(target_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Target::from).collect())
    }

    async fn list_active(&self) -> Result<Vec<Target>, RepositoryError> {
        let models = target_entity::Entity::find()
            .filter(target_entity::Column::IsActive.eq(true))
            .order_by_asc(target_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Target::from).collect())
    }

    async fn record_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        outcome: RunOutcome,
    ) -> Result<(), RepositoryError> {
        if record_run_on(self.db.as_ref(), id, at, outcome).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        let referenced = change_entity::Entity::find()
            .filter(change_entity::Column::TargetId.eq(id))
            .count(&txn)
            .await?;
        if referenced > 0 {
            return Err(RepositoryError::Conflict(format!(
                "target {} is referenced by {} change(s)",
                id, referenced
            )));
        }

        job_entity::Entity::delete_many()
            .filter(job_entity::Column::TargetId.eq(id))
            .exec(&txn)
            .await?;
        history_entity::Entity::delete_many()
            .filter(history_entity::Column::TargetId.eq(id))
            .exec(&txn)
            .await?;
        snapshot_entity::Entity::delete_by_id(id).exec(&txn).await?;

        let result = target_entity::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }
}
