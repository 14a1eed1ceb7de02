// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{to_fixed, to_utc};
use crate::domain::models::change::{Change, ChangeKind};
use crate::domain::repositories::change_repository::ChangeRepository;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::infrastructure::database::entities::change as change_entity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 变更仓库实现
///
/// 变更只追加，唯一允许的修改是一次性写入洞察
#[derive(Clone)]
pub struct ChangeRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl ChangeRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<change_entity::Model> for Change {
    fn from(model: change_entity::Model) -> Self {
        Self {
            id: model.id,
            target_id: model.target_id,
            kind: model.kind.parse().unwrap_or(ChangeKind::Other),
            field: model.field,
            old_value: model.old_value,
            new_value: model.new_value,
            confidence: model.confidence,
            detected_at: to_utc(model.detected_at),
            insight: model.insight,
        }
    }
}

impl From<&Change> for change_entity::ActiveModel {
    fn from(change: &Change) -> Self {
        Self {
            id: Set(change.id),
            target_id: Set(change.target_id),
            kind: Set(change.kind.to_string()),
            field: Set(change.field.clone()),
            old_value: Set(change.old_value.clone()),
            new_value: Set(change.new_value.clone()),
            confidence: Set(change.confidence),
            detected_at: Set(to_fixed(change.detected_at)),
            insight: Set(change.insight.clone()),
        }
    }
}

/// 批量追加变更，调用方负责事务边界
pub(crate) async fn insert_changes<C: ConnectionTrait>(
    conn: &C,
    changes: &[Change],
) -> Result<(), RepositoryError> {
    if changes.is_empty() {
        return Ok(());
    }

    change_entity::Entity::insert_many(changes.iter().map(change_entity::ActiveModel::from))
        .exec(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl ChangeRepository for ChangeRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Change>, RepositoryError> {
        let model = change_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn attach_insight(&self, id: Uuid, insight: &str) -> Result<bool, RepositoryError> {
        let result = change_entity::Entity::update_many()
            .col_expr(
                change_entity::Column::Insight,
                Expr::value(Some(insight.to_string())),
            )
            .filter(change_entity::Column::Id.eq(id))
            .filter(change_entity::Column::Insight.is_null())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_by_target(
        &self,
        target_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Change>, RepositoryError> {
        let models = change_entity::Entity::find()
            .filter(change_entity::Column::TargetId.eq(target_id))
            .order_by_desc(change_entity::Column::DetectedAt)
            .order_by_asc(change_entity::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Change::from).collect())
    }

    async fn list_recent(&self, limit: u64, offset: u64) -> Result<Vec<Change>, RepositoryError> {
        let models = change_entity::Entity::find()
            .order_by_desc(change_entity::Column::DetectedAt)
            .order_by_asc(change_entity::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Change::from).collect())
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Change>, RepositoryError> {
        let models = change_entity::Entity::find()
            .filter(change_entity::Column::DetectedAt.gte(to_fixed(since)))
            .order_by_asc(change_entity::Column::DetectedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Change::from).collect())
    }
}
