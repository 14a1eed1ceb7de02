// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{to_fixed, to_utc};
use crate::domain::models::notification::{Notification, NotificationKind};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::notification_repository::NotificationRepository;
use crate::infrastructure::database::entities::notification as notification_entity;
use async_trait::async_trait;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 通知仓库实现
#[derive(Clone)]
pub struct NotificationRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<notification_entity::Model> for Notification {
    fn from(model: notification_entity::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind.parse().unwrap_or(NotificationKind::Alert),
            title: model.title,
            message: model.message,
            target_id: model.target_id,
            change_id: model.change_id,
            is_read: model.is_read,
            created_at: to_utc(model.created_at),
        }
    }
}

#[async_trait]
impl NotificationRepository for NotificationRepositoryImpl {
    async fn create(&self, notification: &Notification) -> Result<Notification, RepositoryError> {
        let model = notification_entity::ActiveModel {
            id: Set(notification.id),
            kind: Set(notification.kind.to_string()),
            title: Set(notification.title.clone()),
            message: Set(notification.message.clone()),
            target_id: Set(notification.target_id),
            change_id: Set(notification.change_id),
            is_read: Set(notification.is_read),
            created_at: Set(to_fixed(notification.created_at)),
        };

        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.into())
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Notification>, RepositoryError> {
        let models = notification_entity::Entity::find()
            .order_by_desc(notification_entity::Column::CreatedAt)
            .order_by_asc(notification_entity::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Notification::from).collect())
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = notification_entity::Entity::update_many()
            .col_expr(notification_entity::Column::IsRead, Expr::value(true))
            .filter(notification_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<u64, RepositoryError> {
        let result = notification_entity::Entity::update_many()
            .col_expr(notification_entity::Column::IsRead, Expr::value(true))
            .filter(notification_entity::Column::IsRead.eq(false))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn unread_count(&self) -> Result<u64, RepositoryError> {
        let count = notification_entity::Entity::find()
            .filter(notification_entity::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
