// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change::Change;
use crate::domain::repositories::change_repository::ChangeRepository;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::utils::paging::{paged, DEFAULT_PAGE_SIZE};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 变更账本错误类型
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 变更已经有洞察，调用方应视为成功的空操作
    #[error("Change {0} already has an insight")]
    AlreadyAnnotated(Uuid),
    /// 变更不存在
    #[error("Change {0} not found")]
    NotFound(Uuid),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 变更账本
///
/// 变更的追加发生在快照提交事务内部（见快照仓库），
/// 账本负责读取和一次性的洞察附加。
#[derive(Clone)]
pub struct ChangeLedger {
    repository: Arc<dyn ChangeRepository>,
}

impl ChangeLedger {
    pub fn new(repository: Arc<dyn ChangeRepository>) -> Self {
        Self { repository }
    }

    /// 根据ID读取变更
    pub async fn get(&self, id: Uuid) -> Result<Change, LedgerError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(LedgerError::NotFound(id))
    }

    /// 为变更附加洞察，只能成功一次
    ///
    /// # 返回值
    ///
    /// * `Ok(Change)` - 附加洞察后的变更
    /// * `Err(LedgerError::AlreadyAnnotated)` - 变更已有洞察，原洞察保持不变
    pub async fn attach_insight(&self, id: Uuid, insight: &str) -> Result<Change, LedgerError> {
        let change = self.get(id).await?;
        if change.is_annotated() {
            return Err(LedgerError::AlreadyAnnotated(id));
        }

        // 条件写入：并发请求中只有一个能成功
        if !self.repository.attach_insight(id, insight).await? {
            return Err(LedgerError::AlreadyAnnotated(id));
        }

        Ok(Change {
            insight: Some(insight.to_string()),
            ..change
        })
    }

    /// 目标的全部变更，按检测时间倒序的惰性流
    pub fn list_by_target(&self, target_id: Uuid) -> BoxStream<'static, Result<Change, LedgerError>> {
        let repository = self.repository.clone();
        paged(DEFAULT_PAGE_SIZE, None, move |limit, offset| {
            let repository = repository.clone();
            async move {
                repository
                    .list_by_target(target_id, limit, offset)
                    .await
                    .map_err(LedgerError::from)
            }
        })
    }

    /// 最近的 `limit` 条变更，按检测时间倒序的惰性流
    pub fn list_recent(&self, limit: u64) -> BoxStream<'static, Result<Change, LedgerError>> {
        let repository = self.repository.clone();
        paged(DEFAULT_PAGE_SIZE, Some(limit), move |limit, offset| {
            let repository = repository.clone();
            async move {
                repository
                    .list_recent(limit, offset)
                    .await
                    .map_err(LedgerError::from)
            }
        })
    }

    /// 某时间之后的变更，按时间正序
    pub async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Change>, LedgerError> {
        Ok(self.repository.list_since(since).await?)
    }
}
