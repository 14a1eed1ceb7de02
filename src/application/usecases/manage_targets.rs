// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::target_request::{
    CreateTargetRequestDto, UpdateTargetRequestDto, DEFAULT_INTERVAL_SECS,
};
use crate::domain::models::snapshot::Snapshot;
use crate::domain::models::target::{ContentCategory, Target};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::snapshot_repository::SnapshotRepository;
use crate::domain::repositories::target_repository::TargetRepository;

// === Section: Errors ===

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Target {0} not found")]
    NotFound(Uuid),
    #[error("Validation error: {0}")]
    Validation(String),
    /// 存在关联变更，只能停用不能删除
    #[error("Target {0} is referenced by recorded changes; deactivate it instead")]
    Referenced(Uuid),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// === Section: Use Case Definition ===

/// 监控目标管理
///
/// 用户只能修改名称、平台、选择器、轮询间隔和启用状态，
/// 运行记录由调度流程维护。
pub struct ManageTargetsUseCase {
    targets: Arc<dyn TargetRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
}

// === Section: Implementation ===

impl ManageTargetsUseCase {
    pub fn new(targets: Arc<dyn TargetRepository>, snapshots: Arc<dyn SnapshotRepository>) -> Self {
        Self { targets, snapshots }
    }

    pub async fn create(&self, dto: CreateTargetRequestDto) -> Result<Target, TargetError> {
        dto.validate()
            .map_err(|e| TargetError::Validation(e.to_string()))?;

        let url = parse_http_url(&dto.url)?;
        let selector = normalize_selector(dto.selector);
        if dto.category == ContentCategory::Product && selector.is_none() {
            return Err(TargetError::Validation(
                "product targets need `field=selector` pairs".to_string(),
            ));
        }

        let mut target = Target::new(
            dto.name.trim().to_string(),
            url,
            dto.category,
            selector,
            dto.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS),
        );
        target.platform = dto.platform.filter(|p| !p.trim().is_empty());

        let created = self.targets.create(&target).await?;
        info!(target_id = %created.id, url = %created.url, "Target created");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        dto: UpdateTargetRequestDto,
    ) -> Result<Target, TargetError> {
        dto.validate()
            .map_err(|e| TargetError::Validation(e.to_string()))?;

        let mut target = self.get(id).await?;
        if let Some(name) = dto.name {
            target.name = name.trim().to_string();
        }
        if let Some(platform) = dto.platform {
            target.platform = Some(platform).filter(|p| !p.trim().is_empty());
        }
        if let Some(selector) = dto.selector {
            target.selector = normalize_selector(Some(selector));
            if target.category == ContentCategory::Product && target.selector.is_none() {
                return Err(TargetError::Validation(
                    "product targets need `field=selector` pairs".to_string(),
                ));
            }
        }
        if let Some(interval) = dto.interval_secs {
            target.interval_secs = interval;
        }
        if let Some(active) = dto.is_active {
            target.is_active = active;
        }

        Ok(self.targets.update(&target).await.map_err(|e| match e {
            RepositoryError::NotFound => TargetError::NotFound(id),
            other => other.into(),
        })?)
    }

    /// 软删除：停用目标，保留其变更与快照
    pub async fn deactivate(&self, id: Uuid) -> Result<Target, TargetError> {
        self.update(
            id,
            UpdateTargetRequestDto {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// 硬删除；存在关联变更时拒绝
    pub async fn delete(&self, id: Uuid) -> Result<(), TargetError> {
        match self.targets.delete(id).await {
            Ok(()) => {
                info!(target_id = %id, "Target deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(TargetError::NotFound(id)),
            Err(RepositoryError::Conflict(_)) => Err(TargetError::Referenced(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Target, TargetError> {
        self.targets
            .find_by_id(id)
            .await?
            .ok_or(TargetError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Target>, TargetError> {
        Ok(self.targets.list().await?)
    }

    /// 目标的当前快照（从未成功抓取时为 None）
    pub async fn current_snapshot(&self, id: Uuid) -> Result<Option<Snapshot>, TargetError> {
        self.get(id).await?;
        Ok(self.snapshots.find_current(id).await?)
    }

    /// 目标的历史快照，按时间倒序
    pub async fn snapshot_history(&self, id: Uuid, limit: u64) -> Result<Vec<Snapshot>, TargetError> {
        self.get(id).await?;
        Ok(self.snapshots.list_history(id, limit).await?)
    }
}

/// 只接受 http 与 https 地址
fn parse_http_url(raw: &str) -> Result<String, TargetError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| TargetError::Validation(format!("url: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(TargetError::Validation(format!(
            "url: unsupported scheme `{}`",
            other
        ))),
    }
}

fn normalize_selector(selector: Option<String>) -> Option<String> {
    selector
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
