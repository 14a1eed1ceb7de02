// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 抓取任务实体
///
/// 一次"抓取-比较-持久化"周期的可重放描述。任务由调度器创建，
/// 由抓取工作器推进；终止状态一旦到达便不可再变更。
/// 任务不是业务状态的事实来源，快照与变更记录才是。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 目标ID
    pub target_id: Uuid,
    /// 任务状态
    pub status: JobStatus,
    /// 执行阶段，仅用于观测
    pub stage: JobStage,
    /// 粗粒度进度百分比
    pub progress: i32,
    /// 本任务内已进行的抓取尝试次数
    pub attempt_count: i32,
    /// 失败类别
    pub failure_kind: Option<FailureKind>,
    /// 人类可读的失败原因
    pub failure_reason: Option<String>,
    /// 本次运行检测到的变更数量
    pub changes_detected: i32,
    /// 认领该任务的工作器
    pub worker_id: Option<Uuid>,
    /// 入队时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成或失败时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 任务状态枚举
///
/// 状态转换单调：Waiting → Active → Completed/Failed。
/// 取消与启动恢复会把任务直接置为 Failed，不会回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已入队，等待工作器认领
    #[default]
    Waiting,
    /// 执行中
    Active,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
}

impl JobStatus {
    /// 是否处于在途状态（等待或执行中）
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Waiting | JobStatus::Active)
    }

    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 执行阶段
///
/// 阶段只向前推进，每个阶段边界上报一次进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Admitted,
    Extracting,
    Diffing,
    Persisting,
    Done,
}

impl JobStage {
    /// 阶段对应的进度百分比
    pub fn progress(&self) -> i32 {
        match self {
            JobStage::Admitted => 0,
            JobStage::Extracting => 10,
            JobStage::Diffing => 50,
            JobStage::Persisting => 75,
            JobStage::Done => 100,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStage::Admitted => write!(f, "admitted"),
            JobStage::Extracting => write!(f, "extracting"),
            JobStage::Diffing => write!(f, "diffing"),
            JobStage::Persisting => write!(f, "persisting"),
            JobStage::Done => write!(f, "done"),
        }
    }
}

impl FromStr for JobStage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admitted" => Ok(JobStage::Admitted),
            "extracting" => Ok(JobStage::Extracting),
            "diffing" => Ok(JobStage::Diffing),
            "persisting" => Ok(JobStage::Persisting),
            "done" => Ok(JobStage::Done),
            _ => Err(()),
        }
    }
}

/// 任务失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 抓取失败，重试次数耗尽
    FetchError,
    /// 提取失败，不重试
    ExtractionError,
    /// 超过任务截止时间
    Timeout,
    /// 持久化失败
    StoreError,
    /// 在进入提取阶段之前被取消
    Cancelled,
    /// 进程退出时仍在执行，启动时被回收
    Interrupted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureKind::FetchError => write!(f, "fetch_error"),
            FailureKind::ExtractionError => write!(f, "extraction_error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::StoreError => write!(f, "store_error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl FromStr for FailureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch_error" => Ok(FailureKind::FetchError),
            "extraction_error" => Ok(FailureKind::ExtractionError),
            "timeout" => Ok(FailureKind::Timeout),
            "store_error" => Ok(FailureKind::StoreError),
            "cancelled" => Ok(FailureKind::Cancelled),
            "interrupted" => Ok(FailureKind::Interrupted),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    fn transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        DomainError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl Job {
    /// 为目标创建一个等待中的任务
    pub fn new(target_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            target_id,
            status: JobStatus::Waiting,
            stage: JobStage::Admitted,
            progress: 0,
            attempt_count: 0,
            failure_kind: None,
            failure_reason: None,
            changes_detected: 0,
            worker_id: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    /// 启动任务
    ///
    /// 将任务状态从 Waiting 变更为 Active
    pub fn start(mut self, worker_id: Uuid) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Waiting => {
                let now = Utc::now();
                self.status = JobStatus::Active;
                self.worker_id = Some(worker_id);
                self.started_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, JobStatus::Active)),
        }
    }

    /// 推进执行阶段
    ///
    /// 只允许在 Active 状态下向前推进，不允许停留或回退
    pub fn advance(mut self, stage: JobStage) -> Result<Self, DomainError> {
        if self.status != JobStatus::Active || stage <= self.stage || stage == JobStage::Done {
            return Err(DomainError::transition(self.stage, stage));
        }
        self.stage = stage;
        self.progress = stage.progress();
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// 完成任务
    ///
    /// 将任务状态从 Active 变更为 Completed
    pub fn complete(mut self, changes_detected: usize) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Active => {
                let now = Utc::now();
                self.status = JobStatus::Completed;
                self.stage = JobStage::Done;
                self.progress = JobStage::Done.progress();
                self.changes_detected = changes_detected as i32;
                self.finished_at = Some(now);
                self.updated_at = now;
                Ok(self)
            }
            other => Err(DomainError::transition(other, JobStatus::Completed)),
        }
    }

    /// 标记任务失败
    ///
    /// 在途任务（Waiting 或 Active）均可失败，终止状态不可再变更
    pub fn fail(mut self, kind: FailureKind, reason: impl Into<String>) -> Result<Self, DomainError> {
        if !self.status.is_in_flight() {
            return Err(DomainError::transition(self.status, JobStatus::Failed));
        }
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.failure_kind = Some(kind);
        self.failure_reason = Some(reason.into());
        self.finished_at = Some(now);
        self.updated_at = now;
        Ok(self)
    }

    /// 判断任务当前是否还能被取消
    ///
    /// 进入提取阶段之后的任务必须运行到完成或失败
    pub fn is_cancellable(&self) -> bool {
        match self.status {
            JobStatus::Waiting => true,
            JobStatus::Active => self.stage == JobStage::Admitted,
            _ => false,
        }
    }
}
