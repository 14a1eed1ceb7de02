// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务队列、按目标的准入锁和调度功能
pub mod job_queue;
pub mod scheduler;
pub mod target_locks;
