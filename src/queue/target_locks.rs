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

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// 按目标划分的互斥锁
///
/// 为每个目标提供一个独立的异步互斥锁。调度器用它串行化同一目标的
/// "检查在途任务 + 入队"，工作器用另一组实例串行化同一目标的
/// "提取 + 比较 + 持久化"。没有持有者和等待者的锁在释放时移除。
#[derive(Clone, Debug, Default)]
pub struct TargetLocks {
    /// 存储每个目标的锁
    locks: Arc<LockMap>,
}

/// 目标锁守卫，释放时解锁并在无人等待时移除该目标的锁
#[derive(Debug)]
pub struct TargetGuard {
    target_id: Uuid,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.guard.take();
        // 等待者持有锁的克隆，计数为 1 时只剩映射自身的引用
        self.locks
            .remove_if(&self.target_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定目标的锁，守卫释放时解锁
    pub async fn acquire(&self, target_id: Uuid) -> TargetGuard {
        let guard = self.get_or_create(target_id).lock_owned().await;
        TargetGuard {
            target_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// 当前登记的目标锁数量
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// 获取或创建指定目标的锁
    fn get_or_create(&self, target_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(target_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
