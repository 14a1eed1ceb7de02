// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 50;

struct Cursor<F> {
    fetch: Arc<F>,
    offset: u64,
    remaining: Option<u64>,
    exhausted: bool,
}

/// 把 `(limit, offset)` 分页查询包装成惰性、有限的流
///
/// 只有在被轮询时才发起查询；某一页不足 `page_size` 条或达到 `limit` 后结束。
/// 每次调用都返回一个从头开始的新流。
pub fn paged<T, E, F, Fut>(
    page_size: u64,
    limit: Option<u64>,
    fetch: F,
) -> BoxStream<'static, Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(u64, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
{
    let page_size = page_size.max(1);
    let cursor = Cursor {
        fetch: Arc::new(fetch),
        offset: 0,
        remaining: limit,
        exhausted: false,
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        if cursor.exhausted || cursor.remaining == Some(0) {
            return Ok(None);
        }
        let size = cursor.remaining.map_or(page_size, |r| r.min(page_size));
        let page = (cursor.fetch)(size, cursor.offset).await?;
        let fetched = page.len() as u64;
        if fetched == 0 {
            return Ok(None);
        }

        cursor.exhausted = fetched < size;
        cursor.offset += fetched;
        cursor.remaining = cursor.remaining.map(|r| r.saturating_sub(fetched));

        Ok(Some((stream::iter(page.into_iter().map(Ok::<T, E>)), cursor)))
    })
    .try_flatten()
    .boxed()
}
