//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量获取函数的接口。

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;

/// 批量获取函数trait
///
/// 由调用方提供，批量加载器在每次刷新时调用一次
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// 批量获取键对应的值
    ///
    /// # 参数
    ///
    /// * `keys` - 按请求到达顺序排列的键列表，可能包含重复键
    ///
    /// # 返回值
    ///
    /// 返回与 `keys` 等长且顺序一一对应的值列表
    async fn load(&self, keys: Vec<K>) -> Result<Vec<V>>;
}

/// 基于闭包的批量获取函数，由 [`batch_fn`] 创建
#[derive(Clone)]
pub struct FnBatch<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnBatch<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBatch").finish_non_exhaustive()
    }
}

/// 将异步闭包包装为 [`BatchFn`]
///
/// ```
/// use kinderkit::loader::batch_fn;
///
/// let fetch = batch_fn(|ids: Vec<u32>| async move {
///     Ok::<_, kinderkit::KinderError>(ids.iter().map(|id| format!("student-{}", id)).collect())
/// });
/// # let _ = fetch;
/// ```
pub fn batch_fn<K, V, F, Fut>(f: F) -> FnBatch<F>
where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<V>>> + Send + 'static,
{
    FnBatch { f }
}

#[async_trait]
impl<K, V, F, Fut> BatchFn<K, V> for FnBatch<F>
where
    K: Send + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<V>>> + Send + 'static,
{
    async fn load(&self, keys: Vec<K>) -> Result<Vec<V>> {
        (self.f)(keys).await
    }
}
