//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量加载器，在合并窗口内收集单键请求并一次性交给批量获取函数。

use super::batch_fn::BatchFn;
use crate::config::LoaderConfig;
use crate::error::{KinderError, Result};
use crate::metrics::GLOBAL_METRICS;

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// 等待批次执行的请求
struct PendingRequest<K, V> {
    key: K,
    responder: oneshot::Sender<Result<V>>,
}

/// 当前打开的批次
struct LoaderState<K, V> {
    /// 按到达顺序排列的等待请求
    pending: Vec<PendingRequest<K, V>>,
    /// 已调度的刷新任务，存在时不再调度新的定时器
    flush_handle: Option<JoinHandle<()>>,
}

struct LoaderInner<K, V, F> {
    name: String,
    batch_fn: F,
    config: LoaderConfig,
    state: Mutex<LoaderState<K, V>>,
    cache: DashMap<K, V>,
}

/// 批量加载器
///
/// 将 `batch_delay_ms` 内到达的 `load` 请求合并为一次 `BatchFn` 调用，
/// 每次最多携带 `max_batch_size` 个键；启用缓存时，成功解析的值按键缓存，
/// 直到调用 [`clear_cache`](Self::clear_cache)。
///
/// 克隆代价很低，所有克隆共享同一批次与缓存。
pub struct BatchLoader<K, V, F> {
    inner: Arc<LoaderInner<K, V, F>>,
}

impl<K, V, F> Clone for BatchLoader<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash, V, F> std::fmt::Debug for BatchLoader<K, V, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

impl<K, V, F> BatchLoader<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    /// 创建新的批量加载器
    ///
    /// # 参数
    ///
    /// * `batch_fn` - 批量获取函数
    /// * `config` - 加载器配置
    pub fn new(batch_fn: F, config: LoaderConfig) -> Self {
        Self::with_name("default", batch_fn, config)
    }

    /// 创建带名称的批量加载器，名称用于日志和指标
    pub fn with_name(name: impl Into<String>, batch_fn: F, mut config: LoaderConfig) -> Self {
        // 批次上限为0时刷新永远取不出请求
        config.max_batch_size = config.max_batch_size.max(1);
        Self {
            inner: Arc::new(LoaderInner {
                name: name.into(),
                batch_fn,
                config,
                state: Mutex::new(LoaderState {
                    pending: Vec::new(),
                    flush_handle: None,
                }),
                cache: DashMap::new(),
            }),
        }
    }

    /// 加载单个键
    ///
    /// 缓存命中时直接返回，不进入批次；否则加入当前批次，
    /// 并在批次执行后返回与该请求位置对应的值。
    ///
    /// 请求在返回的 future 首次被 poll 时才入队，批次内的键顺序是 poll 顺序，
    /// 而不是 `load` 的调用顺序。
    ///
    /// # 返回值
    ///
    /// * `Ok(V)` - 批量获取函数返回的对应值
    /// * `Err(KinderError)` - 所在批次失败时的同一个错误
    #[instrument(skip(self, key), level = "debug", fields(loader = %self.inner.name))]
    pub async fn load(&self, key: K) -> Result<V> {
        if self.inner.config.cache_enabled {
            if let Some(value) = self.inner.cache.get(&key) {
                GLOBAL_METRICS.record_loader(&self.inner.name, "cache_hit", 1);
                return Ok(value.value().clone());
            }
        }

        let receiver = self.enqueue(key);
        receiver
            .await
            .unwrap_or_else(|_| Err(KinderError::Canceled))
    }

    /// 并发加载多个键，结果顺序与输入一致
    ///
    /// 所有键在同一轮中入队，因此会落入同一个批次（超过批次上限时拆分）
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<Result<V>> {
        futures::future::join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// 预先写入缓存
    ///
    /// 键已存在或缓存未启用时不写入
    ///
    /// # 返回值
    ///
    /// 返回是否写入了缓存
    pub fn prime(&self, key: K, value: V) -> bool {
        if !self.inner.config.cache_enabled {
            return false;
        }
        match self.inner.cache.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// 清空缓存
    ///
    /// 不影响正在执行的批次，它们完成后仍会写入缓存
    pub fn clear_cache(&self) {
        let cleared = self.inner.cache.len();
        self.inner.cache.clear();
        debug!("loader {} 清空缓存，共 {} 项", self.inner.name, cleared);
    }

    /// 当前缓存的条目数
    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// 当前打开批次中等待的请求数
    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// 加载器名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn enqueue(&self, key: K) -> oneshot::Receiver<Result<V>> {
        let (responder, receiver) = oneshot::channel();
        let mut state = self.inner.lock_state();
        state.pending.push(PendingRequest { key, responder });
        if state.flush_handle.is_none() {
            state.flush_handle = Some(LoaderInner::schedule_flush(&self.inner));
        }
        receiver
    }
}

impl<K, V, F> LoaderInner<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    fn lock_state(&self) -> MutexGuard<'_, LoaderState<K, V>> {
        // 锁内不会 panic，中毒时直接沿用内部状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 在 `batch_delay_ms` 后执行一次刷新
    ///
    /// 调用方必须持有状态锁并保存返回的句柄
    fn schedule_flush(inner: &Arc<Self>) -> JoinHandle<()> {
        let inner = Arc::clone(inner);
        let delay = Duration::from_millis(inner.config.batch_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush().await;
        })
    }

    /// 刷新当前批次
    ///
    /// 在锁内取出最多 `max_batch_size` 个请求，之后到达的请求进入新批次；
    /// 剩余请求由新调度的刷新处理。
    async fn flush(self: Arc<Self>) {
        let batch: Vec<PendingRequest<K, V>> = {
            let mut state = self.lock_state();
            let take = state.pending.len().min(self.config.max_batch_size);
            let batch = state.pending.drain(..take).collect();
            state.flush_handle = if state.pending.is_empty() {
                None
            } else {
                Some(Self::schedule_flush(&self))
            };
            batch
        };

        if batch.is_empty() {
            debug!("loader {} 批次为空，跳过刷新", self.name);
            return;
        }

        let (keys, responders): (Vec<K>, Vec<oneshot::Sender<Result<V>>>) = batch
            .into_iter()
            .map(|request| (request.key, request.responder))
            .unzip();
        let expected = keys.len();
        let cache_keys = self.config.cache_enabled.then(|| keys.clone());

        GLOBAL_METRICS.record_loader(&self.name, "batch", 1);
        GLOBAL_METRICS.record_loader(&self.name, "key", expected as u64);
        debug!("loader {} 刷新批次，共 {} 个键", self.name, expected);

        let values = match self.batch_fn.load(keys).await {
            Ok(values) if values.len() == expected => values,
            Ok(values) => {
                let error = KinderError::BatchLengthMismatch {
                    expected,
                    actual: values.len(),
                };
                self.reject_all(responders, error);
                return;
            }
            Err(error) => {
                self.reject_all(responders, error);
                return;
            }
        };

        if let Some(cache_keys) = cache_keys {
            for (key, value) in cache_keys.into_iter().zip(values.iter()) {
                self.cache.insert(key, value.clone());
            }
        }

        for (responder, value) in responders.into_iter().zip(values) {
            // 接收方已放弃等待时忽略
            let _ = responder.send(Ok(value));
        }
    }

    fn reject_all(&self, responders: Vec<oneshot::Sender<Result<V>>>, error: KinderError) {
        warn!(
            "loader {} 批量获取失败，拒绝 {} 个请求: {}",
            self.name,
            responders.len(),
            error
        );
        GLOBAL_METRICS.record_loader(&self.name, "failure", 1);
        for responder in responders {
            let _ = responder.send(Err(error.clone()));
        }
    }
}
