//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 批量加载器集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, RecordingBatchFn};
use futures::FutureExt;
use kinderkit::config::LoaderConfig;
use kinderkit::error::KinderError;
use kinderkit::loader::{batch_fn, BatchLoader};
use kinderkit::metrics::GLOBAL_METRICS;
use std::time::Duration;

fn loader_with(batch: RecordingBatchFn, config: LoaderConfig) -> BatchLoader<u32, u32, RecordingBatchFn> {
    BatchLoader::new(batch, config)
}

/// 同一窗口内的请求合并为一次调用，键按调用顺序传入，结果按位置对应
#[tokio::test(start_paused = true)]
async fn test_batches_keys_in_call_order() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(batch.clone(), LoaderConfig::default());

    let (a, b, c) = tokio::join!(loader.load(3), loader.load(1), loader.load(2));

    assert_eq!(a.unwrap(), 30);
    assert_eq!(b.unwrap(), 10);
    assert_eq!(c.unwrap(), 20);
    assert_eq!(batch.calls(), vec![vec![3, 1, 2]]);
}

/// 超过批次上限的请求分多次刷新
#[tokio::test(start_paused = true)]
async fn test_splits_batches_over_max_size() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(
        batch.clone(),
        LoaderConfig {
            max_batch_size: 2,
            ..Default::default()
        },
    );

    let results = loader.load_many(vec![1, 2, 3, 4, 5]).await;

    let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![10, 20, 30, 40, 50]);
    assert_eq!(batch.calls(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

/// 缓存命中不调用批量函数且无需等待，清空缓存后重新进入批次
#[tokio::test(start_paused = true)]
async fn test_cache_short_circuit_and_clear() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(batch.clone(), LoaderConfig::default());

    assert_eq!(loader.load(7).await.unwrap(), 70);
    assert_eq!(loader.cached_len(), 1);

    let cached = loader.load(7).now_or_never();
    assert!(matches!(cached, Some(Ok(70))));
    assert_eq!(batch.calls().len(), 1);

    loader.clear_cache();
    assert_eq!(loader.cached_len(), 0);
    assert_eq!(loader.load(7).await.unwrap(), 70);
    assert_eq!(batch.calls().len(), 2);
}

/// 批量函数失败时整批请求收到同一错误，且不写缓存
#[tokio::test(start_paused = true)]
async fn test_batch_failure_rejects_every_request() {
    setup_logging();
    let batch = RecordingBatchFn::failing();
    let loader = loader_with(batch.clone(), LoaderConfig::default());

    let results = loader.load_many(vec![1, 2, 3]).await;

    assert_eq!(results.len(), 3);
    for result in results {
        match result {
            Err(KinderError::BatchFn(msg)) => assert_eq!(msg, "attendance store unavailable"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
    assert_eq!(loader.cached_len(), 0);
    assert_eq!(batch.calls().len(), 1);
}

/// 同一键的两次请求各自保留位置，只产生一次调用
#[tokio::test(start_paused = true)]
async fn test_duplicate_keys_resolved_positionally() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(batch.clone(), LoaderConfig::default());

    let (a, b) = tokio::join!(loader.load(5), loader.load(5));

    assert_eq!(a.unwrap(), 50);
    assert_eq!(b.unwrap(), 50);
    assert_eq!(batch.calls(), vec![vec![5, 5]]);
}

#[tokio::test(start_paused = true)]
async fn test_cache_disabled_always_batches() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(
        batch.clone(),
        LoaderConfig {
            cache_enabled: false,
            ..Default::default()
        },
    );

    assert_eq!(loader.load(1).await.unwrap(), 10);
    assert_eq!(loader.load(1).await.unwrap(), 10);

    assert_eq!(batch.calls(), vec![vec![1], vec![1]]);
    assert_eq!(loader.cached_len(), 0);
    assert!(!loader.prime(1, 99));
}

#[tokio::test(start_paused = true)]
async fn test_prime_seeds_cache() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(batch.clone(), LoaderConfig::default());

    assert!(loader.prime(4, 99));
    assert!(!loader.prime(4, 1));
    assert_eq!(loader.load(4).await.unwrap(), 99);
    assert!(batch.calls().is_empty());
}

/// 清空缓存不影响正在执行的批次
#[tokio::test(start_paused = true)]
async fn test_clear_cache_during_inflight_batch() {
    setup_logging();
    let loader: BatchLoader<u32, u32, _> = BatchLoader::new(
        batch_fn(|keys: Vec<u32>| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, KinderError>(keys.iter().map(|k| k + 100).collect::<Vec<u32>>())
        }),
        LoaderConfig::default(),
    );

    let inflight = loader.clone();
    let handle = tokio::spawn(async move { inflight.load(1).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    loader.clear_cache();

    assert_eq!(handle.await.unwrap().unwrap(), 101);
    assert_eq!(loader.cached_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loader_metrics_recorded() {
    setup_logging();
    let loader: BatchLoader<u32, u32, _> = BatchLoader::with_name(
        "guardian_lookup",
        RecordingBatchFn::new(),
        LoaderConfig::default(),
    );

    loader.load_many(vec![1, 2, 3]).await;
    loader.load(1).await.unwrap();

    assert_eq!(GLOBAL_METRICS.loader_count("guardian_lookup", "batch"), 1);
    assert_eq!(GLOBAL_METRICS.loader_count("guardian_lookup", "key"), 3);
    assert_eq!(GLOBAL_METRICS.loader_count("guardian_lookup", "cache_hit"), 1);
}

/// 窗口内稍后到达的请求加入已打开的批次，窗口关闭后到达的请求开启新批次
#[tokio::test(start_paused = true)]
async fn test_staggered_loads_within_delay_window() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(
        batch.clone(),
        LoaderConfig {
            batch_delay_ms: 10,
            ..Default::default()
        },
    );

    let first = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load(1).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load(2).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let third = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load(3).await }
    });

    assert_eq!(first.await.unwrap().unwrap(), 10);
    assert_eq!(second.await.unwrap().unwrap(), 20);
    assert_eq!(third.await.unwrap().unwrap(), 30);
    assert_eq!(batch.calls(), vec![vec![1, 2], vec![3]]);
}

/// 拆分后剩余的请求仍在等待时，新到达的请求并入剩余批次
#[tokio::test(start_paused = true)]
async fn test_late_load_joins_remainder_batch() {
    setup_logging();
    let batch = RecordingBatchFn::new();
    let loader = loader_with(
        batch.clone(),
        LoaderConfig {
            max_batch_size: 2,
            batch_delay_ms: 10,
            ..Default::default()
        },
    );

    let early = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load_many(vec![1, 2, 3]).await }
    });
    // t=10ms 刷新 [1, 2]，[3] 留到 t=20ms
    tokio::time::sleep(Duration::from_millis(15)).await;
    assert_eq!(loader.pending_len(), 1);
    let late = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load(4).await }
    });

    let values: Vec<u32> = early.await.unwrap().into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![10, 20, 30]);
    assert_eq!(late.await.unwrap().unwrap(), 40);
    assert_eq!(batch.calls(), vec![vec![1, 2], vec![3, 4]]);
}
