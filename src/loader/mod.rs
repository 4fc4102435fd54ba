//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并批量加载器，将短时间窗口内的单键查询合并为一次批量获取。

pub mod batch_fn;
pub mod batch_loader;

pub use batch_fn::{batch_fn, BatchFn, FnBatch};
pub use batch_loader::BatchLoader;
