//! 日志
//!
//! - [`init`] 在程序入口初始化 `tracing` 订阅者（读取 `RUST_LOG`，默认 `info`）
//! - [`PipelineLogger`] 是显式注入到各组件的日志接口，组件内部不依赖全局日志配置

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅者，重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 注入式日志接口
///
/// 实现方不得 panic，也不返回错误：日志失败不能中断批量请求的构建。
pub trait PipelineLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<T: PipelineLogger + ?Sized> PipelineLogger for Arc<T> {
    fn log(&self, level: Level, message: &str) {
        (**self).log(level, message)
    }
}

/// 转发到 `tracing` 的日志实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PipelineLogger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        }
    }
}

/// 把日志记录在内存中的实现
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的全部日志
    pub fn entries(&self) -> Vec<(Level, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 某个级别的日志条数
    pub fn count(&self, level: Level) -> usize {
        self.entries().iter().filter(|(l, _)| *l == level).count()
    }

    /// 某个级别下包含指定文本的日志是否存在
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl PipelineLogger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        // 锁中毒时丢弃这条日志
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}
