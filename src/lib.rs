//! # qb_labeler
//!
//! 把驾考题库（题目 + 配图）整理成视觉语言模型打标用的批量请求文件
//!
//! ## 架构设计
//!
//! ### ① 数据模型（Models）
//! - `Question` / `QuestionBank` - 题目与题库，按题号有序遍历
//! - `DataFormat` / `ImageCodec` / `ResizePolicy` - 不可变的格式配置
//! - `PromptTemplate` - 提示词模板，支持逐题占位符
//! - `BatchRequest` - 有序、不可变的请求记录，可写出为 JSONL
//!
//! ### ② 基础设施层（Infrastructure）
//! - `LocalStore` - 元数据 JSON + 图片目录的读写
//!
//! ### ③ 业务能力层（Services）
//! - `DataFormatter` - 图片统一尺寸与编码
//! - `BatchRequestMaker` - 逐题构建 chat-completions 请求
//!
//! ### ④ 编排层（Orchestration）
//! - `App` - 读取 → 格式化 → 保存 → 校验 → 构建请求 → 写出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{load_question_bank, LocalStore};
pub use logger::{PipelineLogger, RecordingLogger, TracingLogger};
pub use models::{
    BatchRequest, BatchRequestRecord, DataFormat, FailurePolicy, ImageCodec, PromptTemplate,
    Question, QuestionBank, ResizePolicy,
};
pub use orchestrator::App;
pub use services::{BatchRequestMaker, DataFormatter};
