//! 编排层（Orchestration Layer）
//!
//! 只做调度和统计，不做具体业务判断：
//!
//! ```text
//! App::run
//!     ↓
//! infrastructure::LocalStore (读取 / 保存题库)
//!     ↓
//! services::DataFormatter → services::BatchRequestMaker
//!     ↓
//! models::BatchRequest::to_jsonl_file
//! ```

pub mod pipeline;

pub use pipeline::App;
