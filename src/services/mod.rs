//! 业务能力层（Services）
//!
//! - `DataFormatter` - 把题库图片统一到目标尺寸与编码
//! - `ImgReshaper` - 单张图片的缩放
//! - `BatchRequestMaker` - 把题库转换为批量请求
//! - `supported_models` - 已知批量接口与模型表

pub mod batch_request_maker;
pub mod data_formatter;
pub mod image_reshaper;
pub mod supported_models;

pub use batch_request_maker::{BatchRequestMaker, DEFAULT_CUSTOM_ID_PREFIX};
pub use data_formatter::DataFormatter;
pub use image_reshaper::ImgReshaper;
