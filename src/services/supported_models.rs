//! 已知的批量接口及其可用模型

use phf::phf_map;

/// 批量接口路径 -> 可用模型
pub static ENDPOINT_MODELS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "/v1/chat/completions" => &[
        "deepseek-r1",
        "deepseek-v3",
        "qwen-long",
        "qwen-long-latest",
        "qwen-max",
        "qwen-max-latest",
        "qwen-plus",
        "qwen-plus-latest",
        "qwen-turbo",
        "qwen-turbo-latest",
        "qwq-32b-preview",
        "qwq-plus",
        "qwen-vl-max",
        "qwen-vl-max-latest",
        "qwen-vl-plus",
        "qwen-omni-turbo",
    ],
    "/v1/chat/ds-test" => &["batch-test-model"],
};

/// 接口与模型的匹配情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSupport {
    Supported,
    UnknownEndpoint,
    UnknownModel,
}

/// 检查模型是否是该接口已知的模型
pub fn check(endpoint_url: &str, model_name: &str) -> ModelSupport {
    match ENDPOINT_MODELS.get(endpoint_url) {
        None => ModelSupport::UnknownEndpoint,
        Some(models) if models.contains(&model_name) => ModelSupport::Supported,
        Some(_) => ModelSupport::UnknownModel,
    }
}
