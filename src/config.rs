use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{DataFormat, FailurePolicy, PromptTemplate, ResizePolicy};
use crate::services::DEFAULT_CUSTOM_ID_PREFIX;

/// 默认提示词
const DEFAULT_PROMPT: &str = "请根据以下驾考题目及配图，为题目标注考点标签和关键词。\n\n{{question_json}}";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 原始题库 ---
    /// 原始题库元数据文件
    pub raw_metadata_path: PathBuf,
    /// 原始图片目录
    pub raw_img_dir: PathBuf,
    // --- 格式化题库 ---
    pub formatted_metadata_path: PathBuf,
    pub formatted_img_dir: PathBuf,
    // --- 数据格式 ---
    pub image_width: u32,
    pub image_height: u32,
    pub input_extension: String,
    pub output_extension: String,
    pub resize_policy: ResizePolicy,
    // --- 提示词 ---
    /// 提示词文本，设置了 `prompt_file` 时被文件内容替代
    pub prompt: String,
    pub prompt_file: Option<PathBuf>,
    pub system_prompt: Option<String>,
    // --- 批量请求 ---
    pub endpoint_url: String,
    pub model_name: String,
    pub custom_id_prefix: String,
    pub failure_policy: FailurePolicy,
    /// 输出的 JSONL 文件
    pub output_jsonl_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_metadata_path: PathBuf::from("data/raw/metadata.json"),
            raw_img_dir: PathBuf::from("data/raw/images"),
            formatted_metadata_path: PathBuf::from("data/formatted/metadata.json"),
            formatted_img_dir: PathBuf::from("data/formatted/images"),
            image_width: 256,
            image_height: 256,
            input_extension: "jpg".to_string(),
            output_extension: "jpg".to_string(),
            resize_policy: ResizePolicy::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            prompt_file: None,
            system_prompt: None,
            endpoint_url: "/v1/chat/completions".to_string(),
            model_name: "qwen-vl-max".to_string(),
            custom_id_prefix: DEFAULT_CUSTOM_ID_PREFIX.to_string(),
            failure_policy: FailurePolicy::default(),
            output_jsonl_path: PathBuf::from("output/batch_requests.jsonl"),
        }
    }
}

impl Config {
    /// 默认配置叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，未出现的字段取默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 用 `QB_*` 环境变量覆盖配置，解析失败时保留原值
    pub fn with_env_overrides(self) -> Self {
        Self {
            raw_metadata_path: env_or("QB_RAW_METADATA_PATH", self.raw_metadata_path),
            raw_img_dir: env_or("QB_RAW_IMG_DIR", self.raw_img_dir),
            formatted_metadata_path: env_or(
                "QB_FORMATTED_METADATA_PATH",
                self.formatted_metadata_path,
            ),
            formatted_img_dir: env_or("QB_FORMATTED_IMG_DIR", self.formatted_img_dir),
            image_width: env_or("QB_IMAGE_WIDTH", self.image_width),
            image_height: env_or("QB_IMAGE_HEIGHT", self.image_height),
            input_extension: env_or("QB_INPUT_EXTENSION", self.input_extension),
            output_extension: env_or("QB_OUTPUT_EXTENSION", self.output_extension),
            resize_policy: env_enum_or("QB_RESIZE_POLICY", self.resize_policy),
            prompt: env_or("QB_PROMPT", self.prompt),
            prompt_file: std::env::var("QB_PROMPT_FILE")
                .ok()
                .map(PathBuf::from)
                .or(self.prompt_file),
            system_prompt: std::env::var("QB_SYSTEM_PROMPT").ok().or(self.system_prompt),
            endpoint_url: env_or("QB_ENDPOINT_URL", self.endpoint_url),
            model_name: env_or("QB_MODEL_NAME", self.model_name),
            custom_id_prefix: env_or("QB_CUSTOM_ID_PREFIX", self.custom_id_prefix),
            failure_policy: env_enum_or("QB_FAILURE_POLICY", self.failure_policy),
            output_jsonl_path: env_or("QB_OUTPUT_JSONL_PATH", self.output_jsonl_path),
        }
    }

    /// 校验后的数据格式
    pub fn data_format(&self) -> Result<DataFormat, ConfigError> {
        Ok(DataFormat::new(
            (self.image_width, self.image_height),
            &self.input_extension,
            &self.output_extension,
        )?
        .with_resize_policy(self.resize_policy))
    }

    /// 校验后的提示词模板，`prompt_file` 优先于 `prompt`
    pub async fn prompt(&self) -> Result<PromptTemplate, ConfigError> {
        let user = match &self.prompt_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadFailed {
                    path: path.clone(),
                    source,
                })?,
            None => self.prompt.clone(),
        };

        let template = PromptTemplate::new(user)?;
        Ok(match &self.system_prompt {
            Some(system) => template.with_system(system.as_str()),
            None => template,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_enum_or<T: DeserializeOwned>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| serde_json::from_value(serde_json::Value::String(v)).ok())
        .unwrap_or(default)
}
