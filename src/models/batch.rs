//! 批量请求
//!
//! 一条 [`BatchRequestRecord`] 对应批量文件中的一行，
//! 结构与 chat-completions 批量接口一致：
//!
//! ```text
//! {"custom_id": "...", "method": "POST", "url": "/v1/chat/completions",
//!  "body": {"model": "...", "messages": [...]}}
//! ```

use std::path::{Path, PathBuf};

use async_openai::types::chat::CreateChatCompletionRequest;
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::error::StorageError;

/// 批量请求的 HTTP 方法
pub const REQUEST_METHOD: &str = "POST";

/// 批量文件中的一条请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequestRecord {
    custom_id: String,
    method: &'static str,
    url: String,
    body: CreateChatCompletionRequest,
}

impl BatchRequestRecord {
    pub fn new(
        custom_id: impl Into<String>,
        url: impl Into<String>,
        body: CreateChatCompletionRequest,
    ) -> Self {
        Self {
            custom_id: custom_id.into(),
            method: REQUEST_METHOD,
            url: url.into(),
            body,
        }
    }

    /// 关联 ID，用于把响应对应回题目
    pub fn custom_id(&self) -> &str {
        &self.custom_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.body.model
    }

    pub fn body(&self) -> &CreateChatCompletionRequest {
        &self.body
    }

    /// 序列化为单行 JSON
    pub fn to_json_line(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 按题库顺序排列的批量请求，构建后不可变
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchRequest {
    records: Vec<BatchRequestRecord>,
}

impl BatchRequest {
    pub(crate) fn new(records: Vec<BatchRequestRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BatchRequestRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchRequestRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn custom_ids(&self) -> Vec<&str> {
        self.records.iter().map(BatchRequestRecord::custom_id).collect()
    }

    /// 转换为 JSONL 文本：每条请求一行，每行以换行结尾
    pub fn to_jsonl_string(&self) -> Result<String, StorageError> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.to_json_line()?);
            out.push('\n');
        }
        Ok(out)
    }

    /// 写入 JSONL 文件，覆盖已有文件
    ///
    /// 先写临时文件再重命名，失败时不会留下半截的批量文件。
    pub async fn to_jsonl_file(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let content = self.to_jsonl_string()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::write_failed(parent, e))?;
        }

        let tmp = temp_path(path);
        fs::write(&tmp, content.as_bytes())
            .await
            .map_err(|e| StorageError::write_failed(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::write_failed(path, e));
        }

        info!("✓ 批量请求已写入 {} ({} 行)", path.display(), self.records.len());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a BatchRequest {
    type Item = &'a BatchRequestRecord;
    type IntoIter = std::slice::Iter<'a, BatchRequestRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 同目录下的临时文件路径
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    };

    fn record(id: &str) -> BatchRequestRecord {
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(format!("标注 {}", id))
            .build()
            .unwrap();
        let body = CreateChatCompletionRequestArgs::default()
            .model("qwen-vl-max")
            .messages(vec![ChatCompletionRequestMessage::User(user)])
            .build()
            .unwrap();
        BatchRequestRecord::new(format!("qb-{}", id), "/v1/chat/completions", body)
    }

    #[test]
    fn test_record_json_shape() {
        let value: serde_json::Value =
            serde_json::from_str(&record("q1").to_json_line().unwrap()).unwrap();
        assert_eq!(value["custom_id"], "qb-q1");
        assert_eq!(value["method"], "POST");
        assert_eq!(value["url"], "/v1/chat/completions");
        assert_eq!(value["body"]["model"], "qwen-vl-max");
        assert_eq!(value["body"]["messages"][0]["role"], "user");
    }

    #[test]
    fn test_jsonl_string_one_line_per_record() {
        let batch = BatchRequest::new(vec![record("a"), record("b"), record("c")]);
        let text = batch.to_jsonl_string().unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with('\n'));
        assert!(!text.contains("\n\n"));
        assert_eq!(batch.custom_ids(), vec!["qb-a", "qb-b", "qb-c"]);
    }

    #[tokio::test]
    async fn test_to_jsonl_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("batch.jsonl");

        BatchRequest::new(vec![record("a"), record("b"), record("c")])
            .to_jsonl_file(&path)
            .await
            .unwrap();
        BatchRequest::new(vec![record("x")])
            .to_jsonl_file(&path)
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("qb-x"));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_empty_batch_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        BatchRequest::default().to_jsonl_file(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
