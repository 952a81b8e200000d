//! 批量请求构建服务 - 业务能力层
//!
//! 把题库中的每道题转换为一条 chat-completions 请求：
//! - 系统消息（可选）：提示词模板中的系统提示词
//! - 用户消息：渲染后的提示词文本 + 按顺序内联的每张图片（base64 data URL）

use std::sync::Arc;

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
    ImageUrl,
};
use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use tokio::fs;
use tracing::Level;

use crate::error::{AppResult, RequestBuildError};
use crate::logger::PipelineLogger;
use crate::models::{
    BatchRequest, BatchRequestRecord, FailurePolicy, ImageCodec, PromptTemplate, Question,
    QuestionBank,
};
use crate::services::supported_models::{self, ModelSupport};
use crate::utils::truncate_text;

/// 默认关联 ID 前缀
pub const DEFAULT_CUSTOM_ID_PREFIX: &str = "qb-";

/// 每处理多少道题输出一次进度
const PROGRESS_INTERVAL: usize = 100;

/// 批量请求构建器
pub struct BatchRequestMaker<'a> {
    question_bank: &'a QuestionBank,
    prompt: PromptTemplate,
    endpoint_url: String,
    model_name: String,
    logger: Arc<dyn PipelineLogger>,
    custom_id_prefix: String,
    failure_policy: FailurePolicy,
}

impl<'a> BatchRequestMaker<'a> {
    /// 创建构建器
    ///
    /// 接口与模型不在已知列表中时只记录警告，不会拒绝。
    pub fn new(
        question_bank: &'a QuestionBank,
        prompt: PromptTemplate,
        endpoint_url: impl Into<String>,
        model_name: impl Into<String>,
        logger: Arc<dyn PipelineLogger>,
    ) -> Self {
        let endpoint_url = endpoint_url.into();
        let model_name = model_name.into();

        match supported_models::check(&endpoint_url, &model_name) {
            ModelSupport::Supported => {}
            ModelSupport::UnknownEndpoint => logger.log(
                Level::WARN,
                &format!("⚠️ 未知的批量接口: {}", endpoint_url),
            ),
            ModelSupport::UnknownModel => logger.log(
                Level::WARN,
                &format!("⚠️ 模型 {} 不在接口 {} 的已知列表中", model_name, endpoint_url),
            ),
        }

        Self {
            question_bank,
            prompt,
            endpoint_url,
            model_name,
            logger,
            custom_id_prefix: DEFAULT_CUSTOM_ID_PREFIX.to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_custom_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.custom_id_prefix = prefix.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// 题目对应的关联 ID
    pub fn custom_id(&self, question: &Question) -> String {
        format!("{}{}", self.custom_id_prefix, question.qid())
    }

    /// 按题库顺序为每道题构建一条请求
    pub async fn make_batch_request(&self) -> AppResult<BatchRequest> {
        let total = self.question_bank.question_count();
        self.logger.log(
            Level::INFO,
            &format!("开始构建批量请求，共 {} 道题", total),
        );

        let mut records = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (idx, question) in self.question_bank.iter().enumerate() {
            self.logger.log(
                Level::DEBUG,
                &format!(
                    "处理题目 {} ({} 张图片): {}",
                    question.qid(),
                    question.image_refs().len(),
                    truncate_text(question.question(), 40)
                ),
            );

            match self.make_request(question).await {
                Ok(record) => records.push(record),
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailFast => {
                        self.logger
                            .log(Level::ERROR, &format!("❌ 构建请求失败: {}", e));
                        return Err(e.into());
                    }
                    FailurePolicy::SkipAndLog => {
                        self.logger
                            .log(Level::WARN, &format!("⚠️ 跳过题目: {}", e));
                        skipped.push(question.qid().to_string());
                    }
                },
            }

            let processed = idx + 1;
            if processed % PROGRESS_INTERVAL == 0 {
                self.logger.log(
                    Level::INFO,
                    &format!("已处理 {}/{} 道题", processed, total),
                );
            }
        }

        let summary = if skipped.is_empty() {
            format!("✓ 批量请求构建完成: 共 {} 条请求", records.len())
        } else {
            format!(
                "✓ 批量请求构建完成: 共 {} 条请求, 跳过 {} 道题: {}",
                records.len(),
                skipped.len(),
                skipped.join(", ")
            )
        };
        self.logger.log(Level::INFO, &summary);

        Ok(BatchRequest::new(records))
    }

    /// 为单道题构建请求
    pub async fn make_request(
        &self,
        question: &Question,
    ) -> Result<BatchRequestRecord, RequestBuildError> {
        let qid = question.qid();
        let invalid_body = |e: async_openai::error::OpenAIError| RequestBuildError::InvalidBody {
            qid: qid.to_string(),
            reason: e.to_string(),
        };

        let text = self.prompt.render(question, self.question_bank)?;
        let mut parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text },
        )];
        for image_ref in question.image_refs() {
            let url = self.image_data_url(question, image_ref).await?;
            parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url,
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.prompt.system() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(invalid_body)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(parts))
            .build()
            .map_err(invalid_body)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let body = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .build()
            .map_err(invalid_body)?;

        Ok(BatchRequestRecord::new(
            self.custom_id(question),
            &self.endpoint_url,
            body,
        ))
    }

    /// 读取图片并编码为 base64 data URL
    async fn image_data_url(
        &self,
        question: &Question,
        image_ref: &str,
    ) -> Result<String, RequestBuildError> {
        let path = self.question_bank.image_path(image_ref);
        let codec =
            ImageCodec::from_path(&path).ok_or_else(|| RequestBuildError::UnsupportedImage {
                qid: question.qid().to_string(),
                path: path.clone(),
            })?;

        let bytes = fs::read(&path)
            .await
            .map_err(|source| RequestBuildError::ImageUnreadable {
                qid: question.qid().to_string(),
                path: path.clone(),
                source,
            })?;

        Ok(format!(
            "data:{};base64,{}",
            codec.mime_type(),
            Base64.encode(bytes)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::RecordingLogger;
    use serde_json::Value;
    use std::path::Path;

    const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg\xff\xd9";

    fn question(qid: &str, images: &[&str]) -> Question {
        Question::new(
            qid,
            1,
            "What does a red traffic light mean?",
            vec!["Stop".to_string(), "Go".to_string()],
            "Stop",
        )
        .unwrap()
        .with_images(images.iter().copied())
        .unwrap()
    }

    fn bank_in(dir: &Path, questions: Vec<Question>) -> QuestionBank {
        let mut bank = QuestionBank::new(dir);
        bank.add_chapter(1, "Traffic Signs").unwrap();
        for q in questions {
            bank.add_question(q).unwrap();
        }
        bank
    }

    fn to_value(record: &BatchRequestRecord) -> Value {
        serde_json::from_str(&record.to_json_line().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_text_only_question() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank_in(dir.path(), vec![question("Q001", &[])]);
        let logger = Arc::new(RecordingLogger::new());
        let maker = BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("{{question}}").unwrap(),
            "/v1/chat/completions",
            "qwen-vl-max",
            logger.clone(),
        );

        let batch = maker.make_batch_request().await.unwrap();
        assert_eq!(batch.len(), 1);

        let value = to_value(&batch.records()[0]);
        assert_eq!(value["custom_id"], "qb-Q001");
        let messages = value["body"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        let content = messages[0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "What does a red traffic light mean?");
    }

    #[tokio::test]
    async fn test_images_embedded_in_order_after_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), JPEG_BYTES).unwrap();
        std::fs::write(dir.path().join("a.png"), b"png-bytes").unwrap();
        let bank = bank_in(dir.path(), vec![question("Q004", &["b.jpg", "a.png"])]);

        let maker = BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("test prompt")
                .unwrap()
                .with_system("你是驾考题目标注助手"),
            "/v1/chat/completions",
            "deepseek-r1",
            Arc::new(RecordingLogger::new()),
        );
        let record = maker.make_request(bank.get_question("Q004").unwrap()).await.unwrap();
        let value = to_value(&record);

        assert_eq!(value["method"], "POST");
        assert_eq!(value["url"], "/v1/chat/completions");
        assert_eq!(value["body"]["model"], "deepseek-r1");

        let messages = value["body"]["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "你是驾考题目标注助手");

        let content = messages[1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["text"], "test prompt");
        assert_eq!(content[1]["type"], "image_url");

        let first = content[1]["image_url"]["url"].as_str().unwrap();
        let expected = format!("data:image/jpeg;base64,{}", Base64.encode(JPEG_BYTES));
        assert_eq!(first, expected);
        let second = content[2]["image_url"]["url"].as_str().unwrap();
        assert!(second.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_missing_image_fails_fast_with_id() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank_in(
            dir.path(),
            vec![question("q1", &[]), question("q2", &["gone.jpg"])],
        );
        let logger = Arc::new(RecordingLogger::new());
        let maker = BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("p").unwrap(),
            "/v1/chat/completions",
            "qwen-vl-max",
            logger.clone(),
        );

        let err = maker.make_batch_request().await.unwrap_err();
        assert_eq!(err.question_id(), Some("q2"));
        assert!(logger.contains(Level::ERROR, "q2"));
    }

    #[tokio::test]
    async fn test_skip_and_log_omits_record() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank_in(
            dir.path(),
            vec![question("q1", &[]), question("q2", &["gone.jpg"])],
        );
        let logger = Arc::new(RecordingLogger::new());
        let batch = BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("p").unwrap(),
            "/v1/chat/completions",
            "qwen-vl-max",
            logger.clone(),
        )
        .with_failure_policy(FailurePolicy::SkipAndLog)
        .with_custom_id_prefix("drv-")
        .make_batch_request()
        .await
        .unwrap();

        assert_eq!(batch.custom_ids(), vec!["drv-q1"]);
        assert!(logger.contains(Level::WARN, "q2"));
        assert!(logger.contains(Level::INFO, "跳过 1 道题"));
    }

    #[tokio::test]
    async fn test_logging_per_question_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let questions = (0..3).map(|i| question(&format!("q{}", i), &[])).collect();
        let bank = bank_in(dir.path(), questions);
        let logger = Arc::new(RecordingLogger::new());

        BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("p").unwrap(),
            "/v1/chat/completions",
            "qwen-vl-max",
            logger.clone(),
        )
        .make_batch_request()
        .await
        .unwrap();

        assert_eq!(logger.count(Level::DEBUG), 3);
        assert!(logger.contains(Level::INFO, "共 3 条请求"));
        assert_eq!(logger.count(Level::WARN), 0);
    }

    #[tokio::test]
    async fn test_unknown_model_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let bank = bank_in(dir.path(), vec![question("q1", &[])]);
        let logger = Arc::new(RecordingLogger::new());

        let batch = BatchRequestMaker::new(
            &bank,
            PromptTemplate::new("p").unwrap(),
            "/v1/custom/batch",
            "my-vlm",
            logger.clone(),
        )
        .make_batch_request()
        .await
        .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].url(), "/v1/custom/batch");
        assert_eq!(batch.records()[0].model(), "my-vlm");
        assert!(logger.contains(Level::WARN, "未知的批量接口"));
    }
}
