//! 本地 JSON 题库存储
//!
//! 一个题库由元数据文件（JSON）与图片目录组成：
//!
//! ```json
//! {
//!   "img_dir": "db/images",
//!   "chapters": { "1": "道路交通安全法律、法规和规章" },
//!   "questions": [
//!     { "qid": "q1", "chapter": 1, "question": "...", "answers": ["...", "..."],
//!       "correct_answer": "...", "image_refs": ["q1.jpg"] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AppResult, StorageError};
use crate::models::batch::temp_path;
use crate::models::{Question, QuestionBank};

/// 元数据文件结构
#[derive(Debug, Serialize, Deserialize)]
struct BankRecord {
    #[serde(default)]
    img_dir: Option<String>,
    chapters: BTreeMap<u32, String>,
    #[serde(default)]
    questions: Vec<Question>,
}

/// 本地题库存储
#[derive(Debug, Clone)]
pub struct LocalStore {
    metadata_path: PathBuf,
    img_dir: PathBuf,
}

impl LocalStore {
    /// 创建存储
    ///
    /// # 参数
    /// - `metadata_path`: 元数据 JSON 文件路径
    /// - `img_dir`: 图片目录
    pub fn new(metadata_path: impl Into<PathBuf>, img_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_path: metadata_path.into(),
            img_dir: img_dir.into(),
        }
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn img_dir(&self) -> &Path {
        &self.img_dir
    }

    /// 读取题库
    ///
    /// 元数据文件不存在、格式错误或者有图片无法找到时返回 [`StorageError`]。
    /// 内容为 `{}` 的文件视为空题库。
    pub async fn load(&self) -> Result<QuestionBank, StorageError> {
        let path = &self.metadata_path;
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::MetadataNotFound { path: path.clone() });
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::read_failed(path, e))?;

        if content.trim() == "{}" {
            debug!("元数据为空，返回空题库: {}", path.display());
            return Ok(QuestionBank::new(&self.img_dir));
        }

        let record: BankRecord =
            serde_json::from_str(&content).map_err(|e| StorageError::malformed(path, e))?;
        let bank = self.build_bank(record)?;
        bank.validate_images()?;

        info!(
            "✓ 已读取题库 {}: {} 道题",
            path.display(),
            bank.question_count()
        );
        Ok(bank)
    }

    fn build_bank(&self, record: BankRecord) -> Result<QuestionBank, StorageError> {
        let path = &self.metadata_path;
        let mut bank = QuestionBank::new(&self.img_dir);

        for (chapter, description) in record.chapters {
            bank.add_chapter(chapter, description)
                .map_err(|e| StorageError::malformed(path, e))?;
        }
        for question in record.questions {
            question
                .check_format()
                .map_err(|e| StorageError::malformed(path, e))?;
            bank.add_question(question)
                .map_err(|e| StorageError::malformed(path, e))?;
        }
        Ok(bank)
    }

    /// 保存题库
    ///
    /// 题库图片目录与本存储不同时先把引用到的图片复制过来，再写元数据。
    /// 之后从同一位置 [`load`](Self::load) 可以得到等价的题库。
    pub async fn save(&self, bank: &QuestionBank) -> Result<(), StorageError> {
        fs::create_dir_all(&self.img_dir)
            .await
            .map_err(|e| StorageError::write_failed(&self.img_dir, e))?;

        if !same_dir(bank.img_dir(), &self.img_dir).await {
            self.copy_images(bank).await?;
        }

        let record = BankRecord {
            img_dir: Some(self.img_dir.to_string_lossy().to_string()),
            chapters: bank.chapters().clone(),
            questions: bank.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        let path = &self.metadata_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::write_failed(parent, e))?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, json)
            .await
            .map_err(|e| StorageError::write_failed(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::write_failed(path, e))?;

        info!(
            "✓ 已保存题库 {}: {} 道题",
            path.display(),
            bank.question_count()
        );
        Ok(())
    }

    async fn copy_images(&self, bank: &QuestionBank) -> Result<(), StorageError> {
        for image_ref in bank.referenced_images() {
            let from = bank.image_path(image_ref);
            let to = self.img_dir.join(image_ref);
            debug!("复制图片 {} -> {}", from.display(), to.display());
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::write_failed(parent, e))?;
            }
            fs::copy(&from, &to)
                .await
                .map_err(|e| StorageError::write_failed(&to, e))?;
        }
        Ok(())
    }
}

/// 两个目录是否指向同一位置（不存在时按字面比较）
pub(crate) async fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// 从元数据文件与图片目录读取题库的便捷函数
pub async fn load_question_bank(
    metadata_path: impl Into<PathBuf>,
    img_dir: impl Into<PathBuf>,
) -> AppResult<QuestionBank> {
    Ok(LocalStore::new(metadata_path, img_dir).load().await?)
}
