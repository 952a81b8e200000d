//! 题库格式化服务 - 业务能力层
//!
//! 把题库中的所有图片解码、缩放到统一尺寸、重新编码后写入新目录，
//! 返回绑定到新目录的新题库。原题库及其图片文件不会被修改。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppResult, ImageFormatError, StorageError};
use crate::infrastructure::local_store::same_dir;
use crate::models::batch::temp_path;
use crate::models::{DataFormat, FailurePolicy, ImageCodec, Question, QuestionBank};
use crate::services::image_reshaper::ImgReshaper;

/// 题库格式化器
#[derive(Debug, Clone)]
pub struct DataFormatter {
    data_format: DataFormat,
    failure_policy: FailurePolicy,
}

impl DataFormatter {
    pub fn new(data_format: DataFormat) -> Self {
        Self {
            data_format,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn data_format(&self) -> &DataFormat {
        &self.data_format
    }

    /// 格式化题库
    ///
    /// # 参数
    /// - `question_bank`: 源题库，所有图片引用都必须能解析
    /// - `new_img_dir`: 输出目录，不存在时自动创建，不能与源目录相同
    ///
    /// # 返回
    /// 题目数量、非图片字段都不变的新题库，图片引用指向新目录中的文件
    pub async fn format_data(
        &self,
        question_bank: &QuestionBank,
        new_img_dir: impl AsRef<Path>,
    ) -> AppResult<QuestionBank> {
        let new_img_dir = new_img_dir.as_ref();
        if same_dir(question_bank.img_dir(), new_img_dir).await {
            return Err(StorageError::DestinationIsSource {
                path: new_img_dir.to_path_buf(),
            }
            .into());
        }
        fs::create_dir_all(new_img_dir)
            .await
            .map_err(|e| StorageError::write_failed(new_img_dir, e))?;

        let (width, height) = self.data_format.image_shape();
        info!(
            "🖼️ 开始格式化题库: {} 道题 -> {} ({}x{}, {} -> {})",
            question_bank.question_count(),
            new_img_dir.display(),
            width,
            height,
            self.data_format.input_codec(),
            self.data_format.output_codec()
        );

        let reshaper = ImgReshaper::new(
            self.data_format.image_shape(),
            self.data_format.resize_policy(),
        );
        let mut formatted = question_bank.empty_like(new_img_dir);
        // 输出路径 -> 源图片路径
        let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut skipped = 0usize;

        for question in question_bank.iter() {
            let mut fresh = Vec::new();
            let result = self
                .format_question(
                    question_bank,
                    question,
                    new_img_dir,
                    &reshaper,
                    &mut written,
                    &mut fresh,
                )
                .await;

            match result {
                Ok(new_question) => {
                    formatted.add_question(new_question)?;
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailFast => return Err(e.into()),
                    FailurePolicy::SkipAndLog => {
                        warn!("⚠️ 跳过题目 {}: {}", e.question_id(), e);
                        discard_outputs(&mut written, fresh).await;
                        skipped += 1;
                    }
                },
            }
        }

        info!(
            "✓ 格式化完成: {} 道题, 写出 {} 张图片, 跳过 {} 道",
            formatted.question_count(),
            written.len(),
            skipped
        );
        Ok(formatted)
    }

    /// 处理单道题的所有图片，返回图片引用已改写的新题目
    ///
    /// 多道题共用的同一张源图片只转换一次；不同源图片映射到同一个输出文件时报错。
    /// 本题新写出的输出文件记录在 `fresh` 中。
    async fn format_question(
        &self,
        bank: &QuestionBank,
        question: &Question,
        new_img_dir: &Path,
        reshaper: &ImgReshaper,
        written: &mut HashMap<PathBuf, PathBuf>,
        fresh: &mut Vec<PathBuf>,
    ) -> Result<Question, ImageFormatError> {
        let qid = question.qid();
        let mut new_refs = Vec::with_capacity(question.image_refs().len());

        for image_ref in question.image_refs() {
            let src = bank.image_path(image_ref);
            let new_ref = self.output_name(image_ref);
            let dst = new_img_dir.join(&new_ref);

            match written.get(&dst) {
                Some(existing) if *existing == src => {
                    debug!("题目 {}: 复用已转换的图片 {}", qid, dst.display());
                }
                Some(_) => {
                    return Err(ImageFormatError::NameCollision {
                        qid: qid.to_string(),
                        path: dst,
                    });
                }
                None => {
                    self.convert_image(qid, &src, &dst, reshaper).await?;
                    debug!("题目 {}: {} -> {}", qid, src.display(), dst.display());
                    written.insert(dst.clone(), src);
                    fresh.push(dst);
                }
            }
            new_refs.push(new_ref);
        }

        Ok(question.with_replaced_images(new_refs))
    }

    /// 输出文件名：原文件名不变，扩展名换成输出格式
    fn output_name(&self, image_ref: &str) -> String {
        Path::new(image_ref)
            .with_extension(self.data_format.output_codec().extension())
            .to_string_lossy()
            .into_owned()
    }

    async fn convert_image(
        &self,
        qid: &str,
        src: &Path,
        dst: &Path,
        reshaper: &ImgReshaper,
    ) -> Result<(), ImageFormatError> {
        let input = self.data_format.input_codec();
        let output = self.data_format.output_codec();

        if ImageCodec::from_path(src) != Some(input) {
            return Err(ImageFormatError::UnexpectedExtension {
                qid: qid.to_string(),
                path: src.to_path_buf(),
                expected: input.to_string(),
            });
        }

        let bytes = fs::read(src)
            .await
            .map_err(|source| ImageFormatError::ReadFailed {
                qid: qid.to_string(),
                path: src.to_path_buf(),
                source,
            })?;

        let decoded = input
            .decode(&bytes)
            .map_err(|source| ImageFormatError::DecodeFailed {
                qid: qid.to_string(),
                path: src.to_path_buf(),
                source,
            })?;

        let encoded = output
            .encode(&reshaper.reshape(&decoded))
            .map_err(|source| ImageFormatError::EncodeFailed {
                qid: qid.to_string(),
                path: dst.to_path_buf(),
                source,
            })?;

        let write_failed = |source| ImageFormatError::WriteFailed {
            qid: qid.to_string(),
            path: dst.to_path_buf(),
            source,
        };
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        let tmp = temp_path(dst);
        fs::write(&tmp, encoded).await.map_err(write_failed)?;
        if let Err(e) = fs::rename(&tmp, dst).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_failed(e));
        }
        Ok(())
    }
}

/// 撤销被跳过题目写出的文件，避免残留文件与后续题目冲突
async fn discard_outputs(written: &mut HashMap<PathBuf, PathBuf>, outputs: Vec<PathBuf>) {
    for path in outputs {
        written.remove(&path);
        if let Err(e) = fs::remove_file(&path).await {
            debug!("清理输出文件失败 {}: {}", path.display(), e);
        }
    }
}
