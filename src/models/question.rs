use std::collections::HashSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// 一道考试题目
///
/// 通过 [`Question::new`] 构造时会校验字段：
/// - 题目 ID 与题干不能为空
/// - 至少两个选项，选项不能为空也不能重复
/// - 正确答案必须是选项之一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub(crate) qid: String,
    pub(crate) chapter: u32,
    pub(crate) question: String,
    pub(crate) answers: Vec<String>,
    pub(crate) correct_answer: String,
    #[serde(default)]
    pub(crate) image_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) keywords: Vec<String>,
}

impl Question {
    /// 创建并校验题目
    pub fn new(
        qid: impl Into<String>,
        chapter: u32,
        question: impl Into<String>,
        answers: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Result<Self, BankError> {
        let q = Self {
            qid: qid.into(),
            chapter,
            question: question.into(),
            answers,
            correct_answer: correct_answer.into(),
            image_refs: Vec::new(),
            tags: Vec::new(),
            keywords: Vec::new(),
        };
        q.check_format()?;
        Ok(q)
    }

    /// 附加图片（文件名相对于题库图片目录，顺序有意义）
    pub fn with_images<I, S>(mut self, image_refs: I) -> Result<Self, BankError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_refs = image_refs.into_iter().map(Into::into).collect();
        self.check_format()?;
        Ok(self)
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// 校验题目格式
    pub(crate) fn check_format(&self) -> Result<(), BankError> {
        let fail = |reason: &str| -> Result<(), BankError> {
            Err(BankError::invalid_question(&self.qid, reason))
        };

        if self.qid.trim().is_empty() {
            return fail("题目 ID 不能为空");
        }
        if self.question.trim().is_empty() {
            return fail("题干不能为空");
        }
        if self.answers.len() < 2 {
            return fail("至少需要两个选项");
        }
        if self.answers.iter().any(|a| a.trim().is_empty()) {
            return fail("选项不能为空");
        }
        let unique: HashSet<&str> = self.answers.iter().map(String::as_str).collect();
        if unique.len() != self.answers.len() {
            return fail("选项不能重复");
        }
        if !self.answers.contains(&self.correct_answer) {
            return fail("正确答案必须是选项之一");
        }
        if self.image_refs.iter().any(|r| r.trim().is_empty()) {
            return fail("图片文件名不能为空");
        }
        if !self.image_refs.iter().all(|r| is_contained_ref(r)) {
            return fail("图片路径必须是图片目录内的相对路径");
        }
        Ok(())
    }

    pub fn qid(&self) -> &str {
        &self.qid
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    pub fn image_refs(&self) -> &[String] {
        &self.image_refs
    }

    pub fn has_images(&self) -> bool {
        !self.image_refs.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// 选项按字典序排列后依次编号 A、B、C……
    ///
    /// 超过 26 个选项时返回 `None`。
    pub fn lettered_answers(&self) -> Option<Vec<(char, &str)>> {
        if self.answers.len() > 26 {
            return None;
        }
        let mut sorted: Vec<&str> = self.answers.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        Some(
            sorted
                .into_iter()
                .enumerate()
                .map(|(i, answer)| ((b'A' + i as u8) as char, answer))
                .collect(),
        )
    }

    /// 复制一份题目并替换图片引用，其余字段保持不变
    pub(crate) fn with_replaced_images(&self, image_refs: Vec<String>) -> Self {
        Self {
            image_refs,
            ..self.clone()
        }
    }
}

/// 图片引用只能由普通路径段组成，不能是绝对路径，也不能包含 `..`
fn is_contained_ref(image_ref: &str) -> bool {
    Path::new(image_ref)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
