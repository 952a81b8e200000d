use std::collections::btree_map::{BTreeMap, Values};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{BankError, StorageError};
use crate::models::question::Question;

/// 题库
///
/// 持有题目（按 ID 升序迭代）、章节说明以及图片所在的目录。
/// 所有图片引用都是相对 `img_dir` 的文件名。
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBank {
    img_dir: PathBuf,
    chapters: BTreeMap<u32, String>,
    questions: BTreeMap<String, Question>,
}

impl QuestionBank {
    /// 创建空题库
    pub fn new(img_dir: impl Into<PathBuf>) -> Self {
        Self {
            img_dir: img_dir.into(),
            chapters: BTreeMap::new(),
            questions: BTreeMap::new(),
        }
    }

    /// 添加章节；章节已存在时保留原有说明
    pub fn add_chapter(
        &mut self,
        chapter: u32,
        description: impl Into<String>,
    ) -> Result<(), BankError> {
        let description = description.into();
        if chapter == 0 {
            return Err(BankError::InvalidChapter {
                chapter,
                reason: "章节号必须为正整数".to_string(),
            });
        }
        if description.trim().is_empty() {
            return Err(BankError::InvalidChapter {
                chapter,
                reason: "章节说明不能为空".to_string(),
            });
        }
        self.chapters.entry(chapter).or_insert(description);
        Ok(())
    }

    /// 添加题目，题目所属章节必须已存在，ID 不能重复
    pub fn add_question(&mut self, question: Question) -> Result<(), BankError> {
        if !self.chapters.contains_key(&question.chapter()) {
            return Err(BankError::UnknownChapter {
                chapter: question.chapter(),
            });
        }
        if self.questions.contains_key(question.qid()) {
            return Err(BankError::DuplicateQuestion {
                qid: question.qid().to_string(),
            });
        }
        self.questions.insert(question.qid().to_string(), question);
        Ok(())
    }

    pub fn get_question(&self, qid: &str) -> Result<&Question, BankError> {
        self.questions
            .get(qid)
            .ok_or_else(|| BankError::QuestionNotFound {
                qid: qid.to_string(),
            })
    }

    /// 某章节下的题目 ID（升序）
    pub fn qids_by_chapter(&self, chapter: u32) -> Result<Vec<&str>, BankError> {
        if !self.chapters.contains_key(&chapter) {
            return Err(BankError::UnknownChapter { chapter });
        }
        Ok(self
            .questions
            .values()
            .filter(|q| q.chapter() == chapter)
            .map(Question::qid)
            .collect())
    }

    pub fn describe_chapter(&self, chapter: u32) -> Result<&str, BankError> {
        self.chapters
            .get(&chapter)
            .map(String::as_str)
            .ok_or(BankError::UnknownChapter { chapter })
    }

    pub fn chapters(&self) -> &BTreeMap<u32, String> {
        &self.chapters
    }

    pub fn img_dir(&self) -> &Path {
        &self.img_dir
    }

    /// 题目 ID 列表（升序）
    pub fn qid_list(&self) -> Vec<&str> {
        self.questions.keys().map(String::as_str).collect()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn chapter_question_count(&self, chapter: u32) -> usize {
        self.questions
            .values()
            .filter(|q| q.chapter() == chapter)
            .count()
    }

    pub fn image_count(&self) -> usize {
        self.questions.values().map(|q| q.image_refs().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 按题目 ID 升序迭代
    pub fn iter(&self) -> Values<'_, String, Question> {
        self.questions.values()
    }

    /// 图片引用对应的完整路径
    pub fn image_path(&self, image_ref: &str) -> PathBuf {
        self.img_dir.join(image_ref)
    }

    /// 某道题所有图片的完整路径（保持引用顺序）
    pub fn image_paths(&self, question: &Question) -> Vec<PathBuf> {
        question
            .image_refs()
            .iter()
            .map(|r| self.image_path(r))
            .collect()
    }

    /// 检查所有图片引用都能解析到已存在的文件
    pub fn validate_images(&self) -> Result<(), StorageError> {
        for question in self.iter() {
            for path in self.image_paths(question) {
                if !path.is_file() {
                    return Err(StorageError::MissingImage {
                        qid: question.qid().to_string(),
                        path,
                    });
                }
            }
        }
        Ok(())
    }

    /// 所有被引用的图片文件名（去重）
    pub fn referenced_images(&self) -> BTreeSet<&str> {
        self.iter()
            .flat_map(|q| q.image_refs().iter().map(String::as_str))
            .collect()
    }

    /// 生成一个绑定到新目录的空题库，保留章节信息
    pub(crate) fn empty_like(&self, img_dir: impl Into<PathBuf>) -> Self {
        Self {
            img_dir: img_dir.into(),
            chapters: self.chapters.clone(),
            questions: BTreeMap::new(),
        }
    }
}

impl<'a> IntoIterator for &'a QuestionBank {
    type Item = &'a Question;
    type IntoIter = Values<'a, String, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(qid: &str, chapter: u32) -> Question {
        Question::new(
            qid,
            chapter,
            format!("{} 的题干", qid),
            vec!["对".to_string(), "错".to_string()],
            "对",
        )
        .unwrap()
    }

    fn sample_bank() -> QuestionBank {
        let mut bank = QuestionBank::new("imgs");
        bank.add_chapter(1, "道路交通安全法律、法规和规章").unwrap();
        bank.add_chapter(2, "交通信号").unwrap();
        bank.add_question(question("q3", 2)).unwrap();
        bank.add_question(question("q1", 1)).unwrap();
        bank.add_question(question("q2", 1)).unwrap();
        bank
    }

    #[test]
    fn test_iteration_is_sorted_by_id() {
        let bank = sample_bank();
        let ids: Vec<&str> = bank.iter().map(Question::qid).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
        assert_eq!(bank.qid_list(), ids);
        assert_eq!(bank.question_count(), 3);
    }

    #[test]
    fn test_chapter_queries() {
        let bank = sample_bank();
        assert_eq!(bank.qids_by_chapter(1).unwrap(), vec!["q1", "q2"]);
        assert_eq!(bank.chapter_question_count(2), 1);
        assert_eq!(bank.describe_chapter(2).unwrap(), "交通信号");
        assert!(bank.describe_chapter(9).is_err());
        assert!(bank.qids_by_chapter(9).is_err());
    }

    #[test]
    fn test_add_rules() {
        let mut bank = sample_bank();
        assert!(matches!(
            bank.add_question(question("q1", 1)),
            Err(BankError::DuplicateQuestion { .. })
        ));
        assert!(matches!(
            bank.add_question(question("q9", 7)),
            Err(BankError::UnknownChapter { chapter: 7 })
        ));
        assert!(bank.add_chapter(0, "零").is_err());
        assert!(bank.add_chapter(3, "   ").is_err());

        // 重复添加章节不覆盖原说明
        bank.add_chapter(2, "新的说明").unwrap();
        assert_eq!(bank.describe_chapter(2).unwrap(), "交通信号");
    }

    #[test]
    fn test_get_question() {
        let bank = sample_bank();
        assert_eq!(bank.get_question("q2").unwrap().qid(), "q2");
        assert!(matches!(
            bank.get_question("nope"),
            Err(BankError::QuestionNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_images_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let mut bank = QuestionBank::new(dir.path());
        bank.add_chapter(1, "章节").unwrap();
        bank.add_question(question("q1", 1).with_images(["a.jpg"]).unwrap())
            .unwrap();
        assert!(bank.validate_images().is_ok());

        bank.add_question(question("q2", 1).with_images(["missing.jpg"]).unwrap())
            .unwrap();
        match bank.validate_images() {
            Err(StorageError::MissingImage { qid, .. }) => assert_eq!(qid, "q2"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(bank.image_count(), 2);
    }
}
