//! 提示词模板
//!
//! 用户提示词中可以使用 `{{名称}}` 形式的占位符，按题目逐一替换；
//! 没有占位符的模板对每道题原样使用。

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::json;

use crate::error::{ConfigError, RequestBuildError};
use crate::models::question::Question;
use crate::models::question_bank::QuestionBank;

/// 模板支持的占位符
pub const PLACEHOLDERS: &[&str] = &[
    "qid",
    "chapter",
    "chapter_description",
    "question",
    "answers",
    "correct_answer",
    "image_count",
    "question_json",
];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"))
}

/// 提示词模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: Option<String>,
    user: String,
    has_placeholders: bool,
}

impl PromptTemplate {
    /// 创建模板，未知占位符会被拒绝
    pub fn new(user: impl Into<String>) -> Result<Self, ConfigError> {
        let user = user.into();
        let mut has_placeholders = false;
        for caps in placeholder_regex().captures_iter(&user) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(ConfigError::UnknownPlaceholder {
                    name: name.to_string(),
                });
            }
            has_placeholders = true;
        }

        Ok(Self {
            system: None,
            user,
            has_placeholders,
        })
    }

    /// 附加系统提示词（原样发送，不做替换）
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = if system.trim().is_empty() {
            None
        } else {
            Some(system)
        };
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn user_template(&self) -> &str {
        &self.user
    }

    pub fn has_placeholders(&self) -> bool {
        self.has_placeholders
    }

    /// 为某道题渲染用户提示词
    pub fn render(
        &self,
        question: &Question,
        bank: &QuestionBank,
    ) -> Result<String, RequestBuildError> {
        if !self.has_placeholders {
            return Ok(self.user.clone());
        }

        let mut failure = None;
        let rendered = placeholder_regex().replace_all(&self.user, |caps: &Captures| {
            match value_of(&caps[1], question, bank) {
                Ok(value) => value,
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }
}

fn value_of(
    name: &str,
    question: &Question,
    bank: &QuestionBank,
) -> Result<String, RequestBuildError> {
    let value = match name {
        "qid" => question.qid().to_string(),
        "chapter" => question.chapter().to_string(),
        "chapter_description" => chapter_description(question, bank),
        "question" => question.question().to_string(),
        "answers" => lettered(question)?
            .iter()
            .map(|(letter, answer)| format!("{}. {}", letter, answer))
            .collect::<Vec<_>>()
            .join("\n"),
        "correct_answer" => question.correct_answer().to_string(),
        "image_count" => question.image_refs().len().to_string(),
        "question_json" => question_json(question, bank)?,
        // 构造时已经校验过占位符
        _ => String::new(),
    };
    Ok(value)
}

fn chapter_description(question: &Question, bank: &QuestionBank) -> String {
    bank.describe_chapter(question.chapter())
        .unwrap_or_default()
        .to_string()
}

fn lettered(question: &Question) -> Result<Vec<(char, &str)>, RequestBuildError> {
    question
        .lettered_answers()
        .ok_or_else(|| RequestBuildError::TooManyAnswers {
            qid: question.qid().to_string(),
            count: question.answers().len(),
        })
}

/// 题目的紧凑 JSON 描述：章节、题目、选项、答案
fn question_json(question: &Question, bank: &QuestionBank) -> Result<String, RequestBuildError> {
    let options: serde_json::Map<String, serde_json::Value> = lettered(question)?
        .into_iter()
        .map(|(letter, answer)| (letter.to_string(), json!(answer)))
        .collect();

    let value = json!({
        "章节": format!("{}: {}", question.chapter(), chapter_description(question, bank)),
        "题目": question.question(),
        "选项": options,
        "答案": question.correct_answer(),
    });
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_question() -> (QuestionBank, Question) {
        let mut bank = QuestionBank::new("imgs");
        bank.add_chapter(2, "交通规则").unwrap();
        let q = Question::new(
            "Q002",
            2,
            "红灯代表什么意思？",
            vec!["香蕉".to_string(), "苹果".to_string(), "橙子".to_string()],
            "苹果",
        )
        .unwrap()
        .with_images(["Q002.jpg"])
        .unwrap();
        bank.add_question(q.clone()).unwrap();
        (bank, q)
    }

    #[test]
    fn test_template_without_placeholders_is_verbatim() {
        let (bank, q) = bank_with_question();
        let template = PromptTemplate::new("请为这道题打标签。{not a placeholder}").unwrap();
        assert!(!template.has_placeholders());
        assert_eq!(
            template.render(&q, &bank).unwrap(),
            "请为这道题打标签。{not a placeholder}"
        );
    }

    #[test]
    fn test_render_substitutes_fields() {
        let (bank, q) = bank_with_question();
        let template = PromptTemplate::new(
            "ID={{qid}} 章节={{ chapter }}:{{chapter_description}}\n{{question}}\n{{answers}}\n答案={{correct_answer}} 图片={{image_count}}",
        )
        .unwrap();

        let text = template.render(&q, &bank).unwrap();
        assert!(text.starts_with("ID=Q002 章节=2:交通规则\n红灯代表什么意思？\n"));
        // 选项排序后编号
        let sorted = {
            let mut v = vec!["香蕉", "苹果", "橙子"];
            v.sort_unstable();
            v
        };
        assert!(text.contains(&format!("A. {}", sorted[0])));
        assert!(text.contains(&format!("C. {}", sorted[2])));
        assert!(text.ends_with("答案=苹果 图片=1"));
    }

    #[test]
    fn test_question_json_placeholder() {
        let (bank, q) = bank_with_question();
        let template = PromptTemplate::new("{{question_json}}").unwrap();
        let text = template.render(&q, &bank).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["章节"], "2: 交通规则");
        assert_eq!(value["题目"], "红灯代表什么意思？");
        assert_eq!(value["答案"], "苹果");
        assert_eq!(value["选项"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        assert!(matches!(
            PromptTemplate::new("{{qid}} {{unknown_field}}"),
            Err(ConfigError::UnknownPlaceholder { name }) if name == "unknown_field"
        ));
    }

    #[test]
    fn test_blank_system_prompt_is_dropped() {
        let template = PromptTemplate::new("x").unwrap().with_system("  ");
        assert_eq!(template.system(), None);
        let template = PromptTemplate::new("x").unwrap().with_system("你是驾考题目标注助手");
        assert_eq!(template.system(), Some("你是驾考题目标注助手"));
    }

    #[test]
    fn test_too_many_answers_fails_render() {
        let mut bank = QuestionBank::new("imgs");
        bank.add_chapter(1, "章节").unwrap();
        let many: Vec<String> = (0..27).map(|i| format!("选项{:02}", i)).collect();
        let correct = many[0].clone();
        let q = Question::new("q1", 1, "题干", many, correct).unwrap();

        let template = PromptTemplate::new("{{answers}}").unwrap();
        assert!(matches!(
            template.render(&q, &bank),
            Err(RequestBuildError::TooManyAnswers { count: 27, .. })
        ));
        // 不涉及选项的模板不受影响
        let template = PromptTemplate::new("{{qid}}").unwrap();
        assert_eq!(template.render(&q, &bank).unwrap(), "q1");
    }
}
