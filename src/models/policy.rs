use serde::{Deserialize, Serialize};

/// 单道题处理失败时的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 立即中止整批处理，保证输出要么完整要么不存在
    #[default]
    FailFast,
    /// 跳过出错的题目并记录警告
    ///
    /// 被跳过的题目新写出的图片会被删除，不会残留在输出目录里。
    SkipAndLog,
}
