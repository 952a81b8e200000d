use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 题库或批量文件读写错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 单张图片格式化错误
    #[error("图片格式化错误: {0}")]
    ImageFormat(#[from] ImageFormatError),
    /// 单个请求构建错误
    #[error("请求构建错误: {0}")]
    RequestBuild(#[from] RequestBuildError),
    /// 题库数据不合法
    #[error("题库错误: {0}")]
    Bank(#[from] BankError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// 返回导致错误的题目 ID（如果该错误可以归属到某道题）
    pub fn question_id(&self) -> Option<&str> {
        match self {
            AppError::ImageFormat(e) => Some(e.question_id()),
            AppError::RequestBuild(e) => Some(e.question_id()),
            AppError::Storage(StorageError::MissingImage { qid, .. }) => Some(qid),
            AppError::Bank(BankError::InvalidQuestion { qid, .. })
            | AppError::Bank(BankError::DuplicateQuestion { qid })
            | AppError::Bank(BankError::QuestionNotFound { qid }) => Some(qid),
            _ => None,
        }
    }
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 元数据文件不存在
    #[error("题库元数据文件不存在: {}", .path.display())]
    MetadataNotFound { path: PathBuf },
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 元数据格式不正确
    #[error("题库元数据格式错误 ({}): {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    /// 图片引用无法解析
    #[error("题目 {qid} 的图片不存在: {}", .path.display())]
    MissingImage { qid: String, path: PathBuf },
    /// 输出目录与源图片目录相同
    #[error("输出图片目录不能与源目录相同: {}", .path.display())]
    DestinationIsSource { path: PathBuf },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 图片格式化错误，总是归属到某一道题
#[derive(Debug, Error)]
pub enum ImageFormatError {
    /// 读取源图片失败
    #[error("题目 {qid}: 无法读取图片 {}: {source}", .path.display())]
    ReadFailed {
        qid: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 图片扩展名与输入格式不一致
    #[error("题目 {qid}: 图片 {} 不是 {expected} 格式", .path.display())]
    UnexpectedExtension {
        qid: String,
        path: PathBuf,
        expected: String,
    },
    /// 解码失败
    #[error("题目 {qid}: 图片 {} 解码失败: {source}", .path.display())]
    DecodeFailed {
        qid: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// 编码失败
    #[error("题目 {qid}: 图片 {} 编码失败: {source}", .path.display())]
    EncodeFailed {
        qid: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// 写入新图片失败
    #[error("题目 {qid}: 写入图片 {} 失败: {source}", .path.display())]
    WriteFailed {
        qid: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 多个图片映射到同一个输出文件
    #[error("题目 {qid}: 输出文件名冲突 {}", .path.display())]
    NameCollision { qid: String, path: PathBuf },
}

impl ImageFormatError {
    pub fn question_id(&self) -> &str {
        match self {
            ImageFormatError::ReadFailed { qid, .. }
            | ImageFormatError::UnexpectedExtension { qid, .. }
            | ImageFormatError::DecodeFailed { qid, .. }
            | ImageFormatError::EncodeFailed { qid, .. }
            | ImageFormatError::WriteFailed { qid, .. }
            | ImageFormatError::NameCollision { qid, .. } => qid,
        }
    }
}

/// 请求构建错误，总是归属到某一道题
#[derive(Debug, Error)]
pub enum RequestBuildError {
    /// 图片读取失败
    #[error("题目 {qid}: 无法读取图片 {}: {source}", .path.display())]
    ImageUnreadable {
        qid: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 图片扩展名不受支持，无法确定 MIME 类型
    #[error("题目 {qid}: 不支持的图片类型 {}", .path.display())]
    UnsupportedImage { qid: String, path: PathBuf },
    /// 选项数量超过字母编号范围
    #[error("题目 {qid}: 选项数量 {count} 超过 26 个")]
    TooManyAnswers { qid: String, count: usize },
    /// 请求体构建失败
    #[error("题目 {qid}: 请求体构建失败: {reason}")]
    InvalidBody { qid: String, reason: String },
}

impl RequestBuildError {
    pub fn question_id(&self) -> &str {
        match self {
            RequestBuildError::ImageUnreadable { qid, .. }
            | RequestBuildError::UnsupportedImage { qid, .. }
            | RequestBuildError::TooManyAnswers { qid, .. }
            | RequestBuildError::InvalidBody { qid, .. } => qid,
        }
    }
}

/// 题库数据错误
#[derive(Debug, Error)]
pub enum BankError {
    /// 题目字段不合法
    #[error("题目 {qid:?} 格式不正确: {reason}")]
    InvalidQuestion { qid: String, reason: String },
    /// 题目 ID 重复
    #[error("题目 ID 重复: {qid}")]
    DuplicateQuestion { qid: String },
    /// 题目不存在
    #[error("题目不存在: {qid}")]
    QuestionNotFound { qid: String },
    /// 章节不存在
    #[error("章节不存在: {chapter}")]
    UnknownChapter { chapter: u32 },
    /// 章节信息不合法
    #[error("章节 {chapter} 不合法: {reason}")]
    InvalidChapter { chapter: u32, reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数据格式不合法
    #[error("数据格式不合法: {0}")]
    InvalidDataFormat(String),
    /// 提示词模板包含未知占位符
    #[error("提示词模板包含未知占位符: {{{{{name}}}}}")]
    UnknownPlaceholder { name: String },
    /// 配置文件读取失败
    #[error("无法读取配置文件 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("无法解析配置文件 ({}): {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl StorageError {
    /// 创建读取失败错误
    pub fn read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建写入失败错误
    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建元数据格式错误
    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StorageError::Malformed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl BankError {
    /// 创建题目格式错误
    pub fn invalid_question(qid: impl Into<String>, reason: impl Into<String>) -> Self {
        BankError::InvalidQuestion {
            qid: qid.into(),
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
