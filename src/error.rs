use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 错误类别
///
/// 与宿主进程约定的错误分类（不是 Rust 错误类型本身），序列化为 `VALIDATION_ERROR` 这类大写字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// 用户资料或职位数据不合法
    ValidationError,
    /// URL 与处理器不匹配
    InvalidUrl,
    /// 浏览器会话或 AI 代理失败
    AutomationError,
    /// 遇到验证码，本系统无法继续
    CaptchaRequired,
    /// 代理报告表单级别错误
    FormError,
    /// 没有找到任何成功/失败标记
    UnclearResult,
    /// 没有可用的模型凭证等配置问题
    ConfigurationError,
    /// 执行阶段超时
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::AutomationError => "AUTOMATION_ERROR",
            ErrorKind::CaptchaRequired => "CAPTCHA_REQUIRED",
            ErrorKind::FormError => "FORM_ERROR",
            ErrorKind::UnclearResult => "UNCLEAR_RESULT",
            ErrorKind::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 字段校验失败
    #[error("字段 {field} 校验失败: {reason}")]
    Validation { field: &'static str, reason: String },

    /// URL 不属于当前处理器
    #[error("URL {url} 不受 {company} 自动化支持")]
    InvalidUrl { url: String, company: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 浏览器会话错误（启动、读取页面、截图）
    #[error("浏览器会话失败: {0:#}")]
    Session(anyhow::Error),

    /// AI 代理执行错误
    #[error("AI 代理执行失败: {0:#}")]
    Agent(anyhow::Error),

    /// 执行阶段超时
    #[error("AI 代理执行超时 ({0} 秒)")]
    Timeout(u64),

    /// 结果已终结后仍尝试修改
    #[error("申请结果已终结，禁止再次修改 (job {job_id})")]
    AlreadyFinalized { job_id: String },

    /// JSON 载荷解析失败
    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML 解析失败
    #[error("TOML 解析失败: {0}")]
    Toml(#[from] toml::de::Error),

    /// 文件读写失败
    #[error("文件操作失败: {0}")]
    Io(#[from] std::io::Error),

    /// 简历下载失败
    #[error("简历下载失败: {0}")]
    Download(#[from] reqwest::Error),
}

impl AppError {
    /// 创建字段校验错误
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// 错误对应的类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } | AppError::Json(_) => ErrorKind::ValidationError,
            AppError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            AppError::Configuration(_) | AppError::Toml(_) => ErrorKind::ConfigurationError,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Session(_)
            | AppError::Agent(_)
            | AppError::AlreadyFinalized { .. }
            | AppError::Io(_)
            | AppError::Download(_) => ErrorKind::AutomationError,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
