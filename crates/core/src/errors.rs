use std::fmt;

use thiserror::Error;

use crate::traits::RemoteCallError;

/// 远程调用失败的详细信息
///
/// 所有远程错误分类（已存在、未找到、校验失败）都携带原始消息、
/// 操作标识和 HTTP 风格的状态码。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// 远程操作标识，例如 `GetFunction`
    pub operation: String,
    /// 远程服务返回的错误码
    pub code: String,
    /// 原始错误消息
    pub message: String,
    /// HTTP 状态码
    pub status_code: u16,
}

impl RemoteFailure {
    pub fn new(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
            status_code,
        }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(operation={}, status={}, msg={:?})",
            self.code, self.operation, self.status_code, self.message
        )
    }
}

impl From<RemoteCallError> for RemoteFailure {
    fn from(err: RemoteCallError) -> Self {
        Self {
            operation: err.operation,
            code: err.code,
            message: err.message,
            status_code: err.status_code,
        }
    }
}

/// 错误分类
///
/// 编排层通过模式匹配此分类决定是否吞掉错误，而不是检查具体错误类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    Validation,
    ImportPath,
    Other,
}

/// Seda 错误类型定义
#[derive(Debug, Error)]
pub enum SedaError {
    #[error("资源已存在: {0}")]
    AlreadyExists(RemoteFailure),

    #[error("资源未找到: {0}")]
    NotFound(RemoteFailure),

    #[error("请求校验失败: {0}")]
    Validation(RemoteFailure),

    #[error("远程调用失败: {0}")]
    Remote(RemoteFailure),

    #[error("导入路径错误: {0}")]
    ImportPath(String),

    #[error("定时任务已存在: {0}")]
    DuplicateSchedule(String),

    #[error("Lambda 函数 \"{name}\" 不存在")]
    FunctionNotFound { name: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type SedaResult<T> = std::result::Result<T, SedaError>;

impl SedaError {
    pub fn import_path<S: Into<String>>(msg: S) -> Self {
        Self::ImportPath(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn task_execution<S: Into<String>>(msg: S) -> Self {
        Self::TaskExecution(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SedaError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            SedaError::NotFound(_) => ErrorKind::NotFound,
            SedaError::Validation(_) => ErrorKind::Validation,
            SedaError::ImportPath(_) => ErrorKind::ImportPath,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// 远程错误的详细信息，非远程错误返回 None
    pub fn remote(&self) -> Option<&RemoteFailure> {
        match self {
            SedaError::AlreadyExists(f)
            | SedaError::NotFound(f)
            | SedaError::Validation(f)
            | SedaError::Remote(f) => Some(f),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<&str> {
        self.remote().map(|f| f.operation.as_str())
    }

    /// 用于重试模式匹配的消息文本
    pub fn message(&self) -> String {
        match self.remote() {
            Some(f) => f.message.clone(),
            None => self.to_string(),
        }
    }

    /// 终止进程时给运维人员看的提示
    pub fn user_message(&self) -> &str {
        match self {
            SedaError::FunctionNotFound { .. } => "目标 Lambda 函数不存在，请检查 --function 参数",
            SedaError::ImportPath(_) => "应用或任务无法加载，请检查导入路径",
            SedaError::DuplicateSchedule(_) => "存在重复的定时任务声明",
            SedaError::Configuration(_) => "配置有误，请检查配置文件",
            SedaError::Validation(_) => "远程服务拒绝了请求参数",
            _ => "操作失败，请查看日志",
        }
    }
}

impl From<serde_json::Error> for SedaError {
    fn from(err: serde_json::Error) -> Self {
        SedaError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SedaError {
    fn from(err: anyhow::Error) -> Self {
        SedaError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> RemoteFailure {
        RemoteFailure::new("CreateSchedule", "ValidationException", "bad role", 400)
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(SedaError::AlreadyExists(failure()).kind(), ErrorKind::AlreadyExists);
        assert_eq!(SedaError::NotFound(failure()).kind(), ErrorKind::NotFound);
        assert_eq!(SedaError::Validation(failure()).kind(), ErrorKind::Validation);
        assert_eq!(SedaError::import_path("x").kind(), ErrorKind::ImportPath);
        assert_eq!(SedaError::Remote(failure()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_remote_message_and_operation() {
        let err = SedaError::Validation(failure());
        assert_eq!(err.message(), "bad role");
        assert_eq!(err.operation(), Some("CreateSchedule"));
        assert!(SedaError::config_error("x").operation().is_none());
    }
}
