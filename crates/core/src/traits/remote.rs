//! 远程资源管理 API 的抽象接口
//!
//! 本系统不实现网络客户端、传输层重试或序列化编解码，而是假定调用方提供一个
//! 可靠的 RPC 风格客户端。这里定义的两个接口就是这条边界：
//!
//! - [`Session`]: 按服务名创建连接，并报告区域等会话信息
//! - [`ServiceClient`]: 单个服务的连接，一次 `call` 对应一次远程调用
//!
//! 请求与响应都是 JSON 文档，字段命名沿用远程 API 的 PascalCase 约定。
//! 失败时返回 [`RemoteCallError`]，其中的 `code` 由上层门面翻译为统一的错误分类。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::SedaResult;

/// 远程调用的原始失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message} (operation={operation}, status={status_code})")]
pub struct RemoteCallError {
    pub operation: String,
    pub code: String,
    pub message: String,
    pub status_code: u16,
}

impl RemoteCallError {
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

/// 单个远程服务的连接
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// 执行一次远程操作
    async fn call(&self, operation: &str, input: Value) -> Result<Value, RemoteCallError>;
}

/// 静态访问凭证
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// 远程会话，负责创建各服务的连接
pub trait Session: Send + Sync {
    /// 会话所在区域
    fn region(&self) -> &str;

    /// 凭证配置名
    fn profile(&self) -> &str {
        "default"
    }

    /// 显式配置的静态凭证；为 `None` 时由会话自行解析
    fn credentials(&self) -> Option<&Credentials> {
        None
    }

    /// 为指定服务创建新连接
    ///
    /// 调用方负责缓存；每次调用都可能建立新连接。
    fn client(&self, service: &str) -> SedaResult<Arc<dyn ServiceClient>>;
}
