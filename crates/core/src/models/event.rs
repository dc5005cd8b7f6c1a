use serde::{Deserialize, Serialize};

/// 宿主计算平台传入的调用上下文
///
/// 分发路由不读取其中任何字段，只原样交给默认处理器。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    pub function_name: String,
    pub function_version: String,
    pub invoked_function_arn: String,
    pub memory_limit_in_mb: u32,
    pub aws_request_id: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub deadline_ms: u64,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>, aws_request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            aws_request_id: aws_request_id.into(),
            function_version: "$LATEST".to_string(),
            ..Self::default()
        }
    }
}
