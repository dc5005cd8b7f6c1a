use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::{debug, info};

use seda_core::models::{EventTask, TaskArgs, TaskEnvelope, TaskPath};
use seda_core::{DispatchService, ResourceNames, SedaError, SedaResult};
use seda_infrastructure::types::{InvokeRequest, InvokeResponse};
use seda_infrastructure::{RemoteClient, ResourceLocator};

/// 出站任务的投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReceipt {
    Published { message_id: String },
    Invoked { status_code: u16 },
}

/// 远程调试命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Shell(String),
    Code(String),
}

impl RemoteCommand {
    pub fn payload(&self) -> Value {
        match self {
            RemoteCommand::Shell(command) => json!({ "shell": command }),
            RemoteCommand::Code(code) => json!({ "python": code }),
        }
    }
}

/// 把执行日志尾部还原为可读文本
///
/// 日志尾部是 base64 编码的文本，最后一行是制表符分隔的执行报告，
/// 拆成 ` - ` 开头的多行。
pub fn format_log_tail(encoded: &str) -> SedaResult<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SedaError::Serialization(format!("日志尾部不是合法的 base64: {e}")))?;
    let text = String::from_utf8_lossy(&bytes);
    let mut lines: Vec<String> = text.trim().lines().map(str::to_string).collect();
    if let Some(report) = lines.pop() {
        lines.push(report.replace('\t', "\n - "));
    }
    Ok(lines.join("\n"))
}

/// 把任务投递到远程执行
///
/// 主题投递时消息发往当前函数的消息主题；直接调用时以 `Event` 方式异步调用目标函数。
pub struct TaskInvoker {
    client: Arc<RemoteClient>,
    locator: Arc<ResourceLocator>,
    names: ResourceNames,
}

impl TaskInvoker {
    pub fn new(client: Arc<RemoteClient>, locator: Arc<ResourceLocator>, names: ResourceNames) -> Self {
        Self {
            client,
            locator,
            names,
        }
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    pub async fn dispatch(
        &self,
        path: &TaskPath,
        args: &TaskArgs,
        service: DispatchService,
    ) -> SedaResult<DispatchReceipt> {
        let payload = TaskEnvelope::new(EventTask::new(path, args)).to_value()?;
        match service {
            DispatchService::Topic => {
                let topic_arn = self
                    .locator
                    .arn(&format!("sns:{}", self.names.topic_name()?))
                    .await?;
                debug!("发布任务 {} 到 {}", path, topic_arn);
                let published = self.client.publish(&topic_arn, &payload).await?;
                Ok(DispatchReceipt::Published {
                    message_id: published.message_id,
                })
            }
            DispatchService::Invoke => {
                let function_name = self.names.function_name()?;
                debug!("异步调用 {} 执行任务 {}", function_name, path);
                let request = InvokeRequest::new(function_name, payload).fire_and_forget();
                let invoked = self.client.invoke_function(&request).await?;
                Ok(DispatchReceipt::Invoked {
                    status_code: invoked.status_code,
                })
            }
        }
    }

    /// 同步调用目标函数执行调试命令，并返回日志尾部
    pub async fn run_remote(&self, command: &RemoteCommand) -> SedaResult<InvokeResponse> {
        let function_name = self.names.function_name()?;
        info!("在 {} 上执行远程命令", function_name);
        let request = InvokeRequest::new(function_name.clone(), command.payload());
        match self.client.invoke_function(&request).await {
            Err(err) if err.is_not_found() => Err(SedaError::FunctionNotFound {
                name: function_name,
            }),
            result => result,
        }
    }
}

impl std::fmt::Debug for TaskInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskInvoker")
            .field("region", &self.names.region())
            .field("function", &self.names.target().get())
            .finish()
    }
}
