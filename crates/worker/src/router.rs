//! 入站事件分发
//!
//! 按固定优先级匹配事件，命中第一个分支后不再继续：
//!
//! 1. `{"python": "<code>"}`: 交给代码执行器
//! 2. `{"shell": "<command>"}`: 作为子进程执行
//! 3. `{"task": {"path", "args", "kwargs"}}`: 按路径解析已注册任务并调用
//! 4. `{"Records": [{"Sns": {"Message": "<json>"}}]}`: 解开一层，消息中含 `task` 时按 3 处理
//! 5. 以上都不匹配：交给默认处理器；未配置时按 [`UnmatchedEventPolicy`] 处理
//!
//! 任务执行中的错误原样向上返回，由宿主运行时据此判定调用失败。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use seda_core::models::{EventTask, InvocationContext};
use seda_core::{DispatchConfig, SedaError, SedaResult, UnmatchedEventPolicy};
use seda_domain::TaskRegistry;

use crate::executors::{CodeExecutor, CommandExecutor, ShellExecutor};

const CODE_KEY: &str = "python";
const SHELL_KEY: &str = "shell";
const TASK_KEY: &str = "task";
const RECORDS_KEY: &str = "Records";

/// 没有分支匹配时接手事件的处理器，例如 Web 框架适配层
#[async_trait]
pub trait DefaultHandler: Send + Sync {
    async fn handle(&self, event: Value, context: &InvocationContext) -> SedaResult<Value>;
}

#[async_trait]
impl<F> DefaultHandler for F
where
    F: Fn(Value, &InvocationContext) -> SedaResult<Value> + Send + Sync,
{
    async fn handle(&self, event: Value, context: &InvocationContext) -> SedaResult<Value> {
        (self)(event, context)
    }
}

/// 去掉 HTTP 事件路径中的 API 基础路径，再交给内层默认处理器
///
/// 只改写 `path` 与 `rawPath` 两个字段；不以基础路径开头的路径保持不变。
pub struct BasePathHandler {
    base_path: String,
    inner: Arc<dyn DefaultHandler>,
}

impl BasePathHandler {
    pub fn new(base_path: &str, inner: Arc<dyn DefaultHandler>) -> Self {
        let trimmed = base_path.trim_matches('/');
        let base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { base_path, inner }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// 基础路径为 `/` 时不需要包装
    pub fn wrap(base_path: &str, inner: Arc<dyn DefaultHandler>) -> Arc<dyn DefaultHandler> {
        let handler = Self::new(base_path, inner);
        if handler.base_path.is_empty() {
            handler.inner
        } else {
            Arc::new(handler)
        }
    }

    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.base_path.is_empty() {
            return None;
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

#[async_trait]
impl DefaultHandler for BasePathHandler {
    async fn handle(&self, mut event: Value, context: &InvocationContext) -> SedaResult<Value> {
        for key in ["path", "rawPath"] {
            if let Some(Value::String(path)) = event.get_mut(key) {
                if let Some(stripped) = self.strip(path).map(str::to_string) {
                    *path = stripped;
                }
            }
        }
        self.inner.handle(event, context).await
    }
}

/// 事件匹配到的分支
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Code(String),
    Shell(String),
    Task(EventTask),
    Unmatched,
}

fn string_field(event: &Value, key: &str) -> SedaResult<String> {
    event
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SedaError::invalid_argument(format!("事件字段 {key} 必须是字符串")))
}

fn task_field(value: &Value) -> SedaResult<EventTask> {
    serde_json::from_value(value.clone())
        .map_err(|e| SedaError::invalid_argument(format!("任务引用格式错误: {e}")))
}

/// 判定事件走哪个分支
pub fn route(event: &Value) -> SedaResult<Route> {
    if event.get(CODE_KEY).is_some() {
        return Ok(Route::Code(string_field(event, CODE_KEY)?));
    }
    if event.get(SHELL_KEY).is_some() {
        return Ok(Route::Shell(string_field(event, SHELL_KEY)?));
    }
    if let Some(task) = event.get(TASK_KEY) {
        return Ok(Route::Task(task_field(task)?));
    }

    let message = event
        .get(RECORDS_KEY)
        .and_then(|records| records.get(0))
        .and_then(|record| record.get("Sns"))
        .and_then(|sns| sns.get("Message"))
        .and_then(Value::as_str);
    if let Some(message) = message {
        let message: Value = serde_json::from_str(message)?;
        if let Some(task) = message.get(TASK_KEY) {
            return Ok(Route::Task(task_field(task)?));
        }
    }
    Ok(Route::Unmatched)
}

/// 入站事件分发器
pub struct DispatchRouter {
    registry: Arc<TaskRegistry>,
    code: Arc<dyn CommandExecutor>,
    shell: Arc<dyn CommandExecutor>,
    default_handler: Option<Arc<dyn DefaultHandler>>,
    unmatched: UnmatchedEventPolicy,
}

impl DispatchRouter {
    pub fn new(registry: Arc<TaskRegistry>, config: &DispatchConfig) -> Self {
        Self {
            registry,
            code: Arc::new(CodeExecutor::new(&config.code_interpreter)),
            shell: Arc::new(ShellExecutor::new()),
            default_handler: None,
            unmatched: config.unmatched_event,
        }
    }

    pub fn with_default_handler(mut self, handler: Arc<dyn DefaultHandler>) -> Self {
        self.default_handler = Some(handler);
        self
    }

    pub fn with_shell_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.shell = executor;
        self
    }

    pub fn with_code_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.code = executor;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    async fn run_task(&self, task: EventTask) -> SedaResult<Value> {
        let handler = self.registry.resolve(&task.path)?;
        info!("执行任务 {}", task.path);
        handler.invoke(task.into_args()).await
    }

    /// 处理一个入站事件；不匹配且被忽略时返回 `None`
    pub async fn handle(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> SedaResult<Option<Value>> {
        match route(&event)? {
            Route::Code(code) => {
                let output = self.code.execute(&code).await?;
                output.to_value().map(Some)
            }
            Route::Shell(command) => {
                let output = self.shell.execute(&command).await?;
                output.to_value().map(Some)
            }
            Route::Task(task) => self.run_task(task).await.map(Some),
            Route::Unmatched => match &self.default_handler {
                Some(handler) => handler.handle(event, context).await.map(Some),
                None => match self.unmatched {
                    UnmatchedEventPolicy::Ignore => {
                        debug!("事件未匹配任何分支，忽略");
                        Ok(None)
                    }
                    UnmatchedEventPolicy::Reject => Err(SedaError::invalid_argument(
                        "事件未匹配任何分支且未配置默认处理器",
                    )),
                },
            },
        }
    }

    /// 在独立线程的单线程运行时中处理事件，运行时随本次调用结束
    ///
    /// 供同步的宿主入口使用；调用方已处于某个运行时内时同样可用，不会嵌套阻塞。
    pub fn handle_blocking(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> SedaResult<Option<Value>> {
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| SedaError::Internal(format!("创建运行时失败: {e}")))?;
                    runtime.block_on(self.handle(event, context))
                })
                .join()
                .map_err(|_| SedaError::Internal("事件处理线程发生 panic".to_string()))?
        })
    }
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRouter")
            .field("code", &self.code.name())
            .field("shell", &self.shell.name())
            .field("default_handler", &self.default_handler.is_some())
            .field("unmatched", &self.unmatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_priority() {
        let event = json!({
            "task": { "path": "a.b" },
            "shell": "ls",
            "python": "print(1)",
        });
        assert_eq!(route(&event).unwrap(), Route::Code("print(1)".into()));

        let event = json!({ "task": { "path": "a.b" }, "shell": "ls" });
        assert_eq!(route(&event).unwrap(), Route::Shell("ls".into()));
    }

    #[test]
    fn test_route_unwraps_topic_record() {
        let message = json!({ "task": { "path": "a.b", "args": [1] } }).to_string();
        let event = json!({ "Records": [{ "Sns": { "Message": message } }] });

        match route(&event).unwrap() {
            Route::Task(task) => {
                assert_eq!(task.path, "a.b");
                assert_eq!(task.args, Some(vec![json!(1)]));
            }
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[test]
    fn test_route_records_without_task() {
        let message = json!({ "other": true }).to_string();
        let event = json!({ "Records": [{ "Sns": { "Message": message } }] });
        assert_eq!(route(&event).unwrap(), Route::Unmatched);

        let event = json!({ "Records": [{ "s3": {} }] });
        assert_eq!(route(&event).unwrap(), Route::Unmatched);
        assert_eq!(route(&json!({ "path": "/" })).unwrap(), Route::Unmatched);
    }

    #[test]
    fn test_route_rejects_malformed_fields() {
        assert!(matches!(
            route(&json!({ "shell": 42 })),
            Err(SedaError::InvalidArgument(_))
        ));
        assert!(matches!(
            route(&json!({ "task": { "args": [] } })),
            Err(SedaError::InvalidArgument(_))
        ));
        let event = json!({ "Records": [{ "Sns": { "Message": "not json" } }] });
        assert!(matches!(route(&event), Err(SedaError::Serialization(_))));
    }
}
