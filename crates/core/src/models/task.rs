use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SedaError, SedaResult};

/// 任务路径
///
/// 任务的稳定寻址键，格式为 `<模块限定名>.<函数名>`。Rust 模块路径中的 `::`
/// 统一换成 `.`，因此 `my_app::jobs::send_email` 对应 `my_app.jobs.send_email`。
///
/// 通常通过 [`task_path!`](crate::task_path) 宏在声明处生成。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskPath {
    module: String,
    name: String,
}

impl TaskPath {
    /// 由模块路径与函数名构造
    pub fn new(module_path: &str, name: &str) -> Self {
        Self {
            module: module_path.replace("::", "."),
            name: name.to_string(),
        }
    }

    /// 解析点分路径，按最后一个 `.` 拆分模块与名称
    pub fn parse(path: &str) -> SedaResult<Self> {
        match path.rsplit_once('.') {
            Some((module, name)) if !module.is_empty() && !name.is_empty() => Ok(Self {
                module: module.to_string(),
                name: name.to_string(),
            }),
            _ => Err(SedaError::import_path(format!(
                "导入路径 \"{path}\" 必须是 \"<mod>.<attr>\" 格式"
            ))),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// 在调用处生成函数的 [`TaskPath`]
///
/// ```rust
/// fn send_email() {}
/// let path = seda_core::task_path!(send_email);
/// assert!(path.to_string().ends_with(".send_email"));
/// ```
#[macro_export]
macro_rules! task_path {
    ($func:ident) => {
        $crate::models::TaskPath::new(module_path!(), stringify!($func))
    };
}

/// 任务调用参数：位置参数、关键字参数，以及定时触发时附带的上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub context: Option<ScheduleContext>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// 按位置取参数并反序列化
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> SedaResult<T> {
        let value = self.args.get(index).cloned().ok_or_else(|| {
            SedaError::invalid_argument(format!("缺少第 {index} 个位置参数"))
        })?;
        Ok(serde_json::from_value(value)?)
    }

    /// 按名称取关键字参数，不存在时返回 None
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> SedaResult<Option<T>> {
        self.kwargs
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(SedaError::from)
    }
}

/// 结构化任务引用
///
/// 入站事件 `{"task": {...}}` 与出站消息共用此格式。`args`/`kwargs` 可为空或缺省。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTask {
    pub path: String,
    #[serde(default)]
    pub args: Option<Vec<Value>>,
    #[serde(default)]
    pub kwargs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ScheduleContext>,
}

impl EventTask {
    pub fn new(path: &TaskPath, args: &TaskArgs) -> Self {
        Self {
            path: path.to_string(),
            args: Some(args.args.clone()),
            kwargs: Some(args.kwargs.clone()),
            context: args.context.clone(),
        }
    }

    pub fn into_args(self) -> TaskArgs {
        TaskArgs {
            args: self.args.unwrap_or_default(),
            kwargs: self.kwargs.unwrap_or_default(),
            context: self.context,
        }
    }
}

/// `{"task": EventTask}` 信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: EventTask,
}

impl TaskEnvelope {
    pub fn new(task: EventTask) -> Self {
        Self { task }
    }

    pub fn to_value(&self) -> SedaResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// 定时器触发时附带的上下文
///
/// 前四个字段在创建定时任务时只是占位符，由远程调度器在触发时替换。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleContext {
    pub schedule_arn: String,
    pub scheduled_time: String,
    pub execution_id: String,
    pub attempt_number: String,
    pub expression: String,
}

impl ScheduleContext {
    pub const SCHEDULE_ARN: &'static str = "<aws.scheduler.schedule-arn>";
    pub const SCHEDULED_TIME: &'static str = "<aws.scheduler.scheduled-time>";
    pub const EXECUTION_ID: &'static str = "<aws.scheduler.execution-id>";
    pub const ATTEMPT_NUMBER: &'static str = "<aws.scheduler.attempt-number>";

    /// 创建定时任务时使用的占位上下文
    pub fn placeholders(expression: &str) -> Self {
        Self {
            schedule_arn: Self::SCHEDULE_ARN.to_string(),
            scheduled_time: Self::SCHEDULED_TIME.to_string(),
            execution_id: Self::EXECUTION_ID.to_string(),
            attempt_number: Self::ATTEMPT_NUMBER.to_string(),
            expression: expression.to_string(),
        }
    }
}
