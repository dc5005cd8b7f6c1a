use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::task::{EventTask, ScheduleContext, TaskArgs, TaskEnvelope, TaskPath};
use crate::SedaResult;

/// 灵活时间窗口模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeWindowMode {
    #[default]
    Off,
    Flexible,
}

/// 灵活时间窗口，默认关闭
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TimeWindow {
    pub mode: TimeWindowMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_window_in_minutes: Option<u32>,
}

impl TimeWindow {
    pub fn flexible(maximum_window_in_minutes: u32) -> Self {
        Self {
            mode: TimeWindowMode::Flexible,
            maximum_window_in_minutes: Some(maximum_window_in_minutes),
        }
    }
}

/// 远程调度器在目标上执行的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleRetryPolicy {
    pub maximum_event_age_in_seconds: u32,
    pub maximum_retry_attempts: u32,
}

/// 调度表达式的形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    At,
    Rate,
    Cron,
    Other,
}

impl ExpressionKind {
    pub fn of(expression: &str) -> Self {
        let expression = expression.trim_start();
        if expression.starts_with("at(") {
            ExpressionKind::At
        } else if expression.starts_with("rate(") {
            ExpressionKind::Rate
        } else if expression.starts_with("cron(") {
            ExpressionKind::Cron
        } else {
            ExpressionKind::Other
        }
    }
}

/// 定时任务的可选参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleOptions {
    pub args: Option<Vec<Value>>,
    pub kwargs: Option<Map<String, Value>>,
    pub timezone: Option<String>,
    pub time_window: TimeWindow,
    pub dead_letter_arn: Option<String>,
    pub retry_policy: Option<ScheduleRetryPolicy>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub kms_key: Option<String>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = Some(kwargs);
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn time_window(mut self, time_window: TimeWindow) -> Self {
        self.time_window = time_window;
        self
    }

    pub fn dead_letter_arn(mut self, arn: impl Into<String>) -> Self {
        self.dead_letter_arn = Some(arn.into());
        self
    }

    pub fn retry_policy(mut self, max_event_age_seconds: u32, max_retry_attempts: u32) -> Self {
        self.retry_policy = Some(ScheduleRetryPolicy {
            maximum_event_age_in_seconds: max_event_age_seconds,
            maximum_retry_attempts: max_retry_attempts,
        });
        self
    }

    pub fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn kms_key(mut self, key: impl Into<String>) -> Self {
        self.kms_key = Some(key.into());
        self
    }
}

/// 绑定了触发表达式与调用参数的任务
///
/// 相等与哈希只看 [`ScheduleIdentity`]；`dead_letter_arn`、`retry_policy`、
/// `kms_key` 不参与判重。
#[derive(Debug, Clone)]
pub struct Schedule {
    pub path: TaskPath,
    pub expression: String,
    pub args: Option<Vec<Value>>,
    pub kwargs: Option<Map<String, Value>>,
    pub timezone: Option<String>,
    pub time_window: TimeWindow,
    pub dead_letter_arn: Option<String>,
    pub retry_policy: Option<ScheduleRetryPolicy>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub kms_key: Option<String>,
}

/// 定时任务的判重键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleIdentity {
    path: TaskPath,
    expression: String,
    args: Option<String>,
    kwargs: Option<String>,
    timezone: Option<String>,
    time_window: TimeWindow,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(path: TaskPath, expression: impl Into<String>, options: ScheduleOptions) -> Self {
        Self {
            path,
            expression: expression.into(),
            args: options.args,
            kwargs: options.kwargs,
            timezone: options.timezone,
            time_window: options.time_window,
            dead_letter_arn: options.dead_letter_arn,
            retry_policy: options.retry_policy,
            start_date: options.start_date,
            end_date: options.end_date,
            kms_key: options.kms_key,
        }
    }

    /// 在指定时间点触发一次，表达式精确到秒
    pub fn onetime(path: TaskPath, when: NaiveDateTime, options: ScheduleOptions) -> Self {
        let expression = format!("at({})", when.format("%Y-%m-%dT%H:%M:%S"));
        Self::new(path, expression, options)
    }

    pub fn kind(&self) -> ExpressionKind {
        ExpressionKind::of(&self.expression)
    }

    pub fn is_onetime(&self) -> bool {
        self.kind() == ExpressionKind::At
    }

    pub fn identity(&self) -> ScheduleIdentity {
        ScheduleIdentity {
            path: self.path.clone(),
            expression: self.expression.clone(),
            args: self.args.as_ref().map(|a| Value::from(a.clone()).to_string()),
            kwargs: self
                .kwargs
                .as_ref()
                .map(|k| Value::Object(k.clone()).to_string()),
            timezone: self.timezone.clone(),
            time_window: self.time_window,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// 远程调度器每次触发时投递给函数的输入
    pub fn target_input(&self) -> SedaResult<String> {
        let args = TaskArgs {
            args: self.args.clone().unwrap_or_default(),
            kwargs: self.kwargs.clone().unwrap_or_default(),
            context: Some(ScheduleContext::placeholders(&self.expression)),
        };
        let envelope = TaskEnvelope::new(EventTask::new(&self.path, &args));
        Ok(serde_json::to_string(&envelope)?)
    }
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Schedule {}

impl Hash for Schedule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@schedule {}({})>", self.path, self.expression)
    }
}
