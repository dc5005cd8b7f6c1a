//! 远程 API 的请求与响应文档
//!
//! 字段名沿用远程 API 的 PascalCase；响应里本系统用不到的字段直接忽略。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use seda_core::models::{ScheduleRetryPolicy, TimeWindow};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityResponse {
    pub account: String,
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub role_name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub function_arn: String,
    /// 执行角色 ARN
    pub role: String,
}

impl FunctionConfiguration {
    /// 执行角色名：角色 ARN 最后一个 `/` 之后的部分
    pub fn role_name(&self) -> &str {
        self.role.rsplit('/').next().unwrap_or(&self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionResponse {
    pub configuration: FunctionConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InvocationType {
    Event,
    #[default]
    RequestResponse,
    DryRun,
}

/// 函数调用请求
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub function_name: String,
    pub invocation_type: InvocationType,
    pub payload: Value,
    pub client_context: Value,
    /// 是否返回日志尾部
    pub tail_logs: bool,
    pub qualifier: String,
}

impl InvokeRequest {
    pub fn new(function_name: impl Into<String>, payload: Value) -> Self {
        Self {
            function_name: function_name.into(),
            invocation_type: InvocationType::RequestResponse,
            payload,
            client_context: Value::Object(Default::default()),
            tail_logs: true,
            qualifier: "$LATEST".to_string(),
        }
    }

    pub fn fire_and_forget(mut self) -> Self {
        self.invocation_type = InvocationType::Event;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeResponse {
    pub status_code: u16,
    /// base64 编码的日志尾部
    #[serde(default)]
    pub log_result: Option<String>,
    #[serde(default)]
    pub function_error: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddPermissionRequest {
    pub function_name: String,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleGroupResponse {
    pub name: String,
    #[serde(default)]
    pub arn: String,
    /// ACTIVE | DELETING
    pub state: String,
}

impl ScheduleGroupResponse {
    pub fn is_deleting(&self) -> bool {
        self.state == "DELETING"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateScheduleGroupResponse {
    pub schedule_group_arn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeadLetterConfig {
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleTarget {
    pub arn: String,
    pub role_arn: String,
    /// JSON 编码的输入
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_config: Option<DeadLetterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<ScheduleRetryPolicy>,
}

/// 创建定时任务的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateScheduleRequest {
    pub name: String,
    pub group_name: String,
    pub schedule_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_expression_timezone: Option<String>,
    pub flexible_time_window: TimeWindow,
    pub target: ScheduleTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateScheduleResponse {
    pub schedule_arn: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleResponse {
    pub name: String,
    pub group_name: String,
    #[serde(default)]
    pub arn: String,
    pub schedule_expression: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleSummary {
    pub name: String,
    pub group_name: String,
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSchedulesResponse {
    #[serde(default)]
    pub schedules: Vec<ScheduleSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTopicResponse {
    pub topic_arn: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscribeResponse {
    pub subscription_arn: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subscription {
    pub subscription_arn: String,
    pub topic_arn: String,
    pub protocol: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishResponse {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRolePoliciesResponse {
    #[serde(default)]
    pub policy_names: Vec<String>,
}
