//! 内存云会话
//!
//! 在进程内模拟角色、函数、定时分组、定时任务与消息主题构成的资源图，错误码与真实
//! 服务一致。用于测试和本地演练对账流程，支持:
//! - 分组删除延迟：删除后分组先处于 `DELETING`，被查询若干次后才真正消失
//! - 角色生效延迟：新建角色后，前若干次引用它的定时任务创建会被拒绝
//! - 故障注入：[`InMemoryCloud::fail_next`]
//! - 调用日志：记录每次远程调用，供断言使用

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::debug;

use seda_core::traits::{Credentials, RemoteCallError, ServiceClient, Session};
use seda_core::{SedaError, SedaResult};

use crate::client::{IAM, LAMBDA, SCHEDULER, SNS, STS};
use crate::types::CreateScheduleRequest;

const ROLE_NOT_ASSUMABLE: &str =
    "The execution role you provide must allow AWS EventBridge Scheduler to assume the role.";

/// 一次远程调用的记录
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub service: String,
    pub operation: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub target_arn: String,
    pub message: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function_name: String,
    pub invocation_type: String,
    pub payload: Value,
}

/// 资源图快照，不含随机生成的定时任务名
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudSnapshot {
    /// 角色名 -> 内联策略名
    pub roles: BTreeMap<String, Vec<String>>,
    /// 分组名 -> 状态
    pub groups: BTreeMap<String, String>,
    /// 分组名 -> 定时表达式
    pub schedules: BTreeMap<String, Vec<String>>,
    /// 主题 ARN -> 订阅端点
    pub topics: BTreeMap<String, Vec<String>>,
    /// 函数名 -> 权限语句 ID
    pub permissions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
struct RoleState {
    arn: String,
    policies: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct FunctionState {
    arn: String,
    role_arn: String,
    permissions: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupState {
    Active,
    /// 还要被查询多少次才真正删除
    Deleting(u32),
}

#[derive(Debug, Clone)]
struct Group {
    arn: String,
    state: GroupState,
}

#[derive(Debug, Clone)]
struct SubscriptionState {
    arn: String,
    protocol: String,
    endpoint: String,
}

#[derive(Debug, Clone, Default)]
struct Topic {
    subscriptions: Vec<SubscriptionState>,
}

#[derive(Debug)]
struct Fault {
    service: String,
    operation: String,
    error: RemoteCallError,
}

#[derive(Debug, Default)]
struct CloudState {
    region: String,
    account_id: String,
    /// 配置了静态凭证时身份查询返回其访问密钥
    access_key_id: Option<String>,
    roles: BTreeMap<String, RoleState>,
    functions: BTreeMap<String, FunctionState>,
    groups: BTreeMap<String, Group>,
    schedules: BTreeMap<(String, String), CreateScheduleRequest>,
    topics: BTreeMap<String, Topic>,
    published: Vec<PublishedMessage>,
    invocations: Vec<Invocation>,
    journal: Vec<CallRecord>,
    faults: VecDeque<Fault>,
    client_creations: BTreeMap<String, usize>,
    group_deletion_lag: u32,
    role_propagation_delay: u32,
    /// 角色 ARN -> 剩余的拒绝次数
    pending_roles: BTreeMap<String, u32>,
    invoke_log: String,
    next_id: u64,
}

type CallResult = Result<Value, RemoteCallError>;

fn fail(operation: &str, code: &str, message: impl Into<String>, status: u16) -> RemoteCallError {
    RemoteCallError::new(operation, code, message, status)
}

fn field<'a>(operation: &str, input: &'a Value, key: &str) -> Result<&'a str, RemoteCallError> {
    input.get(key).and_then(Value::as_str).ok_or_else(|| {
        fail(
            operation,
            "ValidationException",
            format!("1 validation error detected: {key} must not be null"),
            400,
        )
    })
}

fn parse_json_field(operation: &str, input: &Value, key: &str) -> CallResult {
    let raw = field(operation, input, key)?;
    serde_json::from_str(raw)
        .map_err(|e| fail(operation, "ValidationException", format!("{key}: {e}"), 400))
}

impl CloudState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        let region = if service == IAM { "" } else { self.region.as_str() };
        format!("arn:aws:{service}:{region}:{}:{resource}", self.account_id)
    }

    fn take_fault(&mut self, service: &str, operation: &str) -> Option<RemoteCallError> {
        let index = self
            .faults
            .iter()
            .position(|f| f.service == service && f.operation == operation)?;
        self.faults.remove(index).map(|f| f.error)
    }

    fn handle(&mut self, service: &str, operation: &str, input: Value) -> CallResult {
        self.journal.push(CallRecord {
            service: service.to_string(),
            operation: operation.to_string(),
            input: input.clone(),
        });
        if let Some(error) = self.take_fault(service, operation) {
            return Err(error);
        }

        match service {
            STS => self.sts(operation),
            IAM => self.iam(operation, &input),
            LAMBDA => self.lambda(operation, &input),
            SCHEDULER => self.scheduler(operation, &input),
            SNS => self.sns(operation, &input),
            _ => Err(fail(operation, "UnknownService", service, 400)),
        }
    }

    fn sts(&mut self, operation: &str) -> CallResult {
        match operation {
            "GetCallerIdentity" => Ok(json!({
                "Account": self.account_id,
                "Arn": self.arn(IAM, "user/seda"),
                "UserId": self.access_key_id.as_deref().unwrap_or("AIDASEDAMEMORY"),
            })),
            _ => Err(fail(operation, "InvalidAction", operation, 400)),
        }
    }

    fn role_missing(operation: &str, name: &str) -> RemoteCallError {
        fail(
            operation,
            "NoSuchEntity",
            format!("The role with name {name} cannot be found."),
            404,
        )
    }

    fn iam(&mut self, operation: &str, input: &Value) -> CallResult {
        let role_name = field(operation, input, "RoleName")?.to_string();
        match operation {
            "GetRole" => {
                let role = self
                    .roles
                    .get(&role_name)
                    .ok_or_else(|| Self::role_missing(operation, &role_name))?;
                Ok(json!({ "Role": { "RoleName": role_name, "Arn": role.arn } }))
            }
            "CreateRole" => {
                if self.roles.contains_key(&role_name) {
                    return Err(fail(
                        operation,
                        "EntityAlreadyExists",
                        format!("Role with name {role_name} already exists."),
                        409,
                    ));
                }
                parse_json_field(operation, input, "AssumeRolePolicyDocument").map_err(|e| {
                    fail(operation, "MalformedPolicyDocument", e.message, 400)
                })?;
                let arn = self.arn(IAM, &format!("role/{role_name}"));
                if self.role_propagation_delay > 0 {
                    self.pending_roles
                        .insert(arn.clone(), self.role_propagation_delay);
                }
                self.roles.insert(
                    role_name.clone(),
                    RoleState {
                        arn: arn.clone(),
                        policies: BTreeMap::new(),
                    },
                );
                Ok(json!({ "Role": { "RoleName": role_name, "Arn": arn } }))
            }
            "PutRolePolicy" => {
                let policy_name = field(operation, input, "PolicyName")?.to_string();
                let document = parse_json_field(operation, input, "PolicyDocument")
                    .ok()
                    .filter(|doc| doc.get("Version").is_some() && doc.get("Statement").is_some())
                    .ok_or_else(|| {
                        fail(
                            operation,
                            "MalformedPolicyDocument",
                            "Syntax errors in policy.",
                            400,
                        )
                    })?;
                let role = self
                    .roles
                    .get_mut(&role_name)
                    .ok_or_else(|| Self::role_missing(operation, &role_name))?;
                role.policies.insert(policy_name, document);
                Ok(json!({}))
            }
            "ListRolePolicies" => {
                let role = self
                    .roles
                    .get(&role_name)
                    .ok_or_else(|| Self::role_missing(operation, &role_name))?;
                Ok(json!({ "PolicyNames": role.policies.keys().collect::<Vec<_>>() }))
            }
            "DeleteRolePolicy" => {
                let policy_name = field(operation, input, "PolicyName")?;
                let role = self
                    .roles
                    .get_mut(&role_name)
                    .ok_or_else(|| Self::role_missing(operation, &role_name))?;
                role.policies.remove(policy_name).ok_or_else(|| {
                    fail(
                        operation,
                        "NoSuchEntity",
                        format!("The role policy with name {policy_name} cannot be found."),
                        404,
                    )
                })?;
                Ok(json!({}))
            }
            "DeleteRole" => {
                let role = self
                    .roles
                    .get(&role_name)
                    .ok_or_else(|| Self::role_missing(operation, &role_name))?;
                if !role.policies.is_empty() {
                    return Err(fail(
                        operation,
                        "DeleteConflict",
                        "Cannot delete entity, must delete policies first.",
                        409,
                    ));
                }
                let arn = role.arn.clone();
                self.roles.remove(&role_name);
                self.pending_roles.remove(&arn);
                Ok(json!({}))
            }
            _ => Err(fail(operation, "InvalidAction", operation, 400)),
        }
    }

    fn lambda(&mut self, operation: &str, input: &Value) -> CallResult {
        let name = field(operation, input, "FunctionName")?.to_string();
        let not_found = || {
            fail(
                operation,
                "ResourceNotFoundException",
                format!("Function not found: {name}"),
                404,
            )
        };
        match operation {
            "GetFunction" => {
                let function = self.functions.get(&name).ok_or_else(not_found)?;
                Ok(json!({
                    "Configuration": {
                        "FunctionName": name,
                        "FunctionArn": function.arn,
                        "Role": function.role_arn,
                    }
                }))
            }
            "AddPermission" => {
                let statement_id = field(operation, input, "StatementId")?.to_string();
                let function = self.functions.get_mut(&name).ok_or_else(not_found)?;
                if function.permissions.contains_key(&statement_id) {
                    return Err(fail(
                        operation,
                        "ResourceConflictException",
                        format!("The statement id ({statement_id}) provided already exists."),
                        409,
                    ));
                }
                function.permissions.insert(statement_id, input.clone());
                Ok(json!({}))
            }
            "RemovePermission" => {
                let statement_id = field(operation, input, "StatementId")?.to_string();
                let function = self.functions.get_mut(&name).ok_or_else(not_found)?;
                function.permissions.remove(&statement_id).ok_or_else(|| {
                    fail(
                        operation,
                        "ResourceNotFoundException",
                        "No policy is associated with the given resource.",
                        404,
                    )
                })?;
                Ok(json!({}))
            }
            "Invoke" => {
                if !self.functions.contains_key(&name) {
                    return Err(not_found());
                }
                let invocation_type = input
                    .get("InvocationType")
                    .and_then(Value::as_str)
                    .unwrap_or("RequestResponse")
                    .to_string();
                let payload = parse_json_field(operation, input, "Payload")?;
                let tail = input.get("LogType").and_then(Value::as_str) == Some("Tail");
                let is_event = invocation_type == "Event";
                self.invocations.push(Invocation {
                    function_name: name,
                    invocation_type,
                    payload,
                });

                let mut output = json!({ "StatusCode": if is_event { 202 } else { 200 } });
                if tail && !is_event {
                    output["LogResult"] = json!(STANDARD.encode(self.invoke_log.as_bytes()));
                }
                Ok(output)
            }
            _ => Err(fail(operation, "InvalidAction", operation, 400)),
        }
    }

    fn group_missing(operation: &str, name: &str) -> RemoteCallError {
        fail(
            operation,
            "ResourceNotFoundException",
            format!("Schedule group {name} does not exist."),
            404,
        )
    }

    fn scheduler(&mut self, operation: &str, input: &Value) -> CallResult {
        match operation {
            "GetScheduleGroup" => {
                let name = field(operation, input, "Name")?.to_string();
                let current = self
                    .groups
                    .get(&name)
                    .map(|g| g.state.clone())
                    .ok_or_else(|| Self::group_missing(operation, &name))?;
                let next = match current {
                    GroupState::Deleting(0) => {
                        self.groups.remove(&name);
                        return Err(Self::group_missing(operation, &name));
                    }
                    GroupState::Deleting(remaining) => GroupState::Deleting(remaining - 1),
                    GroupState::Active => GroupState::Active,
                };
                let label = if next == GroupState::Active { "ACTIVE" } else { "DELETING" };
                let mut arn = String::new();
                if let Some(group) = self.groups.get_mut(&name) {
                    group.state = next;
                    arn = group.arn.clone();
                }
                Ok(json!({ "Name": name, "Arn": arn, "State": label }))
            }
            "CreateScheduleGroup" => {
                let name = field(operation, input, "Name")?.to_string();
                if self.groups.contains_key(&name) {
                    return Err(fail(
                        operation,
                        "ConflictException",
                        format!("Schedule group {name} already exists."),
                        409,
                    ));
                }
                let arn = self.arn(SCHEDULER, &format!("schedule-group/{name}"));
                self.groups.insert(
                    name,
                    Group {
                        arn: arn.clone(),
                        state: GroupState::Active,
                    },
                );
                Ok(json!({ "ScheduleGroupArn": arn }))
            }
            "DeleteScheduleGroup" => {
                let name = field(operation, input, "Name")?.to_string();
                match self.groups.get(&name).map(|g| g.state.clone()) {
                    Some(GroupState::Active) => {}
                    _ => return Err(Self::group_missing(operation, &name)),
                }
                self.schedules.retain(|(group, _), _| group != &name);
                if self.group_deletion_lag == 0 {
                    self.groups.remove(&name);
                } else if let Some(group) = self.groups.get_mut(&name) {
                    group.state = GroupState::Deleting(self.group_deletion_lag);
                }
                Ok(json!({}))
            }
            "ListSchedules" => {
                let group_name = field(operation, input, "GroupName")?.to_string();
                if !self.groups.contains_key(&group_name) {
                    return Err(Self::group_missing(operation, &group_name));
                }
                let schedules: Vec<Value> = self
                    .schedules
                    .iter()
                    .filter(|((group, _), _)| group == &group_name)
                    .map(|((group, name), _)| {
                        json!({
                            "Name": name,
                            "GroupName": group,
                            "Arn": self.arn(SCHEDULER, &format!("schedule/{group}/{name}")),
                            "State": "ENABLED",
                        })
                    })
                    .collect();
                Ok(json!({ "Schedules": schedules }))
            }
            "GetSchedule" => {
                let name = field(operation, input, "Name")?.to_string();
                let group_name = field(operation, input, "GroupName")?.to_string();
                let schedule = self
                    .schedules
                    .get(&(group_name.clone(), name.clone()))
                    .ok_or_else(|| {
                        fail(
                            operation,
                            "ResourceNotFoundException",
                            format!("Schedule {name} does not exist."),
                            404,
                        )
                    })?;
                Ok(json!({
                    "Name": name,
                    "GroupName": group_name,
                    "Arn": self.arn(SCHEDULER, &format!("schedule/{group_name}/{name}")),
                    "ScheduleExpression": schedule.schedule_expression,
                    "State": "ENABLED",
                }))
            }
            "CreateSchedule" => self.create_schedule(operation, input),
            "DeleteSchedule" => {
                let name = field(operation, input, "Name")?.to_string();
                let group_name = field(operation, input, "GroupName")?.to_string();
                self.schedules.remove(&(group_name, name.clone())).ok_or_else(|| {
                    fail(
                        operation,
                        "ResourceNotFoundException",
                        format!("Schedule {name} does not exist."),
                        404,
                    )
                })?;
                Ok(json!({}))
            }
            _ => Err(fail(operation, "InvalidAction", operation, 400)),
        }
    }

    fn create_schedule(&mut self, operation: &str, input: &Value) -> CallResult {
        let request: CreateScheduleRequest = serde_json::from_value(input.clone())
            .map_err(|e| fail(operation, "ValidationException", e.to_string(), 400))?;

        match self.groups.get(&request.group_name) {
            Some(group) if group.state == GroupState::Active => {}
            _ => return Err(Self::group_missing(operation, &request.group_name)),
        }

        let role_arn = request.target.role_arn.clone();
        let role_exists = self.roles.values().any(|role| role.arn == role_arn);
        if !role_exists {
            return Err(fail(operation, "ValidationException", ROLE_NOT_ASSUMABLE, 400));
        }
        if let Some(remaining) = self.pending_roles.get_mut(&role_arn) {
            *remaining -= 1;
            if *remaining == 0 {
                self.pending_roles.remove(&role_arn);
            }
            return Err(fail(operation, "ValidationException", ROLE_NOT_ASSUMABLE, 400));
        }

        let expression = request.schedule_expression.as_str();
        if !["at(", "rate(", "cron("]
            .iter()
            .any(|prefix| expression.starts_with(prefix))
        {
            return Err(fail(
                operation,
                "ValidationException",
                format!("Invalid Schedule Expression {expression}."),
                400,
            ));
        }

        let key = (request.group_name.clone(), request.name.clone());
        if self.schedules.contains_key(&key) {
            return Err(fail(
                operation,
                "ConflictException",
                format!("Schedule {} already exists.", request.name),
                409,
            ));
        }
        let arn = self.arn(SCHEDULER, &format!("schedule/{}/{}", key.0, key.1));
        self.schedules.insert(key, request);
        Ok(json!({ "ScheduleArn": arn }))
    }

    fn topic_missing(operation: &str) -> RemoteCallError {
        fail(operation, "NotFound", "Topic does not exist", 404)
    }

    fn sns(&mut self, operation: &str, input: &Value) -> CallResult {
        match operation {
            "CreateTopic" => {
                let name = field(operation, input, "Name")?;
                let arn = self.arn(SNS, name);
                if self.topics.contains_key(&arn) {
                    return Err(fail(
                        operation,
                        "ConflictException",
                        format!("Topic {name} already exists."),
                        409,
                    ));
                }
                self.topics.insert(arn.clone(), Topic::default());
                Ok(json!({ "TopicArn": arn }))
            }
            "DeleteTopic" => {
                let arn = field(operation, input, "TopicArn")?;
                self.topics
                    .remove(arn)
                    .ok_or_else(|| Self::topic_missing(operation))?;
                Ok(json!({}))
            }
            "Subscribe" => {
                let topic_arn = field(operation, input, "TopicArn")?.to_string();
                let protocol = field(operation, input, "Protocol")?.to_string();
                let endpoint = field(operation, input, "Endpoint")?.to_string();
                let id = self.next_id();
                let topic = self
                    .topics
                    .get_mut(&topic_arn)
                    .ok_or_else(|| Self::topic_missing(operation))?;
                if let Some(existing) = topic
                    .subscriptions
                    .iter()
                    .find(|s| s.protocol == protocol && s.endpoint == endpoint)
                {
                    return Ok(json!({ "SubscriptionArn": existing.arn }));
                }
                let arn = format!("{topic_arn}:{id:08}");
                topic.subscriptions.push(SubscriptionState {
                    arn: arn.clone(),
                    protocol,
                    endpoint,
                });
                Ok(json!({ "SubscriptionArn": arn }))
            }
            "ListSubscriptionsByTopic" => {
                let topic_arn = field(operation, input, "TopicArn")?;
                let topic = self
                    .topics
                    .get(topic_arn)
                    .ok_or_else(|| Self::topic_missing(operation))?;
                let subscriptions: Vec<Value> = topic
                    .subscriptions
                    .iter()
                    .map(|s| {
                        json!({
                            "SubscriptionArn": s.arn,
                            "TopicArn": topic_arn,
                            "Protocol": s.protocol,
                            "Endpoint": s.endpoint,
                        })
                    })
                    .collect();
                Ok(json!({ "Subscriptions": subscriptions }))
            }
            "Unsubscribe" => {
                let arn = field(operation, input, "SubscriptionArn")?;
                let topic = self
                    .topics
                    .values_mut()
                    .find(|t| t.subscriptions.iter().any(|s| s.arn == arn))
                    .ok_or_else(|| fail(operation, "NotFound", "Subscription does not exist", 404))?;
                topic.subscriptions.retain(|s| s.arn != arn);
                Ok(json!({}))
            }
            "Publish" => {
                let target_arn = field(operation, input, "TargetArn")?.to_string();
                if !self.topics.contains_key(&target_arn) {
                    return Err(Self::topic_missing(operation));
                }
                let message = parse_json_field(operation, input, "Message")?;
                self.published.push(PublishedMessage {
                    target_arn,
                    message,
                });
                let id = self.next_id();
                Ok(json!({ "MessageId": format!("{id:08}") }))
            }
            _ => Err(fail(operation, "InvalidAction", operation, 400)),
        }
    }
}

/// 内存云会话
#[derive(Debug, Clone)]
pub struct InMemoryCloud {
    region: String,
    profile: String,
    credentials: Option<Credentials>,
    state: Arc<Mutex<CloudState>>,
}

impl InMemoryCloud {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        let region = region.into();
        let state = CloudState {
            region: region.clone(),
            account_id: account_id.into(),
            ..CloudState::default()
        };
        Self {
            region,
            profile: "memory".to_string(),
            credentials: None,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.lock().access_key_id = Some(credentials.access_key_id.clone());
        self.credentials = Some(credentials);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 删除分组后，分组还会以 `DELETING` 状态被查询到 `polls` 次
    pub fn with_group_deletion_lag(self, polls: u32) -> Self {
        self.lock().group_deletion_lag = polls;
        self
    }

    /// 新建角色后，前 `rejections` 次引用它的定时任务创建会被拒绝
    pub fn with_role_propagation_delay(self, rejections: u32) -> Self {
        self.lock().role_propagation_delay = rejections;
        self
    }

    pub fn account_id(&self) -> String {
        self.lock().account_id.clone()
    }

    /// 部署一个函数及其执行角色 `<name>-role`，返回函数 ARN
    pub fn add_function(&self, name: &str) -> String {
        let mut state = self.lock();
        let role_name = format!("{name}-role");
        let role_arn = state.arn(IAM, &format!("role/{role_name}"));
        let function_arn = state.arn(LAMBDA, &format!("function:{name}"));
        state.roles.entry(role_name).or_insert_with(|| RoleState {
            arn: role_arn.clone(),
            policies: BTreeMap::new(),
        });
        state.functions.insert(
            name.to_string(),
            FunctionState {
                arn: function_arn.clone(),
                role_arn,
                permissions: BTreeMap::new(),
            },
        );
        function_arn
    }

    pub fn remove_function(&self, name: &str) {
        self.lock().functions.remove(name);
    }

    /// 函数被同步调用时返回的日志尾部（明文，返回时做 base64 编码）
    pub fn set_invoke_log(&self, log: impl Into<String>) {
        self.lock().invoke_log = log.into();
    }

    /// 下一次 `service:operation` 调用返回给定错误
    pub fn fail_next(&self, service: &str, operation: &str, error: RemoteCallError) {
        self.lock().faults.push_back(Fault {
            service: service.to_string(),
            operation: operation.to_string(),
            error,
        });
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().journal.clone()
    }

    pub fn call_count(&self, service: &str, operation: &str) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|c| c.service == service && c.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().journal.clear();
    }

    /// 为某个服务创建连接的次数
    pub fn client_creations(&self, service: &str) -> usize {
        self.lock().client_creations.get(service).copied().unwrap_or(0)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.lock().roles.contains_key(name)
    }

    pub fn role_policy(&self, role_name: &str, policy_name: &str) -> Option<Value> {
        self.lock()
            .roles
            .get(role_name)
            .and_then(|r| r.policies.get(policy_name).cloned())
    }

    pub fn group_state(&self, name: &str) -> Option<String> {
        self.lock().groups.get(name).map(|g| match g.state {
            GroupState::Active => "ACTIVE".to_string(),
            GroupState::Deleting(_) => "DELETING".to_string(),
        })
    }

    pub fn schedules(&self, group_name: &str) -> Vec<CreateScheduleRequest> {
        self.lock()
            .schedules
            .iter()
            .filter(|((group, _), _)| group == group_name)
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn topic_arns(&self) -> Vec<String> {
        self.lock().topics.keys().cloned().collect()
    }

    pub fn subscription_endpoints(&self, topic_arn: &str) -> Vec<String> {
        self.lock()
            .topics
            .get(topic_arn)
            .map(|t| t.subscriptions.iter().map(|s| s.endpoint.clone()).collect())
            .unwrap_or_default()
    }

    pub fn permission(&self, function_name: &str, statement_id: &str) -> Option<Value> {
        self.lock()
            .functions
            .get(function_name)
            .and_then(|f| f.permissions.get(statement_id).cloned())
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    pub fn snapshot(&self) -> CloudSnapshot {
        let state = self.lock();
        let mut snapshot = CloudSnapshot::default();
        for (name, role) in &state.roles {
            snapshot
                .roles
                .insert(name.clone(), role.policies.keys().cloned().collect());
        }
        for (name, group) in &state.groups {
            let label = match group.state {
                GroupState::Active => "ACTIVE",
                GroupState::Deleting(_) => "DELETING",
            };
            snapshot.groups.insert(name.clone(), label.to_string());
        }
        for ((group, _), request) in &state.schedules {
            snapshot
                .schedules
                .entry(group.clone())
                .or_default()
                .push(request.schedule_expression.clone());
        }
        for expressions in snapshot.schedules.values_mut() {
            expressions.sort();
        }
        for (arn, topic) in &state.topics {
            snapshot.topics.insert(
                arn.clone(),
                topic.subscriptions.iter().map(|s| s.endpoint.clone()).collect(),
            );
        }
        for (name, function) in &state.functions {
            snapshot
                .permissions
                .insert(name.clone(), function.permissions.keys().cloned().collect());
        }
        snapshot
    }
}

impl Session for InMemoryCloud {
    fn region(&self) -> &str {
        &self.region
    }

    fn profile(&self) -> &str {
        &self.profile
    }

    fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn client(&self, service: &str) -> SedaResult<Arc<dyn ServiceClient>> {
        if ![IAM, LAMBDA, SCHEDULER, SNS, STS].contains(&service) {
            return Err(SedaError::config_error(format!("内存云不支持服务: {service}")));
        }
        *self
            .lock()
            .client_creations
            .entry(service.to_string())
            .or_insert(0) += 1;
        debug!("内存云创建 {} 连接", service);
        Ok(Arc::new(MemoryServiceClient {
            service: service.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryServiceClient {
    service: String,
    state: Arc<Mutex<CloudState>>,
}

#[async_trait]
impl ServiceClient for MemoryServiceClient {
    async fn call(&self, operation: &str, input: Value) -> Result<Value, RemoteCallError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.handle(&self.service, operation, input)
    }
}
