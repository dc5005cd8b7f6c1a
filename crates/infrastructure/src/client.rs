use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use seda_core::models::PolicyDocument;
use seda_core::traits::{RemoteCallError, ServiceClient, Session};
use seda_core::{RemoteFailure, SedaError, SedaResult};

use crate::types::*;

pub const IAM: &str = "iam";
pub const LAMBDA: &str = "lambda";
pub const SCHEDULER: &str = "scheduler";
pub const SNS: &str = "sns";
pub const STS: &str = "sts";

/// 把远程错误码翻译为统一的错误分类
///
/// 只翻译各服务明确表示“已存在 / 不存在 / 校验失败”的错误码，其余一律归为
/// [`SedaError::Remote`]。
pub fn translate_error(service: &str, err: RemoteCallError) -> SedaError {
    let code = err.code.as_str();
    let failure = RemoteFailure::from(err.clone());
    match (service, code) {
        (IAM, "NoSuchEntity" | "NoSuchEntityException") => SedaError::NotFound(failure),
        (IAM, "EntityAlreadyExists" | "EntityAlreadyExistsException") => {
            SedaError::AlreadyExists(failure)
        }
        (LAMBDA, "ResourceNotFoundException") => SedaError::NotFound(failure),
        (LAMBDA, "ResourceConflictException") => SedaError::AlreadyExists(failure),
        (SCHEDULER, "ResourceNotFoundException") => SedaError::NotFound(failure),
        (SCHEDULER, "ConflictException") => SedaError::AlreadyExists(failure),
        (SCHEDULER, "ValidationException") => SedaError::Validation(failure),
        (SNS, "NotFound" | "NotFoundException") => SedaError::NotFound(failure),
        (SNS, "ConflictException") => SedaError::AlreadyExists(failure),
        _ => SedaError::Remote(failure),
    }
}

/// 远程资源管理 API 的门面
///
/// 每个方法只做一次远程调用（删除角色除外，它先逐个删除内联策略），并把错误翻译为
/// 统一分类。这里既不吞掉错误也不重试，重试由调用方按需叠加。
///
/// 各服务的连接在首次使用时创建并缓存，同一服务在门面生命周期内只创建一次。
pub struct RemoteClient {
    session: Arc<dyn Session>,
    clients: RwLock<HashMap<String, Arc<dyn ServiceClient>>>,
}

impl RemoteClient {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn region(&self) -> &str {
        self.session.region()
    }

    async fn client(&self, service: &str) -> SedaResult<Arc<dyn ServiceClient>> {
        if let Some(client) = self.clients.read().await.get(service) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(service) {
            return Ok(Arc::clone(client));
        }
        debug!(
            "创建 {} 服务连接 (profile={}, static_credentials={})",
            service,
            self.session.profile(),
            self.session.credentials().is_some()
        );
        let client = self.session.client(service)?;
        clients.insert(service.to_string(), Arc::clone(&client));
        Ok(client)
    }

    async fn call(&self, service: &str, operation: &str, input: Value) -> SedaResult<Value> {
        let client = self.client(service).await?;
        debug!("远程调用 {}:{}", service, operation);
        client
            .call(operation, input)
            .await
            .map_err(|err| translate_error(service, err))
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        input: Value,
    ) -> SedaResult<T> {
        let output = self.call(service, operation, input).await?;
        Ok(serde_json::from_value(output)?)
    }

    // ---- 身份 ----

    pub async fn get_identity(&self) -> SedaResult<IdentityResponse> {
        self.call_as(STS, "GetCallerIdentity", json!({})).await
    }

    // ---- 角色与策略 ----

    pub async fn get_role(&self, name: &str) -> SedaResult<RoleResponse> {
        self.call_as(IAM, "GetRole", json!({ "RoleName": name })).await
    }

    /// 创建角色并写入同名内联策略
    ///
    /// 内联策略被判定为格式错误时删除刚创建的角色，再把原错误抛出。
    pub async fn create_role(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
        policy: &PolicyDocument,
    ) -> SedaResult<RoleResponse> {
        let role: RoleResponse = self
            .call_as(
                IAM,
                "CreateRole",
                json!({
                    "RoleName": name,
                    "AssumeRolePolicyDocument": trust_policy.to_json()?,
                }),
            )
            .await?;

        if let Err(err) = self.put_role_policy(name, name, policy).await {
            let malformed = err
                .remote()
                .is_some_and(|f| f.code.starts_with("MalformedPolicyDocument"));
            if malformed {
                self.delete_role(name).await?;
            }
            return Err(err);
        }
        Ok(role)
    }

    pub async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy: &PolicyDocument,
    ) -> SedaResult<()> {
        self.call(
            IAM,
            "PutRolePolicy",
            json!({
                "RoleName": role_name,
                "PolicyName": policy_name,
                "PolicyDocument": policy.to_json()?,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn list_role_policies(&self, role_name: &str) -> SedaResult<Vec<String>> {
        let response: ListRolePoliciesResponse = self
            .call_as(IAM, "ListRolePolicies", json!({ "RoleName": role_name }))
            .await?;
        Ok(response.policy_names)
    }

    pub async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> SedaResult<()> {
        self.call(
            IAM,
            "DeleteRolePolicy",
            json!({ "RoleName": role_name, "PolicyName": policy_name }),
        )
        .await?;
        Ok(())
    }

    /// 删除角色，先删除其全部内联策略
    pub async fn delete_role(&self, name: &str) -> SedaResult<()> {
        for policy_name in self.list_role_policies(name).await? {
            self.delete_role_policy(name, &policy_name).await?;
        }
        self.call(IAM, "DeleteRole", json!({ "RoleName": name }))
            .await?;
        Ok(())
    }

    // ---- 函数 ----

    pub async fn get_function(&self, name: &str) -> SedaResult<FunctionResponse> {
        self.call_as(LAMBDA, "GetFunction", json!({ "FunctionName": name }))
            .await
    }

    pub async fn invoke_function(&self, request: &InvokeRequest) -> SedaResult<InvokeResponse> {
        let client_context = STANDARD.encode(serde_json::to_vec(&request.client_context)?);
        let mut input = json!({
            "FunctionName": request.function_name,
            "InvocationType": request.invocation_type,
            "ClientContext": client_context,
            "Payload": serde_json::to_string(&request.payload)?,
            "Qualifier": request.qualifier,
        });
        if request.tail_logs {
            input["LogType"] = json!("Tail");
        }
        self.call_as(LAMBDA, "Invoke", input).await
    }

    pub async fn add_permission(&self, request: &AddPermissionRequest) -> SedaResult<()> {
        self.call(LAMBDA, "AddPermission", serde_json::to_value(request)?)
            .await?;
        Ok(())
    }

    pub async fn remove_permission(&self, function_name: &str, statement_id: &str) -> SedaResult<()> {
        self.call(
            LAMBDA,
            "RemovePermission",
            json!({ "FunctionName": function_name, "StatementId": statement_id }),
        )
        .await?;
        Ok(())
    }

    // ---- 定时调度 ----

    pub async fn get_schedule_group(&self, name: &str) -> SedaResult<ScheduleGroupResponse> {
        self.call_as(SCHEDULER, "GetScheduleGroup", json!({ "Name": name }))
            .await
    }

    pub async fn create_schedule_group(&self, name: &str) -> SedaResult<CreateScheduleGroupResponse> {
        self.call_as(SCHEDULER, "CreateScheduleGroup", json!({ "Name": name }))
            .await
    }

    pub async fn delete_schedule_group(&self, name: &str) -> SedaResult<()> {
        self.call(SCHEDULER, "DeleteScheduleGroup", json!({ "Name": name }))
            .await?;
        Ok(())
    }

    pub async fn list_schedules(&self, group_name: &str) -> SedaResult<Vec<ScheduleSummary>> {
        let response: ListSchedulesResponse = self
            .call_as(SCHEDULER, "ListSchedules", json!({ "GroupName": group_name }))
            .await?;
        Ok(response.schedules)
    }

    pub async fn get_schedule(&self, name: &str, group_name: &str) -> SedaResult<ScheduleResponse> {
        self.call_as(
            SCHEDULER,
            "GetSchedule",
            json!({ "Name": name, "GroupName": group_name }),
        )
        .await
    }

    pub async fn create_schedule(
        &self,
        request: &CreateScheduleRequest,
    ) -> SedaResult<CreateScheduleResponse> {
        self.call_as(SCHEDULER, "CreateSchedule", serde_json::to_value(request)?)
            .await
    }

    pub async fn delete_schedule(&self, name: &str, group_name: &str) -> SedaResult<()> {
        self.call(
            SCHEDULER,
            "DeleteSchedule",
            json!({ "Name": name, "GroupName": group_name }),
        )
        .await?;
        Ok(())
    }

    // ---- 消息主题 ----

    pub async fn create_topic(&self, name: &str) -> SedaResult<CreateTopicResponse> {
        self.call_as(SNS, "CreateTopic", json!({ "Name": name })).await
    }

    pub async fn delete_topic(&self, topic_arn: &str) -> SedaResult<()> {
        self.call(SNS, "DeleteTopic", json!({ "TopicArn": topic_arn }))
            .await?;
        Ok(())
    }

    pub async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> SedaResult<SubscribeResponse> {
        self.call_as(
            SNS,
            "Subscribe",
            json!({ "TopicArn": topic_arn, "Protocol": protocol, "Endpoint": endpoint }),
        )
        .await
    }

    pub async fn list_subscriptions_by_topic(&self, topic_arn: &str) -> SedaResult<Vec<Subscription>> {
        let response: ListSubscriptionsResponse = self
            .call_as(SNS, "ListSubscriptionsByTopic", json!({ "TopicArn": topic_arn }))
            .await?;
        Ok(response.subscriptions)
    }

    pub async fn unsubscribe(&self, subscription_arn: &str) -> SedaResult<()> {
        self.call(SNS, "Unsubscribe", json!({ "SubscriptionArn": subscription_arn }))
            .await?;
        Ok(())
    }

    pub async fn publish(&self, target_arn: &str, message: &Value) -> SedaResult<PublishResponse> {
        self.call_as(
            SNS,
            "Publish",
            json!({ "TargetArn": target_arn, "Message": serde_json::to_string(message)? }),
        )
        .await
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("region", &self.session.region())
            .field("profile", &self.session.profile())
            .finish()
    }
}
