use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use seda_core::models::{PolicyDocument, Schedule};
use seda_core::{ReconcileConfig, ResourceNames, RetryPolicy, SedaError, SedaResult};
use seda_infrastructure::types::{
    AddPermissionRequest, CreateScheduleGroupResponse, CreateScheduleRequest,
    CreateScheduleResponse, DeadLetterConfig, FunctionResponse, RoleResponse,
    ScheduleGroupResponse, ScheduleTarget,
};
use seda_infrastructure::{RemoteClient, ResourceLocator};

const TOPIC_PROTOCOL: &str = "lambda";
const INVOKE_ACTION: &str = "lambda:InvokeFunction";
const TOPIC_PRINCIPAL: &str = "sns.amazonaws.com";

/// 函数依赖的各项远程资源
///
/// 每个方法只处理一项资源，错误原样返回；哪些错误可以忽略由
/// [`crate::Reconciler`] 按步骤决定。资源名每次都按当前目标函数重新解析。
pub struct StackResources {
    client: Arc<RemoteClient>,
    locator: Arc<ResourceLocator>,
    names: ResourceNames,
    schedule_retry: RetryPolicy,
    group_poll_delay: Duration,
    group_max_polls: u32,
}

impl StackResources {
    pub fn new(
        client: Arc<RemoteClient>,
        locator: Arc<ResourceLocator>,
        names: ResourceNames,
        config: &ReconcileConfig,
    ) -> SedaResult<Self> {
        Ok(Self {
            client,
            locator,
            names,
            schedule_retry: RetryPolicy::schedule_creation(config)?,
            group_poll_delay: Duration::from_secs(config.group_deleting_delay_seconds),
            group_max_polls: config.group_deleting_max_polls,
        })
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    pub fn locator(&self) -> &Arc<ResourceLocator> {
        &self.locator
    }

    pub async fn function_arn(&self) -> SedaResult<String> {
        let function_name = self.names.function_name()?;
        self.locator
            .arn(&format!("lambda:function:{function_name}"))
            .await
    }

    pub async fn topic_arn(&self) -> SedaResult<String> {
        self.locator
            .arn(&format!("sns:{}", self.names.topic_name()?))
            .await
    }

    pub async fn schedule_role_arn(&self) -> SedaResult<String> {
        self.locator
            .arn(&format!("iam:role/{}", self.names.schedule_role_name()?))
            .await
    }

    // ---- 函数与执行角色策略 ----

    pub async fn get_function(&self) -> SedaResult<FunctionResponse> {
        self.client.get_function(&self.names.function_name()?).await
    }

    /// 函数执行角色名
    pub async fn function_role_name(&self) -> SedaResult<String> {
        let function = self.get_function().await?;
        Ok(function.configuration.role_name().to_string())
    }

    /// 在函数执行角色上写入分发所需的内联策略
    pub async fn put_function_policy(&self) -> SedaResult<()> {
        let role_name = self.function_role_name().await?;
        let onetime_group = self.names.schedule_group_name(true)?;
        let policy = PolicyDocument::function_dispatch(
            &self
                .locator
                .arn(&format!("scheduler:schedule/{onetime_group}/*"))
                .await?,
            &self.schedule_role_arn().await?,
            &self.topic_arn().await?,
        );
        let policy_name = self.names.function_policy_name()?;
        debug!("写入函数策略 {} 到角色 {}", policy_name, role_name);
        self.client
            .put_role_policy(&role_name, &policy_name, &policy)
            .await
    }

    pub async fn delete_function_policy(&self) -> SedaResult<()> {
        let role_name = self.function_role_name().await?;
        self.client
            .delete_role_policy(&role_name, &self.names.function_policy_name()?)
            .await
    }

    // ---- 定时角色 ----

    pub async fn create_schedule_role(&self) -> SedaResult<RoleResponse> {
        let group_name = self.names.schedule_group_name(false)?;
        let source_arn = self
            .locator
            .arn(&format!("scheduler:schedule/{group_name}*/*"))
            .await?;
        let trust = PolicyDocument::schedule_trust(&source_arn, &self.locator.account_id().await?);
        let policy = PolicyDocument::function_invoke(&self.function_arn().await?);
        self.client
            .create_role(&self.names.schedule_role_name()?, &trust, &policy)
            .await
    }

    pub async fn delete_schedule_role(&self) -> SedaResult<()> {
        self.client
            .delete_role(&self.names.schedule_role_name()?)
            .await
    }

    // ---- 定时分组 ----

    pub async fn get_schedule_group(&self, onetime: bool) -> SedaResult<ScheduleGroupResponse> {
        self.client
            .get_schedule_group(&self.names.schedule_group_name(onetime)?)
            .await
    }

    /// 创建定时分组
    ///
    /// 同名分组仍处于 `DELETING` 状态时，等待固定间隔后重新查询并创建；
    /// 冲突分组处于其他状态时直接返回冲突错误。轮询次数受
    /// `group_deleting_max_polls` 限制。
    pub async fn create_schedule_group(
        &self,
        onetime: bool,
    ) -> SedaResult<CreateScheduleGroupResponse> {
        let group_name = self.names.schedule_group_name(onetime)?;
        let mut polls = 0u32;
        loop {
            let conflict = match self.client.create_schedule_group(&group_name).await {
                Ok(created) => return Ok(created),
                Err(err) if err.is_already_exists() => err,
                Err(err) => return Err(err),
            };

            match self.client.get_schedule_group(&group_name).await {
                Ok(group) if group.is_deleting() => {
                    polls += 1;
                    if polls > self.group_max_polls {
                        warn!(
                            "定时分组 {} 在 {} 次轮询后仍处于删除中",
                            group_name, self.group_max_polls
                        );
                        // 仍在删除的分组不能按“已存在”处理
                        return Err(match conflict {
                            SedaError::AlreadyExists(failure) => SedaError::Remote(failure),
                            other => other,
                        });
                    }
                    info!(
                        "定时分组 {} 正在删除，{:?} 后重试",
                        group_name, self.group_poll_delay
                    );
                    tokio::time::sleep(self.group_poll_delay).await;
                }
                Ok(_) => return Err(conflict),
                // 冲突之后分组已经消失，直接重新创建
                Err(err) if err.is_not_found() => {
                    polls += 1;
                    if polls > self.group_max_polls {
                        return Err(conflict);
                    }
                    debug!("定时分组 {} 已删除完毕，重新创建", group_name);
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn delete_schedule_group(&self, onetime: bool) -> SedaResult<()> {
        self.client
            .delete_schedule_group(&self.names.schedule_group_name(onetime)?)
            .await
    }

    // ---- 定时任务 ----

    /// 组装定时任务创建请求；`at(...)` 一次性任务放入一次性分组
    pub async fn schedule_request(&self, schedule: &Schedule) -> SedaResult<CreateScheduleRequest> {
        let target = ScheduleTarget {
            arn: self.function_arn().await?,
            role_arn: self.schedule_role_arn().await?,
            input: schedule.target_input()?,
            dead_letter_config: schedule
                .dead_letter_arn
                .clone()
                .map(|arn| DeadLetterConfig { arn }),
            retry_policy: schedule.retry_policy,
        };
        Ok(CreateScheduleRequest {
            name: self.names.schedule_name(&schedule.path)?,
            group_name: self.names.schedule_group_name(schedule.is_onetime())?,
            schedule_expression: schedule.expression.clone(),
            schedule_expression_timezone: schedule.timezone.clone(),
            flexible_time_window: schedule.time_window,
            target,
            start_date: schedule.start_date,
            end_date: schedule.end_date,
            kms_key_arn: schedule.kms_key.clone(),
        })
    }

    async fn try_create_schedule(&self, schedule: &Schedule) -> SedaResult<CreateScheduleResponse> {
        let request = self.schedule_request(schedule).await?;
        debug!("创建定时任务 {} 于分组 {}", request.name, request.group_name);
        self.client.create_schedule(&request).await
    }

    /// 创建定时任务，吸收定时角色尚未生效导致的校验失败
    pub async fn create_schedule(&self, schedule: &Schedule) -> SedaResult<CreateScheduleResponse> {
        self.schedule_retry
            .run(|| self.try_create_schedule(schedule))
            .await
    }

    // ---- 消息主题 ----

    pub async fn create_topic(&self) -> SedaResult<String> {
        let created = self.client.create_topic(&self.names.topic_name()?).await?;
        Ok(created.topic_arn)
    }

    /// 退订全部订阅后删除主题
    pub async fn delete_topic(&self) -> SedaResult<()> {
        let topic_arn = self.topic_arn().await?;
        for subscription in self.client.list_subscriptions_by_topic(&topic_arn).await? {
            debug!("退订 {}", subscription.subscription_arn);
            self.client.unsubscribe(&subscription.subscription_arn).await?;
        }
        self.client.delete_topic(&topic_arn).await
    }

    pub async fn subscribe_function(&self) -> SedaResult<String> {
        let subscribed = self
            .client
            .subscribe(
                &self.topic_arn().await?,
                TOPIC_PROTOCOL,
                &self.function_arn().await?,
            )
            .await?;
        Ok(subscribed.subscription_arn)
    }

    /// 允许主题调用函数
    pub async fn add_topic_permission(&self) -> SedaResult<()> {
        let request = AddPermissionRequest {
            function_name: self.names.function_name()?,
            statement_id: self.names.topic_statement_id()?,
            action: INVOKE_ACTION.to_string(),
            principal: TOPIC_PRINCIPAL.to_string(),
            source_arn: Some(self.topic_arn().await?),
            source_account: Some(self.locator.account_id().await?),
        };
        self.client.add_permission(&request).await
    }

    pub async fn remove_topic_permission(&self) -> SedaResult<()> {
        self.client
            .remove_permission(
                &self.names.function_name()?,
                &self.names.topic_statement_id()?,
            )
            .await
    }
}

impl std::fmt::Debug for StackResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackResources")
            .field("region", &self.names.region())
            .field("function", &self.names.target().get())
            .finish()
    }
}
