use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use seda_core::models::Schedule;
use seda_core::{SedaError, SedaResult};

use crate::stack::StackResources;

/// 资源栈对账接口
#[async_trait]
pub trait StackReconciler: Send + Sync {
    /// 按依赖顺序创建整套资源，并创建所有已注册的定时任务
    async fn deploy(&self, schedules: &[Schedule]) -> SedaResult<DeployReport>;

    /// 按相反顺序删除整套资源
    async fn remove(&self) -> SedaResult<()>;
}

/// 一次部署创建的定时任务
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub schedule_arns: Vec<String>,
}

/// 忽略“已存在”
fn tolerate_existing<T>(step: &str, result: SedaResult<T>) -> SedaResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_already_exists() => {
            warn!("{}: 已存在，跳过", step);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// 忽略“未找到”
fn tolerate_missing<T>(step: &str, result: SedaResult<T>) -> SedaResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => {
            warn!("{}: 不存在，跳过", step);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// 幂等的部署与拆除
///
/// 部署顺序：函数策略 → 主题（订阅、调用权限）→ 清理旧的默认分组 → 定时角色
/// → 默认分组与一次性分组 → 定时任务。拆除顺序相反，每一步都容忍“未找到”，
/// 重复执行会收敛到同一终态。
#[derive(Debug)]
pub struct Reconciler {
    stack: Arc<StackResources>,
}

impl Reconciler {
    pub fn new(stack: Arc<StackResources>) -> Self {
        Self { stack }
    }

    pub fn stack(&self) -> &Arc<StackResources> {
        &self.stack
    }

    fn function_not_found(&self) -> SedaError {
        let name = self.stack.names().target().get().unwrap_or_default();
        error!("Lambda 函数 \"{}\" 不存在", name);
        SedaError::FunctionNotFound { name }
    }

    async fn deploy_function_policy(&self) -> SedaResult<()> {
        info!(
            "创建函数策略 \"{}\"",
            self.stack.names().function_policy_name()?
        );
        match self.stack.put_function_policy().await {
            Err(err) if err.is_not_found() && err.operation() == Some("GetFunction") => {
                Err(self.function_not_found())
            }
            result => tolerate_existing("函数策略", result),
        }
    }

    async fn deploy_topic_stack(&self) -> SedaResult<()> {
        info!("创建消息主题 \"{}\"", self.stack.names().topic_name()?);
        tolerate_existing("消息主题", self.stack.create_topic().await)?;

        info!("订阅消息主题");
        self.stack.subscribe_function().await?;

        info!("添加主题调用权限");
        tolerate_existing("主题调用权限", self.stack.add_topic_permission().await)
    }

    async fn deploy_scheduler_stack(&self, schedules: &[Schedule]) -> SedaResult<DeployReport> {
        tolerate_missing("旧定时分组", self.stack.delete_schedule_group(false).await)?;

        info!(
            "创建定时角色 \"{}\"",
            self.stack.names().schedule_role_name()?
        );
        tolerate_existing("定时角色", self.stack.create_schedule_role().await)?;

        for onetime in [false, true] {
            info!(
                "创建定时分组 \"{}\"",
                self.stack.names().schedule_group_name(onetime)?
            );
            tolerate_existing("定时分组", self.stack.create_schedule_group(onetime).await)?;
        }

        info!("创建 {} 个定时任务", schedules.len());
        let mut report = DeployReport::default();
        for schedule in schedules {
            info!(" - {}", schedule);
            let created = self.stack.create_schedule(schedule).await?;
            report.schedule_arns.push(created.schedule_arn);
        }
        Ok(report)
    }

    async fn remove_topic_stack(&self) -> SedaResult<()> {
        info!("删除主题调用权限");
        tolerate_missing("主题调用权限", self.stack.remove_topic_permission().await)?;

        info!("删除消息主题 \"{}\"", self.stack.names().topic_name()?);
        tolerate_missing("消息主题", self.stack.delete_topic().await)
    }

    async fn remove_scheduler_stack(&self) -> SedaResult<()> {
        for onetime in [false, true] {
            info!(
                "删除定时分组 \"{}\"",
                self.stack.names().schedule_group_name(onetime)?
            );
            tolerate_missing("定时分组", self.stack.delete_schedule_group(onetime).await)?;
        }

        info!(
            "删除定时角色 \"{}\"",
            self.stack.names().schedule_role_name()?
        );
        tolerate_missing("定时角色", self.stack.delete_schedule_role().await)
    }
}

#[async_trait]
impl StackReconciler for Reconciler {
    async fn deploy(&self, schedules: &[Schedule]) -> SedaResult<DeployReport> {
        self.deploy_function_policy().await?;
        self.deploy_topic_stack().await?;
        let report = self.deploy_scheduler_stack(schedules).await?;
        info!("部署完成");
        Ok(report)
    }

    async fn remove(&self) -> SedaResult<()> {
        info!(
            "删除函数策略 \"{}\"",
            self.stack.names().function_policy_name()?
        );
        match self.stack.delete_function_policy().await {
            // 函数本身不存在时其余资源也无从查找
            Err(err) if err.is_not_found() && err.operation() == Some("GetFunction") => {
                return Err(self.function_not_found())
            }
            result => tolerate_missing("函数策略", result)?,
        }

        self.remove_topic_stack().await?;
        self.remove_scheduler_stack().await?;
        info!("拆除完成");
        Ok(())
    }
}
