use serde::{Deserialize, Serialize};

/// 没有任何分支匹配、也没有默认处理器时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedEventPolicy {
    /// 返回空结果
    #[default]
    Ignore,
    /// 返回错误，由宿主平台记为调用失败
    Reject,
}

/// 出站任务的投递方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchService {
    /// 发布到消息主题
    #[default]
    Topic,
    /// 直接异步调用目标函数
    Invoke,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub unmatched_event: UnmatchedEventPolicy,
    pub default_service: DispatchService,
    /// 执行 `{"python": ...}` 事件的解释器
    pub code_interpreter: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            unmatched_event: UnmatchedEventPolicy::Ignore,
            default_service: DispatchService::Topic,
            code_interpreter: "python3".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.code_interpreter.trim().is_empty() {
            return Err(anyhow::anyhow!("代码解释器不能为空"));
        }
        Ok(())
    }
}

/// 资源对账的重试与轮询参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub schedule_create_max_attempts: u32,
    pub schedule_create_delay_seconds: u64,
    /// 只有消息匹配此模式的校验错误才重试
    pub schedule_create_retry_pattern: String,
    pub group_deleting_delay_seconds: u64,
    pub group_deleting_max_polls: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            schedule_create_max_attempts: 4,
            schedule_create_delay_seconds: 4,
            schedule_create_retry_pattern: "Scheduler.*role".to_string(),
            group_deleting_delay_seconds: 2,
            group_deleting_max_polls: 60,
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schedule_create_max_attempts == 0 {
            return Err(anyhow::anyhow!("定时任务创建的最大尝试次数必须大于0"));
        }

        if self.group_deleting_max_polls == 0 {
            return Err(anyhow::anyhow!("分组删除轮询次数必须大于0"));
        }

        regex::Regex::new(&self.schedule_create_retry_pattern).map_err(|e| {
            anyhow::anyhow!(
                "重试匹配模式无效: {}: {}",
                self.schedule_create_retry_pattern,
                e
            )
        })?;

        Ok(())
    }
}
