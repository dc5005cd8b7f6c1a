use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::ReconcileConfig;
use crate::errors::ErrorKind;
use crate::{SedaError, SedaResult};

/// 带谓词的重试策略
///
/// 只有错误分类属于 `retry_on` 的失败才会计数重试；若设置了 `pattern`，错误消息
/// 还必须匹配该模式，否则立即返回。其余错误原样向上传播，不计入尝试次数。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 两次尝试之间的固定间隔
    pub delay: Duration,
    pub retry_on: Vec<ErrorKind>,
    pub pattern: Option<Regex>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, retry_on: Vec<ErrorKind>) -> Self {
        Self {
            max_attempts,
            delay,
            retry_on,
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> SedaResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            SedaError::config_error(format!("重试匹配模式无效: {pattern}: {e}"))
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// 定时任务创建的重试策略：吸收刚创建的角色尚未生效时的校验失败
    pub fn schedule_creation(config: &ReconcileConfig) -> SedaResult<Self> {
        Self::new(
            config.schedule_create_max_attempts,
            Duration::from_secs(config.schedule_create_delay_seconds),
            vec![ErrorKind::Validation],
        )
        .with_pattern(&config.schedule_create_retry_pattern)
    }

    fn should_retry(&self, error: &SedaError) -> bool {
        if !self.retry_on.contains(&error.kind()) {
            return false;
        }
        match &self.pattern {
            Some(pattern) => pattern.is_match(&error.message()),
            None => true,
        }
    }

    /// 执行操作，按策略重试
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> SedaResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SedaResult<T>>,
    {
        let mut attempts = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.retry_on.contains(&error.kind()) {
                        return Err(error);
                    }
                    attempts += 1;
                    if attempts >= self.max_attempts || !self.should_retry(&error) {
                        debug!("放弃重试，已尝试 {} 次: {}", attempts, error);
                        return Err(error);
                    }
                    warn!(
                        "第 {}/{} 次尝试失败，{:?} 后重试: {}",
                        attempts, self.max_attempts, self.delay, error
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
