use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志初始化失败的原因
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("全局日志订阅者已经设置")]
    AlreadyInitialized,

    #[error("无效的日志过滤指令 \"{directive}\": {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("不支持的日志格式: {0}")]
    UnsupportedFormat(String),
}

impl LoggingError {
    pub fn is_already_initialized(&self) -> bool {
        matches!(self, Self::AlreadyInitialized)
    }
}

/// 解析过滤指令，`RUST_LOG` 非空时优先于传入的级别
fn build_filter(log_level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| log_level.to_string());
    EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
        reason: e.to_string(),
        directive,
    })
}

/// 初始化全局日志
///
/// 全局订阅者只能设置一次，重复调用返回 [`LoggingError::AlreadyInitialized`]。
pub fn init_logging(log_level: &str, log_format: &str) -> Result<(), LoggingError> {
    if !["json", "pretty", "compact"].contains(&log_format) {
        return Err(LoggingError::UnsupportedFormat(log_format.to_string()));
    }
    let env_filter = build_filter(log_level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsupported_format() {
        let err = init_logging("info", "xml").unwrap_err();
        assert!(matches!(err, LoggingError::UnsupportedFormat(ref f) if f == "xml"));
        assert!(!err.is_already_initialized());
    }

    #[test]
    fn test_rejects_invalid_level_directive() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let err = build_filter("seda=loud").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
        assert!(build_filter("seda=debug,warn").is_ok());
    }
}
