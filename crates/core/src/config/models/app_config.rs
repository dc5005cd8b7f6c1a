use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{
    dispatch_reconcile::{DispatchConfig, ReconcileConfig},
    observability::ObservabilityConfig,
    remote_naming::{NamingConfig, RemoteConfig},
};

/// 应用配置段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 应用名，只用于日志
    pub name: String,
    /// 目标函数名，为空时进入同步模式
    pub function_name: Option<String>,
    /// 交给默认处理器的 API 基础路径
    pub api_base_path: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "seda".to_string(),
            function_name: None,
            api_base_path: "/".to_string(),
        }
    }
}

impl AppSection {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("应用名不能为空"));
        }
        if let Some(name) = &self.function_name {
            if name.trim().is_empty() {
                return Err(anyhow::anyhow!("函数名不能为空字符串"));
            }
        }
        Ok(())
    }
}

/// 系统配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SedaConfig {
    pub app: AppSection,
    pub remote: RemoteConfig,
    pub naming: NamingConfig,
    pub dispatch: DispatchConfig,
    pub reconcile: ReconcileConfig,
    pub observability: ObservabilityConfig,
}

const CONFIG_FILE_NAMES: [&str; 2] = ["seda.toml", "config/seda.toml"];

impl SedaConfig {
    /// 从配置文件与环境变量加载配置
    ///
    /// 加载顺序:
    /// 1. 默认配置
    /// 2. 配置文件 (TOML)，未指定时在当前目录查找
    /// 3. 环境变量覆盖 (前缀: SEDA_，层级分隔: __)
    /// 4. 平台环境变量兜底 (函数名、区域)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with(config_path, None)
    }

    /// 与 [`SedaConfig::load`] 相同，但在 `app_dir` 下查找默认配置文件
    pub fn load_with(config_path: Option<&str>, app_dir: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = Self::find_default_file(app_dir) {
            builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("SEDA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: SedaConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.apply_env_fallbacks(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn find_default_file(app_dir: Option<&Path>) -> Option<PathBuf> {
        let base = app_dir.map(Path::to_path_buf).unwrap_or_default();
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| base.join(name))
            .find(|path| path.exists())
    }

    /// 未配置函数名或区域时，使用宿主平台注入的环境变量
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.app.function_name.is_none() {
            self.app.function_name = lookup("AWS_LAMBDA_FUNCTION_NAME").filter(|v| !v.is_empty());
        }
        if self.remote.region.is_none() {
            self.remote.region = lookup("AWS_REGION")
                .filter(|v| !v.is_empty())
                .or_else(|| lookup("AWS_DEFAULT_REGION").filter(|v| !v.is_empty()));
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: SedaConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.app.validate().context("应用配置验证失败")?;
        self.remote.validate().context("远程会话配置验证失败")?;
        self.naming.validate().context("命名模板配置验证失败")?;
        self.dispatch.validate().context("分发配置验证失败")?;
        self.reconcile.validate().context("对账配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
