use serde::{Deserialize, Serialize};

use crate::traits::Credentials;

pub const DEFAULT_REGION: &str = "us-east-1";

/// 远程会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// 预先知道账号时可跳过身份查询
    pub account_id: Option<String>,
    /// 会话后端，目前只有 "memory"
    pub backend: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            account_id: None,
            backend: "memory".to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// 组合配置中的静态凭证，访问密钥与私钥必须成对出现
    pub fn credentials(&self) -> anyhow::Result<Option<Credentials>> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: self.session_token.clone(),
            })),
            (None, None) if self.session_token.is_none() => Ok(None),
            _ => Err(anyhow::anyhow!(
                "access_key_id 与 secret_access_key 必须同时配置，session_token 不能单独配置"
            )),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(anyhow::anyhow!("区域不能为空字符串"));
            }
        }
        if let Some(profile) = &self.profile {
            if profile.trim().is_empty() {
                return Err(anyhow::anyhow!("凭证配置名不能为空字符串"));
            }
        }
        self.credentials()?;

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的远程后端: {}，支持的后端: {:?}",
                self.backend,
                valid_backends
            ));
        }

        Ok(())
    }
}

/// 资源命名模板
///
/// 模板里的 `{var}` 在使用时替换，可用变量为 `function_name`、`region`、`path`、`uid`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub function_policy_name: String,
    pub schedule_group_name: String,
    pub schedule_name: String,
    pub schedule_role_name: String,
    pub topic_name: String,
    pub topic_statement_id: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            function_policy_name: "seda-schedule-sns-policy".to_string(),
            schedule_group_name: "seda-f-{function_name}".to_string(),
            schedule_name: "{path}-{uid}".to_string(),
            schedule_role_name: "seda-schedule-{region}-f-{function_name}".to_string(),
            topic_name: "seda-async-f-{function_name}".to_string(),
            topic_statement_id: "seda-f-{function_name}-permission-sns".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let fields = [
            ("function_policy_name", &self.function_policy_name),
            ("schedule_group_name", &self.schedule_group_name),
            ("schedule_name", &self.schedule_name),
            ("schedule_role_name", &self.schedule_role_name),
            ("topic_name", &self.topic_name),
            ("topic_statement_id", &self.topic_statement_id),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("命名模板 {} 不能为空", field));
            }
        }
        Ok(())
    }
}
