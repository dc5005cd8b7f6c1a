use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use seda_core::{SedaError, SedaResult};

use crate::client::RemoteClient;

/// 不区分区域的全局服务，ARN 中区域段为空
pub const GLOBAL_SERVICES: [&str; 3] = ["iam", "cloudfront", "route53"];

/// 拼接资源 ARN，`key` 格式为 `<service>:<resource>`
pub fn format_arn(key: &str, region: &str, account_id: &str) -> SedaResult<String> {
    let (service, resource) = match key.split_once(':') {
        Some((service, resource)) if !service.is_empty() && !resource.is_empty() => {
            (service, resource)
        }
        _ => {
            return Err(SedaError::invalid_argument(format!(
                "键 \"{key}\" 必须是 \"<service>:<resource>\" 格式"
            )))
        }
    };

    let region = if GLOBAL_SERVICES.contains(&service) {
        ""
    } else {
        region
    };
    Ok(format!("arn:aws:{service}:{region}:{account_id}:{resource}"))
}

/// 资源定位
///
/// 账号 ID 来自配置或调用方身份查询；查询在进程内最多执行一次，之后复用。
#[derive(Debug)]
pub struct ResourceLocator {
    client: Arc<RemoteClient>,
    region: String,
    account_id: OnceCell<String>,
}

impl ResourceLocator {
    pub fn new(client: Arc<RemoteClient>, account_id: Option<String>) -> Self {
        let region = client.region().to_string();
        Self {
            client,
            region,
            account_id: OnceCell::new_with(account_id),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn account_id(&self) -> SedaResult<String> {
        let id = self
            .account_id
            .get_or_try_init(|| async {
                let identity = self.client.get_identity().await?;
                debug!("查询到调用方账号: {}", identity.account);
                Ok::<_, SedaError>(identity.account)
            })
            .await?;
        Ok(id.clone())
    }

    pub async fn arn(&self, key: &str) -> SedaResult<String> {
        let account_id = self.account_id().await?;
        format_arn(key, &self.region, &account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_services_omit_region() {
        assert_eq!(
            format_arn("iam:role/x", "eu-west-1", "123").unwrap(),
            "arn:aws:iam::123:role/x"
        );
        assert_eq!(
            format_arn("route53:hostedzone/Z1", "eu-west-1", "123").unwrap(),
            "arn:aws:route53::123:hostedzone/Z1"
        );
    }

    #[test]
    fn test_regional_service_includes_region() {
        assert_eq!(
            format_arn("lambda:function:x", "eu-west-1", "123").unwrap(),
            "arn:aws:lambda:eu-west-1:123:function:x"
        );
    }

    #[test]
    fn test_malformed_key() {
        for key in ["lambda", ":x", "sns:"] {
            assert!(matches!(
                format_arn(key, "r", "1"),
                Err(SedaError::InvalidArgument(_))
            ));
        }
    }
}
