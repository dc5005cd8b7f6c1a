//! 资源命名
//!
//! 模板使用 `{var}` 占位，在取名时才检查变量是否齐全。每个定时任务的名字都带一个
//! 新生成的 22 位 base-62 随机后缀，同一任务重复创建一次性定时也不会撞名。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::config::{FunctionTarget, NamingConfig};
use crate::models::TaskPath;
use crate::{SedaError, SedaResult};

pub const UID_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const UID_LENGTH: usize = 22;

const ONETIME_SUFFIX: &str = "-onetime";

/// 生成 22 位 base-62 随机标识
///
/// 源自一个随机 128 位整数，高位在前，不足 22 位时左侧补字母表首字符。
pub fn generate_uid() -> String {
    encode_base62(Uuid::new_v4().as_u128())
}

fn encode_base62(mut n: u128) -> String {
    let mut digits = Vec::with_capacity(UID_LENGTH);
    while n > 0 {
        digits.push(UID_ALPHABET[(n % 62) as usize]);
        n /= 62;
    }
    while digits.len() < UID_LENGTH {
        digits.push(UID_ALPHABET[0]);
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

static SLOT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

fn slot_pattern() -> SedaResult<&'static Regex> {
    SLOT_PATTERN
        .as_ref()
        .ok_or_else(|| SedaError::Internal("命名模板占位正则无效".to_string()))
}

/// 替换变量集合
#[derive(Debug, Clone, Default)]
pub struct NameVars(BTreeMap<&'static str, String>);

impl NameVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// 资源名模板，构造后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
}

impl NameTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// 模板引用的变量名，按出现顺序
    pub fn variables(&self) -> Vec<&str> {
        match slot_pattern() {
            Ok(pattern) => pattern
                .captures_iter(&self.source)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 用给定变量替换占位，缺少任何一个都返回配置错误
    pub fn substitute(&self, vars: &NameVars) -> SedaResult<String> {
        if let Some(missing) = self.variables().into_iter().find(|v| vars.get(v).is_none()) {
            return Err(SedaError::config_error(format!(
                "命名模板 \"{}\" 缺少变量 {}",
                self.source, missing
            )));
        }

        let rendered = slot_pattern()?.replace_all(&self.source, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .and_then(|m| vars.get(m.as_str()))
                .unwrap_or_default()
                .to_string()
        });
        Ok(rendered.into_owned())
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 按当前目标函数与区域解析所有资源名
#[derive(Debug, Clone)]
pub struct ResourceNames {
    function_policy: NameTemplate,
    schedule_group: NameTemplate,
    schedule: NameTemplate,
    schedule_role: NameTemplate,
    topic: NameTemplate,
    topic_statement_id: NameTemplate,
    region: String,
    target: FunctionTarget,
}

impl ResourceNames {
    pub fn new(naming: &NamingConfig, region: impl Into<String>, target: FunctionTarget) -> Self {
        Self {
            function_policy: NameTemplate::new(&naming.function_policy_name),
            schedule_group: NameTemplate::new(&naming.schedule_group_name),
            schedule: NameTemplate::new(&naming.schedule_name),
            schedule_role: NameTemplate::new(&naming.schedule_role_name),
            topic: NameTemplate::new(&naming.topic_name),
            topic_statement_id: NameTemplate::new(&naming.topic_statement_id),
            region: region.into(),
            target,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }

    pub fn function_name(&self) -> SedaResult<String> {
        self.target.function_name()
    }

    fn base_vars(&self) -> SedaResult<NameVars> {
        Ok(NameVars::new()
            .set("function_name", self.function_name()?)
            .set("region", self.region.clone()))
    }

    /// 函数执行角色上的内联策略名
    pub fn function_policy_name(&self) -> SedaResult<String> {
        if self.function_policy.variables().is_empty() {
            return self.function_policy.substitute(&NameVars::new());
        }
        self.function_policy.substitute(&self.base_vars()?)
    }

    pub fn schedule_group_name(&self, onetime: bool) -> SedaResult<String> {
        let mut name = self.schedule_group.substitute(&self.base_vars()?)?;
        if onetime {
            name.push_str(ONETIME_SUFFIX);
        }
        Ok(name)
    }

    /// 每次调用都会生成新的 uid
    pub fn schedule_name(&self, path: &TaskPath) -> SedaResult<String> {
        let vars = self
            .base_vars()?
            .set("path", path.to_string())
            .set("uid", generate_uid());
        self.schedule.substitute(&vars)
    }

    pub fn schedule_role_name(&self) -> SedaResult<String> {
        self.schedule_role.substitute(&self.base_vars()?)
    }

    pub fn topic_name(&self) -> SedaResult<String> {
        self.topic.substitute(&self.base_vars()?)
    }

    pub fn topic_statement_id(&self) -> SedaResult<String> {
        self.topic_statement_id.substitute(&self.base_vars()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(function: Option<&str>) -> ResourceNames {
        ResourceNames::new(
            &NamingConfig::default(),
            "eu-west-1",
            FunctionTarget::new(function.map(String::from)),
        )
    }

    #[test]
    fn test_default_templates() {
        let names = names(Some("api"));
        assert_eq!(names.function_policy_name().unwrap(), "seda-schedule-sns-policy");
        assert_eq!(names.schedule_group_name(false).unwrap(), "seda-f-api");
        assert_eq!(names.schedule_group_name(true).unwrap(), "seda-f-api-onetime");
        assert_eq!(names.schedule_role_name().unwrap(), "seda-schedule-eu-west-1-f-api");
        assert_eq!(names.topic_name().unwrap(), "seda-async-f-api");
        assert_eq!(names.topic_statement_id().unwrap(), "seda-f-api-permission-sns");
    }

    #[test]
    fn test_schedule_name_gets_fresh_uid() {
        let names = names(Some("api"));
        let path = TaskPath::new("app", "job");
        let first = names.schedule_name(&path).unwrap();
        let second = names.schedule_name(&path).unwrap();
        assert!(first.starts_with("app.job-"));
        assert_eq!(first.len(), "app.job-".len() + UID_LENGTH);
        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_variable_fails_at_substitution() {
        let template = NameTemplate::new("seda-{function_name}-{stage}");
        assert_eq!(template.variables(), vec!["function_name", "stage"]);
        let err = template
            .substitute(&NameVars::new().set("function_name", "api"))
            .unwrap_err();
        assert!(matches!(err, SedaError::Configuration(_)));
    }

    #[test]
    fn test_names_require_function_name() {
        let names = names(None);
        assert!(names.schedule_group_name(false).is_err());
        assert_eq!(names.function_policy_name().unwrap(), "seda-schedule-sns-policy");
    }

    #[test]
    fn test_encode_base62_padding() {
        assert_eq!(encode_base62(0), "0".repeat(UID_LENGTH));
        assert_eq!(encode_base62(61), format!("{}Z", "0".repeat(UID_LENGTH - 1)));
        assert_eq!(encode_base62(62), format!("{}10", "0".repeat(UID_LENGTH - 2)));
        assert_eq!(encode_base62(u128::MAX).len(), UID_LENGTH);
    }
}
