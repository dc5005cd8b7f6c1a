use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SedaResult;

pub const POLICY_VERSION: &str = "2012-10-17";

/// 访问策略文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// 策略语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: String,
    pub action: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

impl Statement {
    pub fn allow(action: impl Into<Value>) -> Self {
        Self {
            effect: "Allow".to_string(),
            action: action.into(),
            principal: None,
            resource: None,
            condition: None,
        }
    }

    pub fn principal_service(mut self, service: &str) -> Self {
        self.principal = Some(BTreeMap::from([("Service".to_string(), service.to_string())]));
        self
    }

    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn condition(mut self, operator: &str, key: &str, value: impl Into<String>) -> Self {
        self.condition
            .get_or_insert_with(BTreeMap::new)
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// 定时调度服务扮演定时角色的信任策略，限定来源分组与账号
    pub fn schedule_trust(schedule_source_arn: &str, account_id: &str) -> Self {
        Self::new(vec![Statement::allow("sts:AssumeRole")
            .principal_service("scheduler.amazonaws.com")
            .condition("ForAllValues:StringLike", "aws:SourceArn", schedule_source_arn)
            .condition("ForAllValues:StringEquals", "aws:SourceAccount", account_id)])
    }

    /// 定时角色调用目标函数（含所有版本）的权限
    pub fn function_invoke(function_arn: &str) -> Self {
        Self::new(vec![Statement::allow(vec!["lambda:InvokeFunction"]).resource(vec![
            function_arn.to_string(),
            format!("{function_arn}:*"),
        ])])
    }

    /// 函数执行角色的内联策略：创建一次性定时、传递定时角色、发布到主题
    pub fn function_dispatch(
        onetime_schedules_arn: &str,
        schedule_role_arn: &str,
        topic_arn: &str,
    ) -> Self {
        Self::new(vec![
            Statement::allow("scheduler:CreateSchedule").resource(onetime_schedules_arn),
            Statement::allow("iam:PassRole").resource(schedule_role_arn),
            Statement::allow("sns:Publish").resource(topic_arn),
        ])
    }

    pub fn to_json(&self) -> SedaResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_trust_document() {
        let doc = PolicyDocument::schedule_trust(
            "arn:aws:scheduler:eu-west-1:123:schedule/seda-f-fn*/*",
            "123",
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": "sts:AssumeRole",
                    "Principal": {"Service": "scheduler.amazonaws.com"},
                    "Condition": {
                        "ForAllValues:StringEquals": {"aws:SourceAccount": "123"},
                        "ForAllValues:StringLike": {
                            "aws:SourceArn": "arn:aws:scheduler:eu-west-1:123:schedule/seda-f-fn*/*"
                        }
                    }
                }]
            })
        );
    }

    #[test]
    fn test_function_dispatch_has_three_statements() {
        let doc = PolicyDocument::function_dispatch("a", "b", "c");
        let actions: Vec<_> = doc.statement.iter().map(|s| s.action.clone()).collect();
        assert_eq!(
            actions,
            vec![json!("scheduler:CreateSchedule"), json!("iam:PassRole"), json!("sns:Publish")]
        );
        assert_eq!(doc.statement[2].resource, Some(json!("c")));
    }

    #[test]
    fn test_function_invoke_covers_versions() {
        let doc = PolicyDocument::function_invoke("arn:aws:lambda:us-east-1:1:function:f");
        assert_eq!(
            doc.statement[0].resource,
            Some(json!([
                "arn:aws:lambda:us-east-1:1:function:f",
                "arn:aws:lambda:us-east-1:1:function:f:*"
            ]))
        );
    }
}
