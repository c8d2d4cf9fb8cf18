//! IAM policy documents.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use crate::intrinsic::{PARTITION, join, pseudo};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// One statement of a policy document.
///
/// Single-element action and resource lists render as scalars, the way IAM
/// itself echoes them back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(serialize_with = "one_or_many")]
    pub action: Vec<Value>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "one_or_many")]
    pub resource: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            action: Vec::new(),
            effect: Effect::Allow,
            principal: None,
            resource: Vec::new(),
        }
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action
            .extend(actions.into_iter().map(|a| Value::String(a.into())));
        self
    }

    pub fn resource(mut self, resource: Value) -> Self {
        self.resource.push(resource);
        self
    }

    pub fn all_resources(self) -> Self {
        self.resource(json!("*"))
    }

    pub fn service_principal(mut self, service: &str) -> Self {
        self.principal = Some(json!({ "Service": service }));
        self
    }
}

fn one_or_many<S: Serializer>(values: &[Value], serializer: S) -> Result<S::Ok, S::Error> {
    match values {
        [single] => single.serialize(serializer),
        many => many.serialize(serializer),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub statement: Vec<PolicyStatement>,
    pub version: &'static str,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self {
            statement: Vec::new(),
            version: POLICY_VERSION,
        }
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statement.push(statement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statement.is_empty()
    }

    pub fn to_value(&self) -> Value {
        // Only strings and JSON values are stored, which always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Trust policy letting an AWS service assume a role.
pub fn assume_role_policy(service: &str) -> PolicyDocument {
    PolicyDocument::new().with_statement(
        PolicyStatement::allow()
            .actions(["sts:AssumeRole"])
            .service_principal(service),
    )
}

/// ARN of an AWS managed policy, partition-aware.
pub fn managed_policy_arn(name: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            pseudo(PARTITION),
            json!(format!(":iam::aws:policy/{}", name)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_role_policy_shape() {
        let doc = assume_role_policy("ecs-tasks.amazonaws.com").to_value();
        assert_eq!(
            doc,
            json!({
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                }],
                "Version": "2012-10-17",
            })
        );
    }

    #[test]
    fn test_multiple_actions_render_as_list() {
        let doc = PolicyDocument::new()
            .with_statement(
                PolicyStatement::allow()
                    .actions(["logs:*", "s3:*"])
                    .all_resources(),
            )
            .to_value();
        assert_eq!(doc["Statement"][0]["Action"], json!(["logs:*", "s3:*"]));
        assert_eq!(doc["Statement"][0]["Resource"], json!("*"));
    }

    #[test]
    fn test_managed_policy_arn() {
        let arn = managed_policy_arn("AmazonS3FullAccess");
        assert_eq!(
            arn["Fn::Join"][1][2],
            json!(":iam::aws:policy/AmazonS3FullAccess")
        );
    }
}
