//! Template resources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::LogicalId;

/// What happens to a resource when it leaves the template or is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl std::fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionPolicy::Delete => write!(f, "Delete"),
            DeletionPolicy::Retain => write!(f, "Retain"),
            DeletionPolicy::Snapshot => write!(f, "Snapshot"),
        }
    }
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Provider resource type, e.g. `AWS::EC2::VPC`.
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Merge the fields of a JSON object into the resource's properties.
    ///
    /// Non-object values carry no named fields and are ignored.
    pub fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties.extend(map);
        }
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        if !self.depends_on.contains(id) {
            self.depends_on.push(id.clone());
        }
        self
    }

    /// Apply a removal policy to both deletion and replacement.
    pub fn with_removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type == resource_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_pascal_case() {
        let resource = Resource::new("AWS::S3::Bucket")
            .with_removal_policy(DeletionPolicy::Delete)
            .depends_on(&LogicalId::raw("Role"));

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            value,
            json!({
                "Type": "AWS::S3::Bucket",
                "DependsOn": ["Role"],
                "UpdateReplacePolicy": "Delete",
                "DeletionPolicy": "Delete",
            })
        );
    }

    #[test]
    fn test_with_properties_merges() {
        let resource = Resource::new("AWS::ECS::Cluster")
            .with_properties(json!({ "A": 1 }))
            .with_property("B", json!(2));
        assert_eq!(resource.property("A"), Some(&json!(1)));
        assert_eq!(resource.property("B"), Some(&json!(2)));
    }

    #[test]
    fn test_depends_on_deduplicates() {
        let id = LogicalId::raw("Listener");
        let resource = Resource::new("AWS::ECS::Service")
            .depends_on(&id)
            .depends_on(&id);
        assert_eq!(resource.depends_on.len(), 1);
    }
}
