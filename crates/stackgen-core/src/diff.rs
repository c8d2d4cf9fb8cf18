//! Resource-level comparison of two templates.

use serde::{Deserialize, Serialize};

use crate::Template;

/// How a resource differs between the deployed and the synthesized template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Update,
    Remove,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Add => write!(f, "+"),
            ChangeAction::Update => write!(f, "~"),
            ChangeAction::Remove => write!(f, "-"),
        }
    }
}

/// A changed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub logical_id: String,
    pub resource_type: String,
    pub action: ChangeAction,
}

/// Summary of resource changes, ordered by logical id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDiff {
    pub to_add: Vec<ResourceChange>,
    pub to_change: Vec<ResourceChange>,
    pub to_remove: Vec<ResourceChange>,
}

impl TemplateDiff {
    /// Compare `old` (e.g. read from disk) against `new` (freshly synthesized).
    pub fn between(old: &Template, new: &Template) -> Self {
        let mut diff = Self::default();

        for (id, resource) in &new.resources {
            match old.resources.get(id) {
                None => diff.to_add.push(ResourceChange {
                    logical_id: id.to_string(),
                    resource_type: resource.resource_type.clone(),
                    action: ChangeAction::Add,
                }),
                Some(previous) if previous != resource => diff.to_change.push(ResourceChange {
                    logical_id: id.to_string(),
                    resource_type: resource.resource_type.clone(),
                    action: ChangeAction::Update,
                }),
                Some(_) => {}
            }
        }

        for (id, resource) in &old.resources {
            if !new.resources.contains_key(id) {
                diff.to_remove.push(ResourceChange {
                    logical_id: id.to_string(),
                    resource_type: resource.resource_type.clone(),
                    action: ChangeAction::Remove,
                });
            }
        }

        diff
    }

    /// Every change in add, update, remove order.
    pub fn changes(&self) -> impl Iterator<Item = &ResourceChange> {
        self.to_add
            .iter()
            .chain(self.to_change.iter())
            .chain(self.to_remove.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_change.is_empty() && self.to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogicalId, Resource};
    use serde_json::json;

    fn template(resources: &[(&str, Resource)]) -> Template {
        let mut template = Template::new();
        for (id, resource) in resources {
            template
                .add_resource(LogicalId::raw(*id), resource.clone())
                .unwrap();
        }
        template
    }

    #[test]
    fn test_identical_templates_have_no_diff() {
        let t = template(&[("Vpc", Resource::new("AWS::EC2::VPC"))]);
        assert!(TemplateDiff::between(&t, &t).is_empty());
    }

    #[test]
    fn test_detects_add_change_remove() {
        let old = template(&[
            ("Vpc", Resource::new("AWS::EC2::VPC")),
            ("Bucket", Resource::new("AWS::S3::Bucket")),
        ]);
        let new = template(&[
            (
                "Vpc",
                Resource::new("AWS::EC2::VPC").with_property("CidrBlock", json!("10.1.0.0/16")),
            ),
            ("Cluster", Resource::new("AWS::ECS::Cluster")),
        ]);

        let diff = TemplateDiff::between(&old, &new);
        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_add[0].logical_id, "Cluster");
        assert_eq!(diff.to_change.len(), 1);
        assert_eq!(diff.to_change[0].logical_id, "Vpc");
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].logical_id, "Bucket");
        assert_eq!(diff.changes().count(), 3);
    }
}
