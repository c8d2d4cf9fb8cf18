//! Build step contract: log in to the registry, build, tag and push the
//! image, then write the image definitions file the deploy stage consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::registry::Repository;

pub const BUILD_SPEC_VERSION: &str = "0.2";
pub const IMAGE_DEFINITIONS_FILE: &str = "imagedefinitions.json";
pub const IMAGE_TAG: &str = "latest";

/// A CodeBuild build specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub version: String,
    pub phases: Phases,
    pub artifacts: Artifacts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phases {
    pub pre_build: Phase,
    pub build: Phase,
    pub post_build: Phase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub files: Vec<String>,
}

/// One entry of the image definitions file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDefinition {
    pub name: String,
    #[serde(rename = "imageUri")]
    pub image_uri: String,
}

/// A plaintext build environment variable.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentVariable {
    pub name: &'static str,
    pub value: Value,
}

impl EnvironmentVariable {
    pub fn to_value(&self) -> Value {
        json!({
            "Name": self.name,
            "Type": "PLAINTEXT",
            "Value": self.value,
        })
    }
}

fn commands(lines: &[&str]) -> Phase {
    Phase {
        commands: lines.iter().map(|l| l.to_string()).collect(),
    }
}

/// The fixed build/push sequence. Relies on the variables from [`build_environment`].
pub fn image_build_spec() -> BuildSpec {
    BuildSpec {
        version: BUILD_SPEC_VERSION.to_string(),
        phases: Phases {
            pre_build: commands(&[
                "echo Logging in to Amazon ECR...",
                "aws ecr get-login-password --region $AWS_REGION | docker login --username AWS --password-stdin $ECR_REPO_URI",
            ]),
            build: commands(&[
                "echo Building the Docker image...",
                "docker build -t $IMAGE_REPO_NAME .",
                "docker tag $IMAGE_REPO_NAME:latest $ECR_REPO_URI:latest",
            ]),
            post_build: commands(&[
                "echo Build completed",
                "echo Pushing the Docker image to $ECR_REPO_URI:latest",
                "docker push $ECR_REPO_URI:latest",
                "echo Writing image definitions file...",
                r#"printf '[{"name":"'$CONTAINER_NAME'","imageUri":"%s"}]' $ECR_REPO_URI:latest > imagedefinitions.json"#,
            ]),
        },
        artifacts: Artifacts {
            files: vec!["**/*".to_string(), IMAGE_DEFINITIONS_FILE.to_string()],
        },
    }
}

/// Variables the build spec expects, in declaration order.
pub fn build_environment(repository: &Repository, container_name: &str) -> Vec<EnvironmentVariable> {
    vec![
        EnvironmentVariable {
            name: "ECR_REPO_URI",
            value: repository.uri(),
        },
        EnvironmentVariable {
            name: "IMAGE_REPO_NAME",
            value: json!(repository.name),
        },
        EnvironmentVariable {
            name: "IMAGE_TAG",
            value: json!(IMAGE_TAG),
        },
        EnvironmentVariable {
            name: "CONTAINER_NAME",
            value: json!(container_name),
        },
    ]
}

impl BuildSpec {
    /// Serialized form embedded in the build project.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_core::LogicalId;

    #[test]
    fn test_phases_in_order() {
        let json = image_build_spec().to_json().unwrap();
        let pre = json.find("pre_build").unwrap();
        let build = json.find("\"build\"").unwrap();
        let post = json.find("post_build").unwrap();
        assert!(pre < build && build < post);
        assert!(json.starts_with("{\n  \"version\": \"0.2\""));
    }

    #[test]
    fn test_artifacts_include_image_definitions() {
        let spec = image_build_spec();
        assert_eq!(spec.artifacts.files, vec!["**/*", "imagedefinitions.json"]);
    }

    #[test]
    fn test_printf_writes_image_definitions() {
        let spec = image_build_spec();
        let command = spec
            .phases
            .post_build
            .commands
            .iter()
            .find(|c| c.starts_with("printf"))
            .unwrap();
        assert!(command.ends_with("> imagedefinitions.json"));

        // Expand the command the way the shell would.
        let format = command
            .trim_start_matches("printf '")
            .split("' $ECR_REPO_URI")
            .next()
            .unwrap();
        let rendered = format
            .replace("'$CONTAINER_NAME'", "web")
            .replace("%s", "123456789012.dkr.ecr.us-east-1.amazonaws.com/repo:latest");

        let definitions: Vec<ImageDefinition> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            definitions,
            vec![ImageDefinition {
                name: "web".to_string(),
                image_uri: "123456789012.dkr.ecr.us-east-1.amazonaws.com/repo:latest".to_string(),
            }]
        );
    }

    #[test]
    fn test_build_environment() {
        let repo = Repository {
            id: LogicalId::raw("Repo"),
            name: "devops-test-repo-x".to_string(),
        };
        let env = build_environment(&repo, "web");
        let names: Vec<&str> = env.iter().map(|v| v.name).collect();
        assert_eq!(
            names,
            vec!["ECR_REPO_URI", "IMAGE_REPO_NAME", "IMAGE_TAG", "CONTAINER_NAME"]
        );
        assert_eq!(
            env[3].to_value(),
            json!({ "Name": "CONTAINER_NAME", "Type": "PLAINTEXT", "Value": "web" })
        );
    }
}
