//! Logical identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Path segment dropped from both the human part and the hash.
const HIDDEN_ID: &str = "Default";
/// Path segment dropped from the human part only.
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;

/// The logical id of a resource inside a template.
///
/// Ids are derived from a `/`-separated construct path, so the same path
/// always yields the same id. Multi-segment paths get an 8-character MD5
/// suffix that keeps ids unique when their human-readable parts collide.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive a logical id from a construct path such as `"Vpc/PublicSubnet1/Subnet"`.
    pub fn from_path(path: &str) -> Self {
        let components: Vec<&str> = path
            .split('/')
            .filter(|c| !c.is_empty() && *c != HIDDEN_ID)
            .collect();

        if components.len() == 1 {
            let top = alphanumeric(components[0]);
            if top.len() <= MAX_HUMAN_LEN {
                return Self(top);
            }
        }

        let hash = path_hash(&components);

        let mut human = String::new();
        let mut previous: Option<&str> = None;
        for component in &components {
            if previous == Some(*component) {
                continue;
            }
            previous = Some(component);
            if *component == HIDDEN_FROM_HUMAN_ID {
                continue;
            }
            human.push_str(&alphanumeric(component));
        }
        human.truncate(MAX_HUMAN_LEN);

        Self(format!("{human}{hash}"))
    }

    /// Use a string verbatim as a logical id.
    pub fn raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn path_hash(components: &[&str]) -> String {
    let digest = md5::compute(components.join("/").as_bytes());
    let mut encoded = hex::encode_upper(digest.0);
    encoded.truncate(HASH_LEN);
    encoded
}
