//! core::registry::schema
//!
//! Persisted registry documents (v1).
//!
//! # Schema Design
//!
//! Both store files are:
//! - Self-describing with `kind` and `schema_version`
//! - Strictly parsed (unknown fields rejected)
//! - Keyed by validated names, so a document that parses is well-formed
//!
//! # Example
//!
//! ```
//! use gitdeck::core::registry::schema::{parse_registry, REGISTRY_KIND};
//!
//! let json = r#"{
//!     "kind": "gitdeck.registry",
//!     "schema_version": 1,
//!     "projects": {}
//! }"#;
//!
//! let doc = parse_registry(json).unwrap();
//! assert_eq!(doc.kind, REGISTRY_KIND);
//! assert!(doc.projects.is_empty());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ProjectName, RemoteName, UserId, UtcTimestamp};

/// Kind identifier for the project registry document.
pub const REGISTRY_KIND: &str = "gitdeck.registry";

/// Kind identifier for the active-pointer document.
pub const ACTIVE_KIND: &str = "gitdeck.active";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from parsing store documents.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse document: {0}")]
    ParseError(String),

    #[error("invalid kind '{found}', expected '{expected}'")]
    InvalidKind { found: String, expected: String },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    #[error("invalid document: {0}")]
    InvalidValue(String),
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct Envelope {
    kind: String,
    schema_version: u32,
}

fn check_envelope(json: &str, expected: &str) -> Result<(), SchemaError> {
    let envelope: Envelope =
        serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))?;

    if envelope.kind != expected {
        return Err(SchemaError::InvalidKind {
            found: envelope.kind,
            expected: expected.to_string(),
        });
    }

    match envelope.schema_version {
        SCHEMA_VERSION => Ok(()),
        v => Err(SchemaError::UnsupportedVersion(v)),
    }
}

/// Parse the registry document with kind/version checks.
pub fn parse_registry(json: &str) -> Result<RegistryDocV1, SchemaError> {
    check_envelope(json, REGISTRY_KIND)?;
    let doc: RegistryDocV1 =
        serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))?;
    doc.validate()?;
    Ok(doc)
}

/// Parse the active-pointer document with kind/version checks.
pub fn parse_active(json: &str) -> Result<ActiveDocV1, SchemaError> {
    check_envelope(json, ACTIVE_KIND)?;
    serde_json::from_str(json).map_err(|e| SchemaError::ParseError(e.to_string()))
}

/// A configured remote of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Remote {
    /// Remote name, unique within the project
    pub name: RemoteName,
    /// Fetch/push URL
    pub url: String,
    /// Key into the secret store holding `username:token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub name: ProjectName,
    #[serde(default)]
    pub description: String,
    /// Working-tree location
    pub path: PathBuf,
    pub created_at: UtcTimestamp,
    #[serde(default)]
    pub remotes: Vec<Remote>,
}

impl Project {
    /// Find a remote by name.
    pub fn remote(&self, name: &RemoteName) -> Option<&Remote> {
        self.remotes.iter().find(|r| &r.name == name)
    }

    /// Summary used in listings.
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Listing entry for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: ProjectName,
    pub description: String,
    pub created_at: UtcTimestamp,
}

/// The project registry document (v1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryDocV1 {
    /// Kind identifier (always "gitdeck.registry")
    pub kind: String,
    /// Schema version (always 1 for this struct)
    pub schema_version: u32,
    /// Projects keyed by name; `BTreeMap` keeps listings ordered by name
    #[serde(default)]
    pub projects: BTreeMap<ProjectName, Project>,
}

impl Default for RegistryDocV1 {
    fn default() -> Self {
        Self {
            kind: REGISTRY_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            projects: BTreeMap::new(),
        }
    }
}

impl RegistryDocV1 {
    fn validate(&self) -> Result<(), SchemaError> {
        for (key, project) in &self.projects {
            if key != &project.name {
                return Err(SchemaError::InvalidValue(format!(
                    "project entry '{}' is keyed as '{}'",
                    project.name, key
                )));
            }
            let mut seen = BTreeSet::new();
            for remote in &project.remotes {
                if !seen.insert(&remote.name) {
                    return Err(SchemaError::InvalidValue(format!(
                        "project '{}' has duplicate remote '{}'",
                        project.name, remote.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The per-user active project document (v1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActiveDocV1 {
    /// Kind identifier (always "gitdeck.active")
    pub kind: String,
    /// Schema version (always 1 for this struct)
    pub schema_version: u32,
    #[serde(default)]
    pub active: BTreeMap<UserId, ProjectName>,
}

impl Default for ActiveDocV1 {
    fn default() -> Self {
        Self {
            kind: ACTIVE_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            active: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project(name: &str) -> Project {
        Project {
            name: ProjectName::new(name).unwrap(),
            description: "sample".into(),
            path: PathBuf::from("/ws/projects").join(name),
            created_at: UtcTimestamp::from_unix(1_700_000_000),
            remotes: vec![Remote {
                name: RemoteName::new("origin").unwrap(),
                url: "https://example.com/repo.git".into(),
                auth: None,
            }],
        }
    }

    #[test]
    fn registry_roundtrip() {
        let mut doc = RegistryDocV1::default();
        let project = sample_project("demo");
        doc.projects.insert(project.name.clone(), project);

        let json = serde_json::to_string_pretty(&doc).unwrap();
        let parsed = parse_registry(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn wrong_kind_rejected() {
        let json = r#"{"kind":"gitdeck.active","schema_version":1,"projects":{}}"#;
        assert!(matches!(
            parse_registry(json),
            Err(SchemaError::InvalidKind { .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let json = r#"{"kind":"gitdeck.registry","schema_version":2,"projects":{}}"#;
        assert!(matches!(
            parse_registry(json),
            Err(SchemaError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn mismatched_key_rejected() {
        let mut doc = RegistryDocV1::default();
        doc.projects.insert(
            ProjectName::new("other").unwrap(),
            sample_project("demo"),
        );
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            parse_registry(&json),
            Err(SchemaError::InvalidValue(_))
        ));
    }

    #[test]
    fn duplicate_remotes_rejected() {
        let mut project = sample_project("demo");
        project.remotes.push(project.remotes[0].clone());
        let mut doc = RegistryDocV1::default();
        doc.projects.insert(project.name.clone(), project);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(parse_registry(&json).is_err());
    }

    #[test]
    fn invalid_project_name_in_document_rejected() {
        let json = r#"{"kind":"gitdeck.registry","schema_version":1,"projects":{"../x":{
            "name":"../x","path":"/x","created_at":"2024-01-01T00:00:00Z"}}}"#;
        assert!(parse_registry(json).is_err());
    }

    #[test]
    fn active_roundtrip() {
        let mut doc = ActiveDocV1::default();
        doc.active.insert(
            UserId::new("alice").unwrap(),
            ProjectName::new("demo").unwrap(),
        );
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(parse_active(&json).unwrap(), doc);
    }

    #[test]
    fn summary_copies_listing_fields() {
        let project = sample_project("demo");
        let summary = project.summary();
        assert_eq!(summary.name, project.name);
        assert_eq!(summary.description, "sample");
    }
}
