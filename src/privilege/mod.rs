//! Hierarchical privileges.
//!
//! Members and roles form a directed graph (not guaranteed acyclic by the
//! backing store). [`graph::PrivilegeGraph`] computes ancestor closures over
//! it; [`evaluator::PrivilegeEvaluator`] folds grant/deny statements layer by
//! layer into the final privilege set.

pub mod evaluator;
pub mod graph;

pub use evaluator::PrivilegeEvaluator;
pub use graph::PrivilegeGraph;

use crate::error::AuthError;
use crate::identity::Parameters;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A grant or deny assertion of one privilege at one hierarchy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeMode {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeStatement {
    pub name: String,
    pub mode: PrivilegeMode,
}

impl PrivilegeStatement {
    #[must_use]
    pub fn granted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: PrivilegeMode::Granted,
        }
    }

    #[must_use]
    pub fn denied(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: PrivilegeMode::Denied,
        }
    }
}

/// One privilege name left standing after evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeResult {
    pub name: String,
}

impl PrivilegeResult {
    /// Decompose the privilege name into a `(target, action)` permission,
    /// when it follows the `target:action` convention.
    #[must_use]
    pub fn permission(&self) -> Option<Permission> {
        Permission::parse(&self.name)
    }
}

/// A permission: a privilege decomposed into a target and an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub target: String,
    pub action: String,
}

impl Permission {
    /// Parse `target:action`; both parts must be non-empty.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (target, action) = name.split_once(':')?;
        if target.is_empty() || action.is_empty() {
            return None;
        }
        Some(Self {
            target: target.to_string(),
            action: action.to_string(),
        })
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.target, self.action)
    }
}

/// Parent-role edges of the member/role graph.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Direct parent-role identifiers of a member or role. Unknown
    /// identifiers have no parents.
    async fn parents_of(&self, identifier: &str) -> Result<Vec<String>, AuthError>;
}

/// Grant/deny statements attached to one identifier.
#[async_trait]
pub trait PrivilegeStore: Send + Sync {
    async fn statements_of(
        &self,
        identifier: &str,
        parameters: &Parameters,
    ) -> Result<Vec<PrivilegeStatement>, AuthError>;
}

/// In-memory role graph built at construction time.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleStore {
    parents: HashMap<String, Vec<String>>,
}

impl MemoryRoleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the direct parents of `member`.
    #[must_use]
    pub fn with_member<I, S>(mut self, member: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents
            .insert(member.into(), parents.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn parents_of(&self, identifier: &str) -> Result<Vec<String>, AuthError> {
        Ok(self.parents.get(identifier).cloned().unwrap_or_default())
    }
}

/// In-memory privilege statements built at construction time.
#[derive(Debug, Default, Clone)]
pub struct MemoryPrivilegeStore {
    statements: HashMap<String, Vec<PrivilegeStatement>>,
}

impl MemoryPrivilegeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_statements<I>(mut self, identifier: impl Into<String>, statements: I) -> Self
    where
        I: IntoIterator<Item = PrivilegeStatement>,
    {
        self.statements
            .insert(identifier.into(), statements.into_iter().collect());
        self
    }
}

#[async_trait]
impl PrivilegeStore for MemoryPrivilegeStore {
    async fn statements_of(
        &self,
        identifier: &str,
        _parameters: &Parameters,
    ) -> Result<Vec<PrivilegeStatement>, AuthError> {
        Ok(self.statements.get(identifier).cloned().unwrap_or_default())
    }
}
