//! Grant/deny privilege evaluation over ordered hierarchy layers.
//!
//! Layers are processed from the farthest ancestor toward the subject, the
//! subject itself last, so a nearer statement always has the final say over a
//! farther one for the same privilege name. Within a single layer the order
//! is fixed deliberately: all grants apply before all denies, so a deny beats
//! a grant at equal level.

use super::{PrivilegeGraph, PrivilegeMode, PrivilegeResult, PrivilegeStatement, PrivilegeStore};
use crate::error::AuthError;
use crate::identity::{ClaimsIdentity, Parameters};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct PrivilegeEvaluator {
    graph: PrivilegeGraph,
    privileges: Arc<dyn PrivilegeStore>,
}

impl PrivilegeEvaluator {
    #[must_use]
    pub fn new(graph: PrivilegeGraph, privileges: Arc<dyn PrivilegeStore>) -> Self {
        Self { graph, privileges }
    }

    /// Resolve the final granted privilege set for `identifier`.
    ///
    /// An empty identifier resolves against the ambient caller identity when
    /// one is present, and otherwise evaluates to nothing.
    ///
    /// # Errors
    /// Propagates role-store and privilege-store failures.
    pub async fn evaluate(
        &self,
        identifier: &str,
        ambient: Option<&ClaimsIdentity>,
        parameters: &Parameters,
    ) -> Result<Vec<PrivilegeResult>, AuthError> {
        let subject = match resolve_subject(identifier, ambient) {
            Some(subject) => subject,
            None => return Ok(Vec::new()),
        };

        let layers = self.graph.ancestor_layers(&subject, 0).await?;
        let mut granted: HashSet<String> = HashSet::new();

        // ancestor_layers is nearest-first; walk it backwards so the most
        // distant ancestors speak first and the subject overrides last.
        for layer in layers.iter().rev() {
            let mut statements: Vec<PrivilegeStatement> = Vec::new();
            for identifier in layer {
                statements.extend(self.privileges.statements_of(identifier, parameters).await?);
            }
            apply_layer(&mut granted, &statements);
        }
        let own = self.privileges.statements_of(&subject, parameters).await?;
        apply_layer(&mut granted, &own);

        debug!(subject = %subject, privileges = granted.len(), "evaluated privileges");
        let mut names: Vec<String> = granted.into_iter().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| PrivilegeResult { name })
            .collect())
    }
}

fn resolve_subject(identifier: &str, ambient: Option<&ClaimsIdentity>) -> Option<String> {
    let identifier = identifier.trim();
    if !identifier.is_empty() {
        return Some(identifier.to_string());
    }
    match ambient {
        Some(identity) if !identity.is_anonymous() => Some(identity.subject.trim().to_string()),
        _ => None,
    }
}

fn apply_layer(granted: &mut HashSet<String>, statements: &[PrivilegeStatement]) {
    for statement in statements {
        if statement.mode == PrivilegeMode::Granted {
            granted.insert(statement.name.clone());
        }
    }
    // Denies second: at equal hierarchy level a deny always wins.
    for statement in statements {
        if statement.mode == PrivilegeMode::Denied {
            granted.remove(&statement.name);
        }
    }
}
