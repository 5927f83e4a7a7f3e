//! Derived-identity memo cache.
//!
//! Maps `(credential id, optional scheme)` to a transformed identity model,
//! computed lazily and kept until the ticket's change token fires. The
//! create-once-per-key primitive is an insert-if-absent under a write lock:
//! concurrent first calls for the same key may each compute the value, but
//! only the first stored result is kept; duplicate work is wasted, not
//! incorrect.

use crate::error::AuthError;
use crate::identity::ClaimsIdentity;
use crate::ticket::{ChangeWatcher, CredentialTicket};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;

type MemoKey = (String, Option<String>);

#[derive(Debug)]
struct MemoEntry<T> {
    value: T,
    watcher: ChangeWatcher,
}

#[derive(Debug, Default)]
pub struct MemoCache<T> {
    entries: RwLock<HashMap<MemoKey, MemoEntry<T>>>,
}

impl<T: Clone + Send + Sync> MemoCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the memoized model for this ticket, computing it when absent
    /// or when the ticket's change token has fired since it was stored.
    ///
    /// # Errors
    /// Propagates the transform's error; nothing is cached on failure.
    pub async fn get_or_compute<F, Fut>(
        &self,
        ticket: &CredentialTicket,
        scheme: Option<&str>,
        transform: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(ClaimsIdentity) -> Fut,
        Fut: Future<Output = Result<T, AuthError>> + Send,
    {
        let key = (
            ticket.credential_id().to_string(),
            scheme.map(str::to_string),
        );
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if !entry.watcher.has_fired() {
                    return Ok(entry.value.clone());
                }
            }
        }

        // Compute outside the lock; racing computations are tolerated.
        let value = transform(ticket.identity().clone()).await?;

        // An entry for a dead ticket would be dead on arrival; hand the
        // value back without storing it.
        if ticket.is_invalidated() {
            return Ok(value);
        }

        let mut entries = self.entries.write().await;
        match entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().watcher.has_fired() {
                    occupied.insert(MemoEntry {
                        value: value.clone(),
                        watcher: ticket.watch(),
                    });
                    Ok(value)
                } else {
                    // Another computation won the race; keep its result.
                    Ok(occupied.get().value.clone())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoEntry {
                    value: value.clone(),
                    watcher: ticket.watch(),
                });
                Ok(value)
            }
        }
    }

    /// Drop entries whose tickets have been invalidated.
    pub async fn purge(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.watcher.has_fired());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
