use std::collections::BTreeMap;

use crate::error::{StorageError, StorageResult};

/// The principal a database session acts for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub guest: bool,
}

impl Identity {
    pub fn guest() -> Self {
        Self {
            name: "guest".into(),
            guest: true,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guest: false,
        }
    }
}

/// Principal -> credential lookup.
///
/// With no entries every principal is admitted; an empty principal is then
/// the guest.
#[derive(Clone, Debug, Default)]
pub struct CredentialTable {
    entries: BTreeMap<String, String>,
}

impl CredentialTable {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn is_open(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn authenticate(&self, principal: &str, credential: &str) -> StorageResult<Identity> {
        if self.is_open() {
            return Ok(if principal.is_empty() {
                Identity::guest()
            } else {
                Identity::user(principal)
            });
        }
        match self.entries.get(principal) {
            Some(expected) if expected == credential => Ok(Identity::user(principal)),
            _ => Err(StorageError::AuthFailed(principal.to_string())),
        }
    }
}
