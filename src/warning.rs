use std::fmt;

use parking_lot::Mutex;

use crate::key::Key;

/// Developer-facing report of local misuse. Warnings never fail a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A command targeted a key that is not in the store
    MissingItem {
        resource: String,
        operation: &'static str,
        key: Key,
    },
    /// A create reused the key of an entity already confirmed by the remote
    KeyCollision { resource: String, key: Key },
    /// editNewItem was used while no new item exists
    NoNewItem { resource: String },
    /// editNewItem targeted an entity that has left the NEW state
    NotNewItem { resource: String, key: Key },
    /// clearItemEdit on an entity without unconfirmed edits
    NothingToClear { resource: String, key: Key },
    /// A create response did not carry the resource identity
    MissingIdentity { resource: String, temporary_key: Key },
    /// Association fix-up fell back to scanning every owner entity
    MissingPreviousValues {
        owner: String,
        associated: String,
        operation: &'static str,
        key: Key,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingItem {
                resource,
                operation,
                key,
            } => write!(
                f,
                "{}: {} of '{}' which is not in the store; the entity was synthesized",
                resource, operation, key
            ),
            Warning::KeyCollision { resource, key } => write!(
                f,
                "{}: create reused key '{}' of an existing entity; use update instead",
                resource, key
            ),
            Warning::NoNewItem { resource } => {
                write!(f, "{}: editNewItem called without a new item", resource)
            }
            Warning::NotNewItem { resource, key } => write!(
                f,
                "{}: editNewItem targeted '{}' which is no longer NEW; use editItem instead",
                resource, key
            ),
            Warning::NothingToClear { resource, key } => {
                write!(f, "{}: no unconfirmed edits to clear on '{}'", resource, key)
            }
            Warning::MissingIdentity {
                resource,
                temporary_key,
            } => write!(
                f,
                "{}: create response carries no identity; keeping temporary key '{}'",
                resource, temporary_key
            ),
            Warning::MissingPreviousValues {
                owner,
                associated,
                operation,
                key,
            } => write!(
                f,
                "{}: {} of {} '{}' without previous values scanned every owner; pass previous values",
                owner, operation, associated, key
            ),
        }
    }
}

/// Side channel collecting warnings raised by a store
#[derive(Debug)]
pub struct WarningLog {
    emit: bool,
    entries: Mutex<Vec<Warning>>,
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new(true)
    }
}

impl WarningLog {
    /// `emit` controls whether warnings are also logged through `tracing`
    pub fn new(emit: bool) -> Self {
        Self {
            emit,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, warning: Warning) {
        if self.emit {
            tracing::warn!("{}", warning);
        }
        self.entries.lock().push(warning);
    }

    pub fn entries(&self) -> Vec<Warning> {
        self.entries.lock().clone()
    }

    pub fn drain(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_drain() {
        let log = WarningLog::new(false);
        log.record(Warning::NoNewItem {
            resource: "users".to_string(),
        });

        assert_eq!(log.len(), 1);
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_display_names_resource() {
        let warning = Warning::KeyCollision {
            resource: "users".to_string(),
            key: "7".to_string(),
        };
        assert!(warning.to_string().starts_with("users: create reused key '7'"));
    }
}
