//! The rule layer. Every operation takes already-parsed identifiers, checks
//! access and entity rules against the store, mutates it (transactionally
//! where more than one row changes) and returns the re-fetched canonical view.
//!
//! All methods are synchronous; handlers call them from `spawn_blocking`.

mod access;
mod comments;
mod conversations;
mod messages;
mod users;
mod views;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use courier_db::Database;

use crate::clock::Clock;

pub use conversations::Removal;
pub use messages::MessageDraft;

/// Result of an operation that either made something new or found it
/// already there. `Existing` is the conflict signal for duplicate private
/// conversations; callers still receive the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Created(T),
    Existing(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(v) | Self::Existing(v) => v,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

pub struct Service {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl Service {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Length in characters, not bytes.
fn char_len(s: &str) -> usize {
    s.chars().count()
}
