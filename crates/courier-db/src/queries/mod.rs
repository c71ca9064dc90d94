mod comments;
mod conversations;
mod messages;
mod users;

pub use messages::NewMessage;

/// `?1, ?2, ... ?n` for an `IN (...)` clause, numbered from `first`.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use crate::Database;

    pub fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_user(id, name, ts(0)).unwrap();
        id
    }
}
