use tracing::{info, warn};
use uuid::Uuid;

use courier_db::DbError;
use courier_types::models::User;

use super::views::user;
use super::{Outcome, Service, char_len};
use crate::error::{ApiError, Result};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 16;

fn validate_username(username: &str) -> Result<()> {
    let len = char_len(username);
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ApiError::BadRequest("username must be 3-16 characters"));
    }
    Ok(())
}

impl Service {
    /// Logs in by username, creating the user on first sight.
    pub fn login(&self, username: &str) -> Result<Outcome<User>> {
        validate_username(username)?;

        if let Some(existing) = self.db.get_user_by_username(username)? {
            return Ok(Outcome::Existing(user(existing)));
        }

        let id = Uuid::new_v4();
        match self.db.insert_user(id, username, self.now()) {
            Ok(()) => {
                info!("Created user {} ({})", username, id);
                Ok(Outcome::Created(self.get_user(id)?))
            }
            // Lost a race with a concurrent first login for the same name.
            Err(DbError::Conflict { .. }) => self
                .db
                .get_user_by_username(username)?
                .map(|row| Outcome::Existing(user(row)))
                .ok_or(ApiError::Internal),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves a bearer token (the user's id) to an existing user.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let id: Uuid = token.parse().map_err(|_| ApiError::Unauthorized)?;
        match self.db.get_user_by_id(id)? {
            Some(row) => Ok(user(row)),
            None => {
                warn!("Bearer token for unknown user {}", id);
                Err(ApiError::Unauthorized)
            }
        }
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.db
            .get_user_by_id(id)?
            .map(user)
            .ok_or(ApiError::NotFound("user"))
    }

    /// Everyone except the requester, optionally filtered by username prefix.
    pub fn search_users(&self, requester: Uuid, query: Option<&str>) -> Result<Vec<User>> {
        let query = query.filter(|q| !q.is_empty());
        if let Some(q) = query {
            if char_len(q) > USERNAME_MAX {
                return Err(ApiError::BadRequest("query must be at most 16 characters"));
            }
        }
        let rows = self.db.search_users(requester, query)?;
        Ok(rows.into_iter().map(user).collect())
    }

    pub fn update_username(&self, id: Uuid, username: &str) -> Result<User> {
        validate_username(username)?;

        if let Some(existing) = self.db.get_user_by_username(username)? {
            if existing.id != id {
                return Err(ApiError::Conflict("username"));
            }
        }

        self.db.update_username(id, username)?;
        self.get_user(id)
    }

    /// Returns the updated user and the picture reference that was replaced.
    pub fn update_profile_picture(&self, id: Uuid, picture: &str) -> Result<(User, Option<String>)> {
        let replaced = self.db.update_profile_picture(id, picture)?;
        Ok((self.get_user(id)?, replaced))
    }
}
