use std::collections::HashMap;

use sea_orm::{QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, UserSummary, users, util::parse_uuid};

use super::Engine;

impl Engine {
    /// Finds a registered, non-deleted user by exact email.
    pub async fn find_user_by_email(&self, email: &str) -> ResultEngine<Option<UserSummary>> {
        if email.trim().is_empty() {
            return Ok(None);
        }
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?;
        model.map(UserSummary::try_from).transpose()
    }

    /// Maps every submitted email to a registered user id, matching
    /// case-insensitively. Fails with a `NotFound` that lists each unmatched
    /// email.
    pub async fn user_ids_by_emails(
        &self,
        emails: &[String],
    ) -> ResultEngine<HashMap<String, Uuid>> {
        let models = users::Entity::find()
            .filter(users::Column::Email.is_in(emails.iter().map(String::as_str)))
            .filter(users::Column::DeletedAt.is_null())
            .all(&self.database)
            .await?;

        let mut by_lower = HashMap::with_capacity(models.len());
        for model in models {
            by_lower.insert(model.email.to_lowercase(), parse_uuid(&model.id, "user")?);
        }

        let mut map = HashMap::with_capacity(emails.len());
        let mut missing = Vec::new();
        for email in emails {
            match by_lower.get(&email.to_lowercase()) {
                Some(id) => {
                    map.insert(email.clone(), *id);
                }
                None => missing.push(email.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(EngineError::NotFound(format!(
                "users not found for email(s): {}",
                missing.join(", ")
            )));
        }
        Ok(map)
    }
}
