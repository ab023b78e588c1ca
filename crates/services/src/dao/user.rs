use bson::{DateTime, doc};
use finadvise_db::models::User;
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoResult};

/// Profile fields as asserted by the identity provider.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl UserProfile {
    /// "First Last", or `None` when neither is known.
    pub fn full_name(&self) -> Option<String> {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let full = full.trim();
        (!full.is_empty()).then(|| full.to_string())
    }
}

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    /// Creates or refreshes the stored copy of an identity-provider profile.
    pub async fn sync(&self, profile: &UserProfile) -> DaoResult<User> {
        let user = self
            .base
            .upsert_and_fetch(
                doc! { "_id": profile.id.as_str() },
                doc! {
                    "$set": {
                        "email": profile.email.as_str(),
                        "first_name": profile.first_name.as_deref(),
                        "last_name": profile.last_name.as_deref(),
                        "full_name": profile.full_name(),
                        "image_url": profile.image_url.as_deref(),
                    },
                    "$setOnInsert": { "created_at": DateTime::now() },
                },
            )
            .await?;
        info!(user_id = %user.id, "User profile synced");
        Ok(user)
    }

    pub async fn find(&self, id: &str) -> DaoResult<User> {
        self.base.find_by_id(id).await
    }
}
