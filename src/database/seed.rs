use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use tracing::{info, warn};

use crate::errors::Result;
use crate::models::admin_user::AdminUser;

/// Creates the initial admin account from ADMIN_EMAIL / ADMIN_PASSWORD when
/// one does not already exist. A no-op if the variables are unset.
pub async fn seed_admin(db: &Database) -> Result<()> {
    let (email, password) = match (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => (email, password),
        _ => return Ok(()),
    };

    let collection: Collection<AdminUser> = db.collection("admin_users");

    if let Some(existing) = collection.find_one(doc! { "email": &email }).await? {
        info!("Admin already exists: {}", existing.email);
        return Ok(());
    }

    let password_hash = match hash(&password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            warn!("Failed to hash admin password: {}", e);
            return Ok(());
        }
    };

    let admin = AdminUser {
        id: None,
        username: "superadmin".to_string(),
        email: email.to_lowercase(),
        password_hash,
        is_admin: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    collection.insert_one(&admin).await?;
    info!("Admin user created: {}", admin.email);
    Ok(())
}
