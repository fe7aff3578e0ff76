use mongodb::{Client, Database};
use std::env;
use tracing::{info, warn};

pub async fn get_db_client() -> Database {
    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set as an environment variable");
    let db_name = env::var("DATABASE_NAME").unwrap_or_else(|_| "fixitdb".to_string());

    let client = Client::with_uri_str(&database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(&db_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            info!("Connected to database: {}", db_name);
            info!("Collections found: {:?}", collections);
        }
        Err(e) => {
            warn!("Database '{}' may not exist or is inaccessible: {}", db_name, e);
        }
    }

    db
}
