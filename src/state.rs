use mongodb::Database;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::email_service::EmailService;
use crate::services::mpesa_service::MpesaService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub mpesa_service: Option<Arc<MpesaService>>,
    pub email_service: Option<Arc<EmailService>>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        AppState {
            db,
            config,
            mpesa_service: None,
            email_service: None,
        }
    }

    pub fn with_mpesa(mut self, mpesa_service: Arc<MpesaService>) -> Self {
        self.mpesa_service = Some(mpesa_service);
        self
    }

    pub fn with_email(mut self, email_service: Arc<EmailService>) -> Self {
        self.email_service = Some(email_service);
        self
    }
}
