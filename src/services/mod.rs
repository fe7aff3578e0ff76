pub mod email_service;
pub mod mpesa_service;
pub mod phone;
pub mod refs;
