pub mod admin_user;
pub mod payment;
pub mod submission;
