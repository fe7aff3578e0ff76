pub mod admin;
pub mod mpesa;
pub mod public;
