pub mod admin;
pub mod mpesa_handlers;
pub mod submissions;
