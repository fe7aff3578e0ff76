pub mod connection;
pub mod seed;
