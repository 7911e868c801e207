pub mod auth;
pub mod insights;
pub mod tx;
pub mod user;
pub mod utils;
