pub mod app;
pub mod auth;
pub mod authz;
pub mod db;
pub mod docs;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod routes;
pub mod users;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, create_app_with};
