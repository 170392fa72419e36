pub mod admin_tasks;
pub mod auth;
pub mod tasks;
