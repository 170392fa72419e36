pub mod credentials;
pub mod gate;

pub use gate::{AdminUser, AuthUser};
