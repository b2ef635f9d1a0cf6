pub mod auth;
pub mod config;

pub use auth::AuthService;
pub use config::ServiceConfig;
