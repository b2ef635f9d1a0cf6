pub mod envelope;
pub mod point;
pub mod user;

pub use envelope::{ApiResponse, SessionPayload};
pub use point::{GeoPoint, LocationReport};
pub use user::User;
