pub mod routes;

pub use routes::{api_routes, handle_rejection};
