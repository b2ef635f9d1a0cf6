pub mod route;
pub mod seed;

pub use route::{DeviceEmulator, RouteConfig};
pub use seed::{seed_demo, DEMO_ACCOUNTS, DEMO_PASSWORD};
