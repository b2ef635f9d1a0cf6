pub mod bounds;
pub mod trail;
pub mod validate;

pub use bounds::Bounds;
pub use trail::{bearing_deg, partition_by_device, ArrowPlacement, Trail};
pub use validate::{is_valid_coordinate, newest_valid, valid_points};
