//! Ground-collision checks on top of the height field cache.

mod detector;

pub use detector::{AircraftCheck, CarCheck, CollisionDetector};
