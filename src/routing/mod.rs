pub mod client;
pub mod geometry;

pub use client::{DEFAULT_PROFILE, OrsClient, ResolvedRoute};
pub use geometry::{RoutePath, compass_bearing, haversine_m};
