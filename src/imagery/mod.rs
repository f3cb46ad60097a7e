pub mod client;

pub use client::{FetchedImage, ImageSize, MAX_DIMENSION, StreetViewClient};
