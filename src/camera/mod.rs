//! Perspective camera described the way a photographer would: near and far
//! planes plus a focal length on a full-frame sensor.

/// Core camera struct and projection updates.
pub mod core;

pub use self::core::Camera;
