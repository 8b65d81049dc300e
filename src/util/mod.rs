//! Small helpers shared by the scene and the renderer: easing curves,
//! frame timing and compute dispatch sizing.

pub mod dispatch;
pub mod easing;
pub mod frame_timing;
