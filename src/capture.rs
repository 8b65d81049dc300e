//! High-quality still capture.
//!
//! [`crate::Renderer::draw_high_quality_frame`] renders one square frame
//! into its own transient texture set with the high-quality pipeline
//! variants, blocks until the GPU is done and hands back the pixels.

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, PoisonError},
};

/// Sizes and background of a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoConfig {
    /// Edge of the square output image, in pixels.
    pub final_texture_size: u32,
    /// Edge of the square shadow map used for the photo.
    pub shadow_texture_size: u32,
    /// Clear to transparent black instead of the viewer background.
    pub clear_background: bool,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            final_texture_size: 2048,
            shadow_texture_size: 8192,
            clear_background: false,
        }
    }
}

/// Gate the capture waits on right before submission, so the caller can
/// line the shot up with something else (a UI flash, a file dialog).
///
/// Clones share the same gate.
#[derive(Debug, Clone, Default)]
pub struct ShutterGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutterGate {
    /// A closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate, releasing every waiter. Stays open.
    pub fn open(&self) {
        let (open, opened) = &*self.inner;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        opened.notify_all();
    }

    /// Whether [`ShutterGate::open`] was called.
    pub fn is_open(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the gate is open.
    pub fn wait(&self) {
        let (open, opened) = &*self.inner;
        let guard = open.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = opened
            .wait_while(guard, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Tightly packed RGBA8 pixels of a capture, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Why a capture failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No geometry is loaded; nothing was encoded.
    MissingGeometry,
    /// Texture allocation, pipeline compilation or readback failed.
    Unknown(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGeometry => f.write_str("no geometry loaded"),
            Self::Unknown(msg) => write!(f, "capture failed: {msg}"),
        }
    }
}

impl std::error::Error for CaptureError {}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn gate_releases_waiter() {
        let gate = ShutterGate::new();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        gate.open();
        waiter.join().unwrap();
        assert!(gate.is_open());
    }

    #[test]
    fn open_gate_does_not_block() {
        let gate = ShutterGate::new();
        gate.open();
        gate.wait();
    }

    #[test]
    fn default_photo_matches_print_sizes() {
        let photo = PhotoConfig::default();
        assert_eq!(photo.final_texture_size, 2048);
        assert_eq!(photo.shadow_texture_size, 8192);
    }
}
