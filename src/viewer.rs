//! Standalone window backed by winit.
//!
//! Loads a synthetic multi-configuration chain and redraws continuously.
//!
//! | Key        | Action                          |
//! |------------|---------------------------------|
//! | Space      | play / pause configurations     |
//! | Left/Right | step one configuration          |
//! | B          | toggle ball-and-stick           |
//! | S          | toggle shadows                  |
//! | C          | colour by element / subunit     |
//! | R          | reset the camera                |
//! | P          | high-quality capture            |
//! | T          | benchmark the next 120 frames   |
//!
//! ```no_run
//! # use spheron::viewer::Viewer;
//! Viewer::builder()
//!     .with_structure(2000, 40)
//!     .build()
//!     .run()
//!     .unwrap();
//! ```

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    error::SpheronError,
    geometry::{synthetic, Visualization},
    gpu::render_context::RenderContext,
    options::RenderOptions,
    renderer::frame::FrameOutcome,
    scene::ColorBy,
    util::frame_timing::FrameTiming,
    Renderer,
};

/// Radians of rotation per pixel of mouse drag.
const DRAG_SENSITIVITY: f32 = 0.005;
const BENCHMARK_FRAMES: usize = 120;

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
pub struct ViewerBuilder {
    options: RenderOptions,
    title: String,
    atoms: usize,
    configurations: usize,
    seed: u64,
    frame_limit: u32,
}

impl ViewerBuilder {
    fn new() -> Self {
        Self {
            options: RenderOptions::default(),
            title: "Spheron".into(),
            atoms: 1500,
            configurations: 60,
            seed: 7,
            frame_limit: 0,
        }
    }

    /// Cap redraws per second; `0` leaves pacing to the surface.
    #[must_use]
    pub fn with_frame_limit(mut self, fps: u32) -> Self {
        self.frame_limit = fps;
        self
    }

    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Size of the generated structure.
    #[must_use]
    pub fn with_structure(mut self, atoms: usize, configurations: usize) -> Self {
        self.atoms = atoms;
        self.configurations = configurations;
        self
    }

    /// Seed of the generated structure.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        Viewer { builder: self }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A window showing one synthetic structure.
///
/// Construct via [`Viewer::builder`], then call [`run`](Self::run) to
/// enter the event loop.
pub struct Viewer {
    builder: ViewerBuilder,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Open the window and run the event loop. Blocks until the window is
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`SpheronError::Viewer`] if the event loop fails.
    pub fn run(self) -> Result<(), SpheronError> {
        let event_loop =
            EventLoop::new().map_err(|e| SpheronError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = ViewerApp {
            window: None,
            renderer: None,
            timing: FrameTiming::new(self.builder.frame_limit),
            settings: self.builder,
            dragging: false,
            last_cursor: None,
        };
        event_loop
            .run_app(&mut app)
            .map_err(|e| SpheronError::Viewer(e.to_string()))
    }
}

// ── Winit app ────────────────────────────────────────────────────────────

struct ViewerApp {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    timing: FrameTiming,
    settings: ViewerBuilder,
    dragging: bool,
    last_cursor: Option<(f32, f32)>,
}

impl ViewerApp {
    fn create_renderer(&self, window: &Arc<Window>) -> Result<Renderer, SpheronError> {
        let inner = window.inner_size();
        let size = (inner.width.max(1), inner.height.max(1));
        let context =
            pollster::block_on(RenderContext::new(Arc::clone(window), size))?;
        let mut renderer = Renderer::new(context, self.settings.options.clone())?;

        let snapshot = synthetic::random_chain(
            self.settings.atoms,
            self.settings.configurations,
            self.settings.seed,
        )?;
        renderer.set_geometry(snapshot)?;
        Ok(renderer)
    }

    fn handle_key(renderer: &mut Renderer, code: KeyCode) {
        match code {
            KeyCode::Space => renderer.toggle_playback(),
            KeyCode::ArrowRight => renderer.next_configuration(),
            KeyCode::ArrowLeft => renderer.previous_configuration(),
            KeyCode::KeyB => {
                let next = match renderer.scene().visualization() {
                    Visualization::SolidSpheres => Visualization::BallAndStick,
                    Visualization::BallAndStick => Visualization::SolidSpheres,
                };
                renderer.set_visualization(next);
            }
            KeyCode::KeyS => {
                let enabled = !renderer.scene().has_shadows();
                renderer.set_shadows(enabled);
            }
            KeyCode::KeyC => {
                let next = match renderer.options().display.color_by {
                    ColorBy::Element => ColorBy::Subunit,
                    ColorBy::Subunit => ColorBy::Element,
                };
                renderer.color_by(next);
            }
            KeyCode::KeyR => renderer.scene_mut().reset_camera(),
            KeyCode::KeyT => renderer.start_benchmark(BENCHMARK_FRAMES),
            KeyCode::KeyP => {
                let photo = renderer.options().quality.photo();
                match renderer.draw_high_quality_frame(&photo, None) {
                    Ok(image) => log::info!(
                        "photo: {}x{} ({} bytes)",
                        image.width,
                        image.height,
                        image.rgba.len()
                    ),
                    Err(e) => log::error!("photo failed: {e}"),
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(&self.settings.title)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match self.create_renderer(&window) {
            Ok(renderer) => {
                window.request_redraw();
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("Failed to start renderer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        if matches!(event, WindowEvent::CloseRequested) {
            event_loop.exit();
            return;
        }
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        match event {
            WindowEvent::Resized(size) => {
                renderer.resize(size.width, size.height);
            }

            WindowEvent::RedrawRequested => {
                if self.timing.should_render() {
                    if renderer.draw_frame() == FrameOutcome::Dropped {
                        log::debug!("frame dropped");
                    }
                    self.timing.end_frame();
                }
                if let Some(run) = renderer.take_benchmark() {
                    let measure = if run.is_gpu_timed() {
                        "GPU time"
                    } else {
                        "submit latency"
                    };
                    log::info!(
                        "benchmark: {} frames, mean {measure} {:?}",
                        run.samples().len(),
                        run.mean()
                    );
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
            }

            WindowEvent::CursorMoved { position, .. } => {
                let cursor = (position.x as f32, position.y as f32);
                if let (true, Some((x, y))) = (self.dragging, self.last_cursor) {
                    renderer.scene_mut().rotate(
                        (cursor.0 - x) * DRAG_SENSITIVITY,
                        (cursor.1 - y) * DRAG_SENSITIVITY,
                    );
                }
                self.last_cursor = Some(cursor);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    Self::handle_key(renderer, code);
                }
            }

            _ => (),
        }
    }
}
