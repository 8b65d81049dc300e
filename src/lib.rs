// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! GPU impostor renderer for molecular structures, built on wgpu.
//!
//! Spheron draws atoms as ray-cast sphere impostors and bonds as cylinder
//! impostors, with optional shadow mapping, depth cueing and spatial
//! upscaling. Structures with several configurations (trajectory frames or
//! conformers) share one device buffer and are played back by moving an
//! index window over it.
//!
//! # Key entry points
//!
//! - [`renderer::Renderer`] - owns the device resources and draws frames
//! - [`scene::Scene`] - camera, lighting and colour state with a dirty flag
//! - [`geometry::GeometrySnapshot`] - immutable structure handed to the
//!   renderer
//! - [`options::RenderOptions`] - TOML-backed render configuration
//! - [`capture`] - blocking high-quality still capture
//!
//! # Architecture
//!
//! Each frame the [`renderer::frame::FramePacer`] checks whether the scene
//! is dirty or playing, waits for one of N frame slots, writes that slot's
//! uniform buffer and encodes the passes in a fixed order: fill colour,
//! shadow map, shadow blur, depth pre-pass, impostors, debug points,
//! upscale and present. The slot is handed back from the GPU completion
//! callback, so the CPU never runs more than N frames ahead.
//!
//! Pipelines are compiled lazily through [`pipeline::PipelineCache`], keyed
//! by program name and specialization, and can be pre-warmed on a
//! background thread.

pub mod camera;
pub mod capture;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod math;
pub mod options;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod util;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use error::SpheronError;
pub use renderer::Renderer;
pub use scene::Scene;
