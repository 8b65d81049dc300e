//! Demo viewer: a synthetic chain with playback, shadows and photo
//! capture.
//!
//! Usage: `spheron [OPTIONS.toml]`

use std::path::Path;

use spheron::{options::RenderOptions, viewer::Viewer};

fn main() {
    env_logger::init();

    let options = match std::env::args().nth(1) {
        Some(path) => match RenderOptions::load(Path::new(&path)) {
            Ok(options) => options,
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        None => RenderOptions::default(),
    };

    if let Err(e) = Viewer::builder().with_options(options).build().run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
