mod studio;

use std::path::{Path, PathBuf};

use anyhow::Result;

use phosphor_engine::coords::Rgb;
use phosphor_engine::device::GpuInit;
use phosphor_engine::logging::{LoggingConfig, init_logging};
use phosphor_engine::text::candidate_sources;
use phosphor_engine::window::{Runtime, RuntimeConfig};

use studio::{StudioApp, StudioConfig};

const FONT_FAMILY: &str = "DejaVuSansMono";
const FONT_SIZE: f32 = 28.0;

// Global scale factor for the intermediate render passes.
const TEX_SCALE: f32 = 1.0;

/// Font files to try, in order. `PHOSPHOR_FONT` (a path list) replaces the
/// built-in search.
fn font_sources() -> Vec<PathBuf> {
    if let Some(paths) = std::env::var_os("PHOSPHOR_FONT") {
        return std::env::split_paths(&paths).collect();
    }

    let mut sources = candidate_sources(Path::new("public"), FONT_FAMILY, &["woff", "ttf", "eot"]);
    sources.extend(
        [
            "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
            "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
            "/usr/share/fonts/dejavu-sans-mono-fonts/DejaVuSansMono.ttf",
        ]
        .map(PathBuf::from),
    );
    sources
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = StudioConfig {
        font_family: FONT_FAMILY.to_owned(),
        font_sources: font_sources(),
        font_size: FONT_SIZE,
        tex_scale: TEX_SCALE,
        text_color: Rgb::amber(),
    };

    Runtime::run(
        RuntimeConfig {
            title: "phosphor".to_owned(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        StudioApp::new(config),
    )
}
