use std::fmt;

use crate::coords::PixelDims;
use crate::text::{FontLoadError, SizeError};

/// Setup-time failure: shader compilation, pipeline linking or a malformed
/// pass/text configuration. Fatal; surfaced before the first frame runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The backend rejected a shader module or render pipeline.
    Shader { label: String, message: String },
    /// A vertex attribute declared an item size outside `1..=4`.
    AttributeSize { name: String, item_size: u32 },
    /// A program declared the same uniform or attribute name twice.
    DuplicateName { label: String, name: String },
    /// The pass sequence ends with a parallel pass after a series pass, so
    /// its output could never reach the screen.
    TrailingParallel { index: usize },
    /// A pass sequence was empty.
    EmptySequence,
    /// A glyph set expanded to nothing.
    EmptyGlyphSet,
    /// No font source for the requested family could be loaded.
    Font(FontLoadError),
    /// Text size could not be resolved.
    Size(SizeError),
    /// A texture or framebuffer would exceed the device's size limit.
    TextureTooLarge { label: String, dims: PixelDims, limit: u32 },
    /// A handle did not belong to this backend.
    UnknownHandle(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shader { label, message } => {
                write!(f, "program '{label}' failed to compile: {message}")
            }
            Self::AttributeSize { name, item_size } => {
                write!(f, "attribute '{name}' has unsupported item size {item_size}")
            }
            Self::DuplicateName { label, name } => {
                write!(f, "program '{label}' declares '{name}' more than once")
            }
            Self::TrailingParallel { index } => write!(
                f,
                "pass {index} is parallel but follows the last series pass; it would never reach the screen"
            ),
            Self::EmptySequence => write!(f, "pass sequence is empty"),
            Self::EmptyGlyphSet => write!(f, "glyph set is empty"),
            Self::Font(e) => write!(f, "{e}"),
            Self::Size(e) => write!(f, "text size: {e}"),
            Self::TextureTooLarge { label, dims, limit } => write!(
                f,
                "texture '{label}' is {}x{}, above the device limit of {limit}",
                dims.width, dims.height
            ),
            Self::UnknownHandle(kind) => write!(f, "unknown {kind} handle"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Font(e) => Some(e),
            Self::Size(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FontLoadError> for ConfigError {
    fn from(e: FontLoadError) -> Self {
        Self::Font(e)
    }
}

impl From<SizeError> for ConfigError {
    fn from(e: SizeError) -> Self {
        Self::Size(e)
    }
}

/// Per-frame draw failure reported by a backend. Not retried; propagates to
/// the caller of `PassPipeline::run_passes`.
#[derive(Debug)]
pub enum DrawError {
    /// The surface texture could not be acquired or presented.
    Surface(wgpu::SurfaceError),
    /// A pass targeted the screen but no screen target is bound this frame.
    NoScreenTarget,
    /// The program samples a texture slot that no uniform filled.
    UnboundTexture { program: String, slot: u32 },
    /// The compiled pass expects a vertex stream the descriptor did not supply.
    UnboundAttribute { program: String, location: u32 },
    /// A pass could not be compiled on first use.
    Config(ConfigError),
    /// A handle did not belong to this backend.
    UnknownHandle(&'static str),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface(e) => write!(f, "surface error: {e}"),
            Self::NoScreenTarget => write!(f, "no screen target bound for this frame"),
            Self::UnboundTexture { program, slot } => {
                write!(f, "program '{program}' has no texture bound at slot {slot}")
            }
            Self::UnboundAttribute { program, location } => {
                write!(f, "program '{program}' has no buffer bound at location {location}")
            }
            Self::Config(e) => write!(f, "pass configuration: {e}"),
            Self::UnknownHandle(kind) => write!(f, "unknown {kind} handle"),
        }
    }
}

impl std::error::Error for DrawError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Surface(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::SurfaceError> for DrawError {
    fn from(e: wgpu::SurfaceError) -> Self {
        Self::Surface(e)
    }
}

impl From<ConfigError> for DrawError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
