// ============================================================================
// ENGINE ERRORS
// ============================================================================
//
// Only allocation/shape failures and I/O boundary problems are errors.
// Invalid input (degenerate selection, zero-sized resize, ...) is a no-op and
// undo/redo on an empty history is a no-op too; neither reaches this type.

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A pixel buffer of the requested size could not be allocated.
    #[error("cannot allocate a {width}x{height} pixel buffer")]
    Allocation { width: u32, height: u32 },

    /// The requested encoding is not available in this build.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl EngineError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors a caller should answer by falling back to PNG.
    pub fn is_unsupported(&self) -> bool {
        match self {
            EngineError::UnsupportedFormat(_) => true,
            EngineError::Image(image::ImageError::Unsupported(_)) => true,
            _ => false,
        }
    }
}
