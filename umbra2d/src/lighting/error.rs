use thiserror::Error;

/// Errors raised by the lighting pipeline and its backends.
///
/// Contract violations (opening a scene twice, ending a scene that was never
/// opened) are not represented here; they are reported through
/// `contract_violation!` instead.
#[derive(Debug, Error)]
pub enum LightingError {
    /// A GPU program failed to compile or validate.
    #[error("failed to compile {program} program: {message}")]
    ShaderCompilation {
        program: &'static str,
        message: String,
    },

    /// Settings could not be parsed or serialized.
    #[error("invalid lighting settings: {0}")]
    Config(#[from] serde_json::Error),

    /// IO error while reading or writing settings.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A render target the pass needs has not been created or supplied.
    #[error("render target not available: {0}")]
    MissingTarget(&'static str),

    /// The backend reported a GPU-side failure.
    #[error("graphics backend error: {0}")]
    Backend(String),
}

/// Reports a caller bug: fatal in debug builds, a logged no-op in release.
macro_rules! contract_violation {
    ($($arg:tt)+) => {{
        log::error!($($arg)+);
        debug_assert!(false, $($arg)+);
    }};
}

pub(crate) use contract_violation;
