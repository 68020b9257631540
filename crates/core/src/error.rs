/// Result alias that carries the custom [`PlaybackError`] type.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Session or configuration JSON could not be decoded.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The FFT planner rejected a buffer.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// An animation window with a zero, inverted or non-finite span.
    #[error("invalid animation window [{start}, {end}]")]
    InvalidWindow { start: f64, end: f64 },
    /// A beatmap without hit objects cannot anchor a session timeline.
    #[error("beatmap has no hit objects")]
    EmptyBeatmap,
    /// Caller supplied data that the component cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
