//! Error types for the WFST decoder.

use thiserror::Error;

/// Main error type for decoding operations.
#[derive(Error, Debug)]
pub enum DecoderError {
    /// Граф не имеет стартового состояния.
    #[error("Graph error: FST has no start state")]
    NoStartState,

    /// Цикл по epsilon-дугам (граф поиска или back-off цепочка LM).
    #[error("Graph error: epsilon cycle through state {state}")]
    EpsilonCycle { state: u32 },

    /// Автомат, переданный в on-demand композицию, недетерминирован.
    #[error("Graph error: state {state} has more than one arc with input label {label}")]
    NonDeterministic { state: u32, label: u32 },

    /// Запрос кадра, которого у скорера нет.
    #[error("Scorer error: frame {frame} requested, {ready} frames ready")]
    FrameOutOfRange { frame: usize, ready: usize },

    /// Запрос индекса вне диапазона скорера.
    #[error("Scorer error: index {index} out of range (num_indices = {num_indices})")]
    IndexOutOfRange { index: u32, num_indices: usize },

    /// Операция вызвана в неподходящем состоянии декодера.
    #[error("Invalid decoder state: {0}")]
    InvalidState(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for decoding operations.
pub type DecoderResult<T> = Result<T, DecoderError>;
