//! # decoder-core
//!
//! Базовые типы, трейты и определения ошибок для WFST-декодера.
//!
//! Этот крейт предоставляет фундаментальные абстракции для остальных
//! крейтов в workspace:
//!
//! - Общие типы (`Label`, `StateId`, `DecodeStats`)
//! - Конфигурация beam search ([`FasterDecoderConfig`])
//! - Унифицированная обработка ошибок через [`DecoderError`]
//! - Trait [`Scorer`]: источник акустических стоимостей
//! - Готовые скореры: матричный, масштабирующий, потоковый

pub mod config;
pub mod debug;
pub mod error;
pub mod scorer;
pub mod traits;
pub mod types;

pub use config::FasterDecoderConfig;
pub use error::{DecoderError, DecoderResult};
pub use scorer::{MatrixScorer, ScaledScorer, StreamingFeeder, StreamingScorer};
pub use traits::Scorer;
pub use types::{DecodeStats, Label, StateId, EPSILON};
