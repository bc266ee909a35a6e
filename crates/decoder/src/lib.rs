//! # decoder
//!
//! Frame-synchronous token-passing Viterbi beam search по WFST-графу.
//!
//! - [`FasterDecoder`]: поиск по графу, стоимости кадров от [`decoder_core::Scorer`]
//! - [`BiglmFasterDecoder`]: то же с большой LM через on-demand композицию
//! - [`LinearPath`]: лучший путь
//!
//! # Пример
//!
//! ```ignore
//! use decoder::FasterDecoder;
//! use decoder_core::{FasterDecoderConfig, MatrixScorer};
//!
//! let mut decoder = FasterDecoder::new(&graph, FasterDecoderConfig::with_beam(13.0))?;
//! decoder.decode(&mut scorer)?;
//! match decoder.best_path(true)? {
//!     Some(path) => println!("{:?} cost={}", path.words(), path.total_cost()),
//!     None => println!("no path"),
//! }
//! ```

mod best_path;
mod biglm;
mod engine;
mod faster;
pub mod pruning;
pub mod space;
pub mod table;
pub mod token;

pub use best_path::LinearPath;
pub use biglm::BiglmFasterDecoder;
pub use engine::{DecoderState, FramePruning, TokenPassingDecoder};
pub use faster::FasterDecoder;
pub use space::{BiglmSpace, GraphSpace, PairId, SearchSpace};
