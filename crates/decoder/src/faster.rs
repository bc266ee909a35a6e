//! Декодер по графу без внешней LM.

use decoder_core::{DecoderResult, FasterDecoderConfig};
use wfst::Fst;

use crate::engine::TokenPassingDecoder;
use crate::space::GraphSpace;

/// Beam search по графу: ключ таблицы = состояние графа.
pub type FasterDecoder<F> = TokenPassingDecoder<GraphSpace<F>>;

impl<F: Fst> TokenPassingDecoder<GraphSpace<F>> {
    /// Ошибки: epsilon-цикл в графе, некорректная конфигурация.
    ///
    /// # Пример
    /// ```ignore
    /// let mut decoder = FasterDecoder::new(&graph, FasterDecoderConfig::with_beam(13.0))?;
    /// decoder.decode(&mut scorer)?;
    /// let path = decoder.best_path(true)?;
    /// ```
    pub fn new(fst: F, config: FasterDecoderConfig) -> DecoderResult<Self> {
        Self::with_space(GraphSpace::new(fst)?, config)
    }

    pub fn fst(&self) -> &F {
        self.space().fst()
    }
}
