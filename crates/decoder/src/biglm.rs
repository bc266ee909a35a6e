//! Декодер с большой LM, подключённой через on-demand композицию.
//!
//! Граф скомпилирован с маленькой LM; `lm` обычно строится через [`wfst::lm_difference`]
//! (вычесть маленькую, добавить большую). Ключ таблицы: пара
//! (состояние графа, состояние LM): разные состояния LM никогда не
//! сливаются, даже при близких стоимостях.

use decoder_core::{DecoderResult, FasterDecoderConfig};
use wfst::{DeterministicOnDemandFst, Fst};

use crate::engine::TokenPassingDecoder;
use crate::space::BiglmSpace;

pub type BiglmFasterDecoder<F, L> = TokenPassingDecoder<BiglmSpace<F, L>>;

impl<F: Fst, L: DeterministicOnDemandFst> TokenPassingDecoder<BiglmSpace<F, L>> {
    /// `lm` должен быть детерминированным; иначе результат не определён.
    pub fn new(fst: F, lm: L, config: FasterDecoderConfig) -> DecoderResult<Self> {
        Self::with_space(BiglmSpace::new(fst, lm)?, config)
    }

    pub fn fst(&self) -> &F {
        self.space().fst()
    }
}
