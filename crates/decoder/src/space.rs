//! Пространство поиска: что считается «состоянием» для таблицы токенов.
//!
//! - [`GraphSpace`]: состояние графа (обычный декодер).
//! - [`BiglmSpace`]: пара (состояние графа, состояние LM), упакованная в `u64`;
//!   LM опрашивается лениво через [`DeterministicOnDemandFst`].

use std::hash::Hash;

use decoder_core::{DecoderError, DecoderResult, StateId, EPSILON};
use wfst::{check_epsilon_acyclic, DeterministicOnDemandFst, Fst, FstArc, TropicalWeight};

/// Какие дуги разворачивать.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    /// Дуги с ненулевой входной меткой (потребляют кадр).
    Emitting,
    /// Epsilon-дуги.
    NonEmitting,
}

impl ArcKind {
    #[inline]
    fn accepts(self, arc: &FstArc) -> bool {
        match self {
            ArcKind::Emitting => arc.ilabel != EPSILON,
            ArcKind::NonEmitting => arc.ilabel == EPSILON,
        }
    }
}

/// Источник дуг для движка распространения токенов.
pub trait SearchSpace {
    /// Ключ таблицы активных состояний.
    type Key: Copy + Eq + Hash + std::fmt::Debug;

    /// Стартовый ключ и состояние графа, в котором начинается поиск.
    fn start(&mut self) -> DecoderResult<(Self::Key, StateId)>;

    /// Финальный вес ключа (`zero()` для нефинальных).
    fn final_weight(&mut self, key: Self::Key) -> DecoderResult<TropicalWeight>;

    /// Заполнить `out` дугами вида `kind` из `key` вместе с ключом назначения.
    fn expand(
        &mut self,
        key: Self::Key,
        kind: ArcKind,
        out: &mut Vec<(FstArc, Self::Key)>,
    ) -> DecoderResult<()>;

    /// Вызывается, когда в таблице не осталось ключей.
    fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// GraphSpace
// ---------------------------------------------------------------------------

/// Поиск напрямую по графу.
#[derive(Debug)]
pub struct GraphSpace<F> {
    fst: F,
}

impl<F: Fst> GraphSpace<F> {
    /// Ошибка [`DecoderError::EpsilonCycle`], если в графе есть цикл из
    /// epsilon-дуг.
    pub fn new(fst: F) -> DecoderResult<Self> {
        check_epsilon_acyclic(&fst)?;
        Ok(Self { fst })
    }

    pub fn fst(&self) -> &F {
        &self.fst
    }
}

impl<F: Fst> SearchSpace for GraphSpace<F> {
    type Key = StateId;

    fn start(&mut self) -> DecoderResult<(StateId, StateId)> {
        let s = self.fst.start().ok_or(DecoderError::NoStartState)?;
        Ok((s, s))
    }

    fn final_weight(&mut self, key: StateId) -> DecoderResult<TropicalWeight> {
        Ok(self.fst.final_weight(key))
    }

    fn expand(
        &mut self,
        key: StateId,
        kind: ArcKind,
        out: &mut Vec<(FstArc, StateId)>,
    ) -> DecoderResult<()> {
        out.clear();
        out.extend(
            self.fst
                .arcs(key)
                .iter()
                .filter(|a| kind.accepts(a))
                .map(|a| (*a, a.nextstate)),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BiglmSpace
// ---------------------------------------------------------------------------

/// Составное состояние (граф, LM), упакованное в один `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(u64);

impl PairId {
    #[inline]
    pub fn new(graph_state: StateId, lm_state: StateId) -> Self {
        Self(((graph_state as u64) << 32) | lm_state as u64)
    }

    #[inline]
    pub fn graph_state(self) -> StateId {
        (self.0 >> 32) as StateId
    }

    #[inline]
    pub fn lm_state(self) -> StateId {
        self.0 as StateId
    }
}

/// Поиск по графу, скомпонованному на лету с LM-разностью.
///
/// Дуга графа с выходной меткой 0 не меняет состояние LM. Иначе LM
/// опрашивается по выходной метке: если дуги нет, дуга графа отбрасывается;
/// если есть, её вес добавляется, выходная метка берётся из LM.
#[derive(Debug)]
pub struct BiglmSpace<F, L> {
    fst: F,
    lm: L,
}

impl<F: Fst, L: DeterministicOnDemandFst> BiglmSpace<F, L> {
    pub fn new(fst: F, lm: L) -> DecoderResult<Self> {
        check_epsilon_acyclic(&fst)?;
        Ok(Self { fst, lm })
    }

    pub fn fst(&self) -> &F {
        &self.fst
    }

    pub fn lm(&self) -> &L {
        &self.lm
    }

    pub fn lm_mut(&mut self) -> &mut L {
        &mut self.lm
    }

    /// Продвинуть состояние LM по дуге графа.
    fn propagate_lm(
        &mut self,
        lm_state: StateId,
        arc: &FstArc,
    ) -> DecoderResult<Option<(FstArc, StateId)>> {
        if arc.olabel == EPSILON {
            return Ok(Some((*arc, lm_state)));
        }
        let Some(lm_arc) = self.lm.get_arc(lm_state, arc.olabel)? else {
            return Ok(None);
        };
        let combined = FstArc {
            olabel: lm_arc.olabel,
            weight: arc.weight.times(lm_arc.weight),
            ..*arc
        };
        Ok(Some((combined, lm_arc.nextstate)))
    }
}

impl<F: Fst, L: DeterministicOnDemandFst> SearchSpace for BiglmSpace<F, L> {
    type Key = PairId;

    fn start(&mut self) -> DecoderResult<(PairId, StateId)> {
        let s = self.fst.start().ok_or(DecoderError::NoStartState)?;
        let lm = self.lm.start().ok_or(DecoderError::NoStartState)?;
        Ok((PairId::new(s, lm), s))
    }

    fn final_weight(&mut self, key: PairId) -> DecoderResult<TropicalWeight> {
        let graph_final = self.fst.final_weight(key.graph_state());
        if graph_final.is_zero() {
            return Ok(graph_final);
        }
        Ok(graph_final.times(self.lm.final_weight(key.lm_state())?))
    }

    fn expand(
        &mut self,
        key: PairId,
        kind: ArcKind,
        out: &mut Vec<(FstArc, PairId)>,
    ) -> DecoderResult<()> {
        out.clear();
        let lm_state = key.lm_state();
        // Индексы вместо итератора: propagate_lm требует &mut self.
        for i in 0..self.fst.num_arcs(key.graph_state()) {
            let arc = self.fst.arcs(key.graph_state())[i];
            if !kind.accepts(&arc) {
                continue;
            }
            if let Some((arc, next_lm)) = self.propagate_lm(lm_state, &arc)? {
                out.push((arc, PairId::new(arc.nextstate, next_lm)));
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.lm.reset_states();
    }
}
