//! Взвешенные автоматы поиска.
//!
//! - [`VectorFst`]: изменяемый автомат для построения графов и LM.
//! - [`ConstFst`]: неизменяемая CSR-раскладка для декодирования.
//!
//! Метка 0 означает epsilon; состояния нумеруются с нуля.

use decoder_core::{Label, StateId};
use serde::{Deserialize, Serialize};

use crate::weight::TropicalWeight;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FstArc {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: TropicalWeight,
    pub nextstate: StateId,
}

impl FstArc {
    #[inline]
    pub fn new(ilabel: Label, olabel: Label, weight: f32, nextstate: StateId) -> Self {
        Self {
            ilabel,
            olabel,
            weight: TropicalWeight::new(weight),
            nextstate,
        }
    }

    /// Входная метка 0: дуга не потребляет кадр.
    #[inline]
    pub fn is_epsilon(&self) -> bool {
        self.ilabel == 0
    }
}

/// Взвешенный автомат только для чтения (граф поиска).
pub trait Fst {
    fn start(&self) -> Option<StateId>;

    /// Финальный вес; `TropicalWeight::zero()` для нефинальных состояний.
    fn final_weight(&self, state: StateId) -> TropicalWeight;

    fn arcs(&self, state: StateId) -> &[FstArc];

    fn num_states(&self) -> usize;

    fn is_final(&self, state: StateId) -> bool {
        !self.final_weight(state).is_zero()
    }

    fn num_arcs(&self, state: StateId) -> usize {
        self.arcs(state).len()
    }
}

impl<F: Fst + ?Sized> Fst for &F {
    fn start(&self) -> Option<StateId> {
        (**self).start()
    }

    fn final_weight(&self, state: StateId) -> TropicalWeight {
        (**self).final_weight(state)
    }

    fn arcs(&self, state: StateId) -> &[FstArc] {
        (**self).arcs(state)
    }

    fn num_states(&self) -> usize {
        (**self).num_states()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VectorState {
    final_weight: Option<TropicalWeight>,
    arcs: Vec<FstArc>,
}

/// Изменяемый автомат с вектором дуг на состояние.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFst {
    start: Option<StateId>,
    states: Vec<VectorState>,
}

impl VectorFst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Автомат из `n` состояний без дуг.
    pub fn with_states(n: usize) -> Self {
        Self {
            start: None,
            states: vec![VectorState::default(); n],
        }
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(VectorState::default());
        (self.states.len() - 1) as StateId
    }

    /// # Panics
    /// Если состояние `state` не добавлено.
    pub fn set_start(&mut self, state: StateId) {
        assert!((state as usize) < self.states.len(), "unknown state {state}");
        self.start = Some(state);
    }

    /// # Panics
    /// Если состояние `state` не добавлено.
    pub fn set_final(&mut self, state: StateId, weight: f32) {
        self.states[state as usize].final_weight = Some(TropicalWeight::new(weight));
    }

    /// # Panics
    /// Если `src` или `arc.nextstate` не добавлены.
    pub fn add_arc(&mut self, src: StateId, arc: FstArc) {
        assert!(
            (arc.nextstate as usize) < self.states.len(),
            "unknown destination state {}",
            arc.nextstate
        );
        self.states[src as usize].arcs.push(arc);
    }

    /// Отсортировать дуги каждого состояния по входной метке (стабильно).
    pub fn arc_sort_by_ilabel(&mut self) {
        for state in &mut self.states {
            state.arcs.sort_by_key(|a| a.ilabel);
        }
    }

    pub fn total_arcs(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }
}

impl Fst for VectorFst {
    fn start(&self) -> Option<StateId> {
        self.start
    }

    fn final_weight(&self, state: StateId) -> TropicalWeight {
        self.states
            .get(state as usize)
            .and_then(|s| s.final_weight)
            .unwrap_or_else(TropicalWeight::zero)
    }

    fn arcs(&self, state: StateId) -> &[FstArc] {
        self.states
            .get(state as usize)
            .map(|s| s.arcs.as_slice())
            .unwrap_or(&[])
    }

    fn num_states(&self) -> usize {
        self.states.len()
    }
}

/// Неизменяемый автомат в CSR-формате (дуги сгруппированы по исходному состоянию).
#[derive(Debug, Clone)]
pub struct ConstFst {
    start: Option<StateId>,
    finals: Vec<TropicalWeight>,
    offsets: Vec<u32>, // длина num_states + 1
    arcs: Vec<FstArc>,
}

impl ConstFst {
    /// Скопировать любой автомат в CSR-раскладку.
    pub fn from_fst<F: Fst>(fst: &F) -> Self {
        let n = fst.num_states();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut arcs = Vec::new();
        let mut finals = Vec::with_capacity(n);
        offsets.push(0u32);
        for s in 0..n as StateId {
            arcs.extend_from_slice(fst.arcs(s));
            offsets.push(arcs.len() as u32);
            finals.push(fst.final_weight(s));
        }
        Self {
            start: fst.start(),
            finals,
            offsets,
            arcs,
        }
    }
}

impl Fst for ConstFst {
    fn start(&self) -> Option<StateId> {
        self.start
    }

    fn final_weight(&self, state: StateId) -> TropicalWeight {
        self.finals
            .get(state as usize)
            .copied()
            .unwrap_or_else(TropicalWeight::zero)
    }

    #[inline]
    fn arcs(&self, state: StateId) -> &[FstArc] {
        let s = state as usize;
        if s + 1 >= self.offsets.len() {
            return &[];
        }
        let lo = self.offsets[s] as usize;
        let hi = self.offsets[s + 1] as usize;
        &self.arcs[lo..hi]
    }

    fn num_states(&self) -> usize {
        self.finals.len()
    }
}

impl From<&VectorFst> for ConstFst {
    fn from(fst: &VectorFst) -> Self {
        ConstFst::from_fst(fst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_fst() -> VectorFst {
        let mut fst = VectorFst::with_states(3);
        fst.set_start(0);
        fst.add_arc(0, FstArc::new(5, 5, 1.0, 1));
        fst.add_arc(1, FstArc::new(0, 0, 0.5, 2));
        fst.add_arc(0, FstArc::new(2, 7, 3.0, 2));
        fst.set_final(2, 0.0);
        fst
    }

    #[test]
    fn test_vector_fst() {
        let fst = small_fst();
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.arcs(0).len(), 2);
        assert!(fst.arcs(1)[0].is_epsilon());
        assert!(fst.is_final(2));
        assert!(!fst.is_final(0));
        assert!(fst.final_weight(42).is_zero());
        assert_eq!(fst.total_arcs(), 3);
    }

    #[test]
    fn test_arc_sort() {
        let mut fst = small_fst();
        fst.arc_sort_by_ilabel();
        let labels: Vec<Label> = fst.arcs(0).iter().map(|a| a.ilabel).collect();
        assert_eq!(labels, vec![2, 5]);
    }

    #[test]
    fn test_const_fst_matches_vector_fst() {
        let fst = small_fst();
        let csr = ConstFst::from(&fst);
        assert_eq!(csr.num_states(), fst.num_states());
        assert_eq!(csr.start(), fst.start());
        for s in 0..3 {
            assert_eq!(csr.arcs(s), fst.arcs(s));
            assert_eq!(csr.final_weight(s), fst.final_weight(s));
        }
        assert!(csr.arcs(99).is_empty());
    }
}
