//! Детерминированные on-demand FST для big-LM декодирования.
//!
//! Позволяют декодеру искать по графу, скомпонованному с большой LM,
//! не строя композицию целиком: дуга `(state, label)` вычисляется лениво.
//!
//! - [`BackoffFst`]: n-граммная LM с back-off (epsilon) дугами.
//! - [`ScaleFst`]: умножение весов на скаляр (−1 даёт «вычитаемую» LM).
//! - [`ComposeFst`]: ленивая композиция двух детерминированных FST.
//! - [`CacheFst`]: кеш последних запрошенных дуг.
//!
//! Предусловие: каждый компонент детерминирован (не более одной дуги на
//! входную метку после разрешения back-off). Композиция недетерминированных
//! автоматов таким способом не определена; [`BackoffFst::new`] проверяет
//! это при построении.

use decoder_core::{DecoderError, DecoderResult, Label, StateId, EPSILON};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::fst::{Fst, FstArc};
use crate::validate::check_epsilon_acyclic;
use crate::weight::TropicalWeight;

/// Детерминированный автомат, отвечающий на запросы дуг по требованию.
pub trait DeterministicOnDemandFst {
    fn start(&mut self) -> Option<StateId>;

    /// Финальный вес; `TropicalWeight::zero()`, если состояние не финальное.
    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight>;

    /// Единственная дуга из `state` с входной меткой `ilabel` (`ilabel != 0`).
    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>>;

    /// Забыть состояния, созданные по требованию. После вызова прежние
    /// номера состояний недействительны.
    fn reset_states(&mut self) {}
}

impl<T: DeterministicOnDemandFst + ?Sized> DeterministicOnDemandFst for &mut T {
    fn start(&mut self) -> Option<StateId> {
        (**self).start()
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        (**self).final_weight(state)
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        (**self).get_arc(state, ilabel)
    }

    fn reset_states(&mut self) {
        (**self).reset_states()
    }
}

impl<T: DeterministicOnDemandFst + ?Sized> DeterministicOnDemandFst for Box<T> {
    fn start(&mut self) -> Option<StateId> {
        (**self).start()
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        (**self).final_weight(state)
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        (**self).get_arc(state, ilabel)
    }

    fn reset_states(&mut self) {
        (**self).reset_states()
    }
}

fn epsilon_query() -> DecoderError {
    DecoderError::InvalidState("on-demand FST queried with the epsilon label".to_string())
}

// ---------------------------------------------------------------------------
// BackoffFst
// ---------------------------------------------------------------------------

/// N-граммная LM с back-off: если из состояния нет дуги с нужной меткой,
/// идём по epsilon-дуге (back-off) и повторяем поиск, накапливая вес.
#[derive(Debug)]
pub struct BackoffFst<F> {
    fst: F,
    // (state, ilabel) → arc
    index: FxHashMap<(StateId, Label), FstArc>,
    // state → back-off arc
    backoff: Vec<Option<FstArc>>,
}

impl<F: Fst> BackoffFst<F> {
    /// Построить индекс и проверить детерминизм.
    ///
    /// Ошибки: [`DecoderError::NonDeterministic`], если у состояния две дуги
    /// с одной входной меткой (включая две back-off дуги);
    /// [`DecoderError::EpsilonCycle`], если back-off цепочка зациклена.
    pub fn new(fst: F) -> DecoderResult<Self> {
        let n = fst.num_states();
        let mut index = FxHashMap::default();
        let mut backoff = vec![None; n];

        for s in 0..n as StateId {
            for arc in fst.arcs(s) {
                if arc.ilabel == EPSILON {
                    if backoff[s as usize].replace(*arc).is_some() {
                        return Err(DecoderError::NonDeterministic {
                            state: s,
                            label: EPSILON,
                        });
                    }
                } else if index.insert((s, arc.ilabel), *arc).is_some() {
                    return Err(DecoderError::NonDeterministic {
                        state: s,
                        label: arc.ilabel,
                    });
                }
            }
        }
        check_epsilon_acyclic(&fst)?;

        debug!(
            "BackoffFst: {} состояний, {} дуг с метками",
            n,
            index.len()
        );
        Ok(Self {
            fst,
            index,
            backoff,
        })
    }

    pub fn inner(&self) -> &F {
        &self.fst
    }
}

impl<F: Fst> DeterministicOnDemandFst for BackoffFst<F> {
    fn start(&mut self) -> Option<StateId> {
        self.fst.start()
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        let mut state = state;
        let mut acc = TropicalWeight::one();
        loop {
            let w = self.fst.final_weight(state);
            if !w.is_zero() {
                return Ok(acc.times(w));
            }
            match self.backoff.get(state as usize).copied().flatten() {
                Some(arc) => {
                    acc = acc.times(arc.weight);
                    state = arc.nextstate;
                }
                None => return Ok(TropicalWeight::zero()),
            }
        }
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        if ilabel == EPSILON {
            return Err(epsilon_query());
        }
        let mut state = state;
        let mut acc = TropicalWeight::one();
        // Back-off цепочка ациклична (проверено в new), цикл конечен.
        loop {
            if let Some(arc) = self.index.get(&(state, ilabel)) {
                return Ok(Some(FstArc {
                    weight: acc.times(arc.weight),
                    ..*arc
                }));
            }
            match self.backoff.get(state as usize).copied().flatten() {
                Some(arc) => {
                    acc = acc.times(arc.weight);
                    state = arc.nextstate;
                }
                None => return Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScaleFst
// ---------------------------------------------------------------------------

/// Умножает все веса (дуг и финальные) на `scale`.
#[derive(Debug)]
pub struct ScaleFst<F> {
    fst: F,
    scale: f32,
}

impl<F: DeterministicOnDemandFst> ScaleFst<F> {
    pub fn new(fst: F, scale: f32) -> Self {
        Self { fst, scale }
    }
}

impl<F: DeterministicOnDemandFst> DeterministicOnDemandFst for ScaleFst<F> {
    fn start(&mut self) -> Option<StateId> {
        self.fst.start()
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        Ok(self.fst.final_weight(state)?.scale(self.scale))
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        Ok(self.fst.get_arc(state, ilabel)?.map(|arc| FstArc {
            weight: arc.weight.scale(self.scale),
            ..arc
        }))
    }

    fn reset_states(&mut self) {
        self.fst.reset_states();
    }
}

// ---------------------------------------------------------------------------
// ComposeFst
// ---------------------------------------------------------------------------

/// Ленивая композиция `A ∘ B`: выходная метка дуги A служит входной для B.
///
/// Пары состояний `(a, b)` нумеруются по мере появления. Таблица пар
/// только растёт, пока не вызван [`DeterministicOnDemandFst::reset_states`];
/// big-LM декодер вызывает его в начале каждого высказывания.
#[derive(Debug)]
pub struct ComposeFst<A, B> {
    fst1: A,
    fst2: B,
    state_map: FxHashMap<(StateId, StateId), StateId>,
    state_vec: Vec<(StateId, StateId)>,
}

impl<A, B> ComposeFst<A, B>
where
    A: DeterministicOnDemandFst,
    B: DeterministicOnDemandFst,
{
    pub fn new(fst1: A, fst2: B) -> Self {
        Self {
            fst1,
            fst2,
            state_map: FxHashMap::default(),
            state_vec: Vec::new(),
        }
    }

    fn intern(&mut self, pair: (StateId, StateId)) -> StateId {
        if let Some(&id) = self.state_map.get(&pair) {
            return id;
        }
        let id = self.state_vec.len() as StateId;
        self.state_vec.push(pair);
        self.state_map.insert(pair, id);
        id
    }

    fn pair(&self, state: StateId) -> DecoderResult<(StateId, StateId)> {
        self.state_vec.get(state as usize).copied().ok_or_else(|| {
            DecoderError::InvalidState(format!("unknown composed state {state}"))
        })
    }

    /// Пара компонентных состояний для составного состояния.
    pub fn components(&self, state: StateId) -> Option<(StateId, StateId)> {
        self.state_vec.get(state as usize).copied()
    }

    /// Сколько составных состояний создано к этому моменту.
    pub fn num_states_created(&self) -> usize {
        self.state_vec.len()
    }
}

impl<A, B> DeterministicOnDemandFst for ComposeFst<A, B>
where
    A: DeterministicOnDemandFst,
    B: DeterministicOnDemandFst,
{
    fn start(&mut self) -> Option<StateId> {
        let s1 = self.fst1.start()?;
        let s2 = self.fst2.start()?;
        Some(self.intern((s1, s2)))
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        let (s1, s2) = self.pair(state)?;
        let f1 = self.fst1.final_weight(s1)?;
        if f1.is_zero() {
            return Ok(f1);
        }
        Ok(f1.times(self.fst2.final_weight(s2)?))
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        let (s1, s2) = self.pair(state)?;
        let Some(arc1) = self.fst1.get_arc(s1, ilabel)? else {
            return Ok(None);
        };
        if arc1.olabel == EPSILON {
            // B не двигается.
            let nextstate = self.intern((arc1.nextstate, s2));
            return Ok(Some(FstArc {
                ilabel,
                olabel: EPSILON,
                weight: arc1.weight,
                nextstate,
            }));
        }
        let Some(arc2) = self.fst2.get_arc(s2, arc1.olabel)? else {
            return Ok(None);
        };
        let nextstate = self.intern((arc1.nextstate, arc2.nextstate));
        Ok(Some(FstArc {
            ilabel,
            olabel: arc2.olabel,
            weight: arc1.weight.times(arc2.weight),
            nextstate,
        }))
    }

    fn reset_states(&mut self) {
        debug!(
            "ComposeFst: сброс {} составных состояний",
            self.state_vec.len()
        );
        self.state_map.clear();
        self.state_vec.clear();
        self.fst1.reset_states();
        self.fst2.reset_states();
    }
}

// ---------------------------------------------------------------------------
// CacheFst
// ---------------------------------------------------------------------------

/// Кеш фиксированного размера для найденных дуг: слот выбирается хешем
/// `(state, ilabel)`, коллизия вытесняет старую запись.
#[derive(Debug)]
pub struct CacheFst<F> {
    fst: F,
    slots: Vec<Option<(StateId, Label, FstArc)>>,
    hits: usize,
    misses: usize,
}

impl<F: DeterministicOnDemandFst> CacheFst<F> {
    pub const DEFAULT_NUM_CACHED_ARCS: usize = 100_000;

    pub fn new(fst: F, num_cached_arcs: usize) -> Self {
        Self {
            fst,
            slots: vec![None; num_cached_arcs.max(1)],
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    fn slot(&self, state: StateId, ilabel: Label) -> usize {
        ((state as usize).wrapping_add((ilabel as usize).wrapping_mul(7853))) % self.slots.len()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

impl<F: DeterministicOnDemandFst> DeterministicOnDemandFst for CacheFst<F> {
    fn start(&mut self) -> Option<StateId> {
        self.fst.start()
    }

    fn final_weight(&mut self, state: StateId) -> DecoderResult<TropicalWeight> {
        self.fst.final_weight(state)
    }

    fn get_arc(&mut self, state: StateId, ilabel: Label) -> DecoderResult<Option<FstArc>> {
        let slot = self.slot(state, ilabel);
        if let Some((s, l, arc)) = self.slots[slot] {
            if s == state && l == ilabel {
                self.hits += 1;
                return Ok(Some(arc));
            }
        }
        self.misses += 1;
        let arc = self.fst.get_arc(state, ilabel)?;
        if let Some(arc) = arc {
            self.slots[slot] = Some((state, ilabel, arc));
        }
        Ok(arc)
    }

    /// Кешированные дуги хранят номера состояний: кеш очищается целиком.
    fn reset_states(&mut self) {
        self.slots.fill(None);
        self.fst.reset_states();
    }
}

// ---------------------------------------------------------------------------
// Разность LM
// ---------------------------------------------------------------------------

/// `(−old) ∘ new`: вычитает стоимость LM, вшитой в граф, и добавляет
/// стоимость большой LM.
pub type LmDiffFst<A, B> = ComposeFst<ScaleFst<BackoffFst<A>>, BackoffFst<B>>;

/// Построить разность двух back-off LM для big-LM декодирования.
pub fn lm_difference<A: Fst, B: Fst>(old_lm: A, new_lm: B) -> DecoderResult<LmDiffFst<A, B>> {
    let old = ScaleFst::new(BackoffFst::new(old_lm)?, -1.0);
    let new = BackoffFst::new(new_lm)?;
    Ok(ComposeFst::new(old, new))
}
