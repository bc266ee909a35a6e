//! Движок распространения токенов (frame-synchronous Viterbi beam search).
//!
//! Один кадр:
//! 1. эмитирующий проход: токены прошлого кадра идут по дугам
//!    с ненулевой входной меткой, к весу добавляется акустическая стоимость;
//! 2. неэмитирующий проход: epsilon-замыкание внутри кадра;
//! 3. отсечение: из таблицы удаляются токены не ниже порога кадра.
//!
//! Адаптивный beam из отсечения кадра задаёт оценку порога в эмитирующем
//! проходе следующего кадра.

use decoder_core::{DecodeStats, DecoderError, DecoderResult, FasterDecoderConfig, Scorer};
use tracing::{debug, info, warn};
use wfst::FstArc;

use crate::best_path::{self, LinearPath};
use crate::pruning::{compute_cutoff, Cutoff};
use crate::space::{ArcKind, SearchSpace};
use crate::table::ActiveStateTable;
use crate::token::{TokenId, TokenStore};

/// Состояние конечного автомата декодера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Propagating { frame: usize },
    Finished,
}

/// Итог последнего отсечения таблицы.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePruning {
    /// Токенов в таблице до отсечения.
    pub candidates: usize,
    /// Из них ниже порога (остались в таблице).
    pub kept: usize,
    pub cutoff: Cutoff,
}

/// Декодер с передачей токенов над произвольным [`SearchSpace`].
///
/// Не потокобезопасен: один экземпляр на одно высказывание. Разные
/// экземпляры не делят изменяемого состояния.
pub struct TokenPassingDecoder<S: SearchSpace> {
    space: S,
    config: FasterDecoderConfig,
    store: TokenStore,
    toks: ActiveStateTable<S::Key>,
    state: DecoderState,
    num_frames_decoded: usize,
    stats: DecodeStats,
    last_pruning: Option<FramePruning>,

    // Переиспользуемые буферы.
    arc_buf: Vec<(FstArc, S::Key)>,
    queue: Vec<S::Key>,
    cost_buf: Vec<f64>,
    scratch: Vec<f64>,
}

impl<S: SearchSpace> TokenPassingDecoder<S> {
    /// Создать декодер над пространством поиска. Конфигурация проверяется.
    pub fn with_space(space: S, config: FasterDecoderConfig) -> DecoderResult<Self> {
        config.validate()?;
        Ok(Self {
            space,
            config,
            store: TokenStore::new(),
            toks: ActiveStateTable::new(),
            state: DecoderState::Idle,
            num_frames_decoded: 0,
            stats: DecodeStats::default(),
            last_pruning: None,
            arc_buf: Vec::new(),
            queue: Vec::new(),
            cost_buf: Vec::new(),
            scratch: Vec::new(),
        })
    }

    pub fn config(&self) -> &FasterDecoderConfig {
        &self.config
    }

    /// Заменить конфигурацию (между высказываниями).
    pub fn set_config(&mut self, config: FasterDecoderConfig) -> DecoderResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn num_frames_decoded(&self) -> usize {
        self.num_frames_decoded
    }

    /// Активных ключей в текущем кадре.
    pub fn num_active(&self) -> usize {
        self.toks.len()
    }

    /// Живых токенов в хранилище (включая цепочки trace-back).
    pub fn live_tokens(&self) -> usize {
        self.store.live_count()
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub fn last_pruning(&self) -> Option<FramePruning> {
        self.last_pruning
    }

    /// Стоимости токенов текущего кадра.
    pub fn active_costs(&self) -> Vec<f64> {
        self.toks.tokens().map(|t| self.store.cost(t)).collect()
    }

    /// Сбросить все токены и состояния, созданные пространством поиска
    /// по требованию. Безопасно на любой границе кадров.
    pub fn reset(&mut self) {
        self.toks.clear(&mut self.store);
        debug_assert_eq!(self.store.live_count(), 0);
        self.store.clear();
        self.space.reset();
        self.state = DecoderState::Idle;
        self.num_frames_decoded = 0;
        self.stats = DecodeStats::default();
        self.last_pruning = None;
    }

    /// Начать новое высказывание: корневой токен в стартовом состоянии и
    /// его epsilon-замыкание.
    pub fn init_decoding(&mut self) -> DecoderResult<()> {
        self.reset();
        let (start_key, start_state) = self.space.start()?;
        let dummy = FstArc::new(0, 0, 0.0, start_state);
        let root = self.store.new_token(dummy, 0.0, None);
        self.toks.insert_or_improve(start_key, root, &mut self.store);
        self.process_nonemitting(f64::INFINITY)?;
        self.prune_active();
        self.stats.tokens_created = self.store.tokens_created();
        self.state = DecoderState::Propagating { frame: 0 };
        debug!(
            "init_decoding: старт {:?}, {} активных после epsilon-замыкания",
            start_key,
            self.toks.len()
        );
        Ok(())
    }

    /// Декодировать всё высказывание до сигнала последнего кадра.
    ///
    /// В потоковом режиме `is_last_frame` скорера может блокировать.
    pub fn decode<Sc: Scorer>(&mut self, scorer: &mut Sc) -> DecoderResult<()> {
        self.init_decoding()?;
        while !scorer.is_last_frame(self.num_frames_decoded as isize - 1)? {
            self.decode_frame(scorer)?;
        }
        self.finalize();
        info!(
            "decode: {} кадров, {} токенов создано, в среднем {:.1} активных",
            self.stats.frames_decoded,
            self.stats.tokens_created,
            self.stats.mean_active()
        );
        Ok(())
    }

    /// Декодировать готовые кадры (не больше `max_num_frames`, если задано).
    /// Возвращает число обработанных кадров.
    pub fn advance_decoding<Sc: Scorer>(
        &mut self,
        scorer: &mut Sc,
        max_num_frames: Option<usize>,
    ) -> DecoderResult<usize> {
        if !matches!(self.state, DecoderState::Propagating { .. }) {
            return Err(DecoderError::InvalidState(format!(
                "advance_decoding in state {:?}; call init_decoding first",
                self.state
            )));
        }
        let ready = scorer.num_frames_ready();
        let target = match max_num_frames {
            Some(n) => ready.min(self.num_frames_decoded + n),
            None => ready,
        };
        let start = self.num_frames_decoded;
        while self.num_frames_decoded < target {
            self.decode_frame(scorer)?;
        }
        Ok(self.num_frames_decoded - start)
    }

    /// Завершить высказывание: новых кадров не будет.
    pub fn finalize(&mut self) {
        self.state = DecoderState::Finished;
    }

    /// Есть ли в текущем кадре токен в финальном состоянии.
    pub fn reached_final(&mut self) -> DecoderResult<bool> {
        for (key, _) in self.toks.iter() {
            if !self.space.final_weight(key)?.is_zero() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Лучший путь.
    ///
    /// С `use_final_probs` учитываются только токены в финальных состояниях
    /// (стоимость + финальный вес); если таких нет, `None`. Без него
    /// берётся токен с минимальной накопленной стоимостью.
    pub fn best_path(&mut self, use_final_probs: bool) -> DecoderResult<Option<LinearPath>> {
        let best = best_path::best_token(&self.toks, &self.store, &mut self.space, use_final_probs)?;
        match best {
            Some((tok, final_weight)) => Ok(Some(best_path::extract(&self.store, tok, final_weight))),
            None => {
                if use_final_probs && !self.toks.is_empty() {
                    warn!(
                        "best_path: ни один из {} токенов не достиг финального состояния",
                        self.toks.len()
                    );
                }
                Ok(None)
            }
        }
    }

    fn decode_frame<Sc: Scorer>(&mut self, scorer: &mut Sc) -> DecoderResult<()> {
        let weight_cutoff = self.process_emitting(scorer)?;
        self.process_nonemitting(weight_cutoff)?;
        self.prune_active();

        let max_active_hit = self.last_pruning.is_some_and(|p| p.cutoff.max_active_hit);
        self.stats.record_frame(self.toks.len(), max_active_hit);
        self.stats.tokens_created = self.store.tokens_created();
        self.state = DecoderState::Propagating {
            frame: self.num_frames_decoded,
        };

        if decoder_core::debug::enabled() {
            self.store.audit(self.toks.tokens())?;
        }
        Ok(())
    }

    /// Отсечь текущую таблицу по порогу кадра (beam, max-active, min-active).
    fn prune_active(&mut self) {
        self.cost_buf.clear();
        self.cost_buf
            .extend(self.toks.tokens().map(|t| self.store.cost(t)));
        let cutoff = compute_cutoff(&self.cost_buf, &self.config, &mut self.scratch);
        let candidates = self.toks.len();
        self.toks.prune(cutoff.weight_cutoff, &mut self.store);
        debug!(
            "отсечение после {} кадров: {} кандидатов, {} ниже порога {:.3}, adaptive beam {:.3}",
            self.num_frames_decoded,
            candidates,
            self.toks.len(),
            cutoff.weight_cutoff,
            cutoff.adaptive_beam
        );
        self.last_pruning = Some(FramePruning {
            candidates,
            kept: self.toks.len(),
            cutoff,
        });
    }

    /// Эмитирующий проход. Возвращает порог для неэмитирующего прохода.
    fn process_emitting<Sc: Scorer>(&mut self, scorer: &mut Sc) -> DecoderResult<f64> {
        let frame = self.num_frames_decoded;
        let last_toks = self.toks.detach_and_reset();
        let adaptive_beam = self
            .last_pruning
            .map_or(self.config.beam as f64, |p| p.cutoff.adaptive_beam);

        let mut best: Option<(S::Key, TokenId)> = None;
        for (key, tok) in last_toks.iter() {
            if best.map_or(true, |(_, b)| self.store.cost(tok) < self.store.cost(b)) {
                best = Some((key, tok));
            }
        }

        // Оценка порога следующего кадра по лучшему токену.
        let mut next_weight_cutoff = f64::INFINITY;
        if let Some((key, tok)) = best {
            let cost = self.store.cost(tok);
            self.space.expand(key, ArcKind::Emitting, &mut self.arc_buf)?;
            for &(arc, _) in &self.arc_buf {
                let ac_cost = scorer.acoustic_cost(frame, arc.ilabel)? as f64;
                let new_weight = cost + arc.weight.value() as f64 + ac_cost;
                if new_weight + adaptive_beam < next_weight_cutoff {
                    next_weight_cutoff = new_weight + adaptive_beam;
                }
            }
        }

        for (key, tok) in last_toks.iter() {
            let cost = self.store.cost(tok);
            self.space.expand(key, ArcKind::Emitting, &mut self.arc_buf)?;
            for &(arc, next_key) in &self.arc_buf {
                let ac_cost = scorer.acoustic_cost(frame, arc.ilabel)?;
                let new_weight = cost + arc.weight.value() as f64 + ac_cost as f64;
                if new_weight < next_weight_cutoff {
                    let new_tok = self.store.new_token(arc, ac_cost, Some(tok));
                    if new_weight + adaptive_beam < next_weight_cutoff {
                        next_weight_cutoff = new_weight + adaptive_beam;
                    }
                    self.toks.insert_or_improve(next_key, new_tok, &mut self.store);
                }
            }
        }

        ActiveStateTable::dispose(last_toks, &mut self.store);
        self.num_frames_decoded += 1;
        Ok(next_weight_cutoff)
    }

    /// Epsilon-замыкание текущего кадра с порогом `cutoff`.
    fn process_nonemitting(&mut self, cutoff: f64) -> DecoderResult<()> {
        self.queue.clear();
        self.queue.extend(self.toks.iter().map(|(k, _)| k));

        while let Some(key) = self.queue.pop() {
            let Some(tok) = self.toks.find(key) else {
                continue;
            };
            let cost = self.store.cost(tok);
            if cost > cutoff {
                continue;
            }
            self.space.expand(key, ArcKind::NonEmitting, &mut self.arc_buf)?;
            for &(arc, next_key) in &self.arc_buf {
                let new_cost = cost + arc.weight.value() as f64;
                if new_cost > cutoff {
                    continue;
                }
                let new_tok = self.store.new_token(arc, 0.0, Some(tok));
                if self.toks.insert_or_improve(next_key, new_tok, &mut self.store) {
                    self.queue.push(next_key);
                }
            }
        }
        Ok(())
    }
}

impl<S: SearchSpace> std::fmt::Debug for TokenPassingDecoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPassingDecoder")
            .field("state", &self.state)
            .field("num_frames_decoded", &self.num_frames_decoded)
            .field("num_active", &self.toks.len())
            .field("live_tokens", &self.store.live_count())
            .finish()
    }
}
