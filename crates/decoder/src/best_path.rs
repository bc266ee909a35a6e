//! Извлечение лучшего пути по цепочке trace-back.

use decoder_core::{DecoderResult, Label, EPSILON};
use serde::{Deserialize, Serialize};
use wfst::{FstArc, TropicalWeight, VectorFst};

use crate::space::SearchSpace;
use crate::table::ActiveStateTable;
use crate::token::{TokenId, TokenStore};

/// Линейный взвешенный путь, результат декодирования.
///
/// Веса дуг включают акустическую стоимость. Дуг может быть больше, чем
/// кадров: epsilon-переходы добавляют дуги без продвижения по времени.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPath {
    pub arcs: Vec<FstArc>,
    /// Финальный вес последнего состояния (`one()`, если пути без финала).
    pub final_weight: TropicalWeight,
}

impl LinearPath {
    /// Суммарная стоимость (дуги + финальный вес).
    pub fn total_cost(&self) -> f64 {
        self.arcs.iter().map(|a| a.weight.value() as f64).sum::<f64>()
            + self.final_weight.value() as f64
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Входные метки всех дуг по порядку (включая epsilon).
    pub fn ilabels(&self) -> Vec<Label> {
        self.arcs.iter().map(|a| a.ilabel).collect()
    }

    /// Выходные метки всех дуг по порядку (включая epsilon).
    pub fn olabels(&self) -> Vec<Label> {
        self.arcs.iter().map(|a| a.olabel).collect()
    }

    /// Ненулевые входные метки: выравнивание по кадрам.
    pub fn alignment(&self) -> Vec<Label> {
        self.arcs
            .iter()
            .map(|a| a.ilabel)
            .filter(|&l| l != EPSILON)
            .collect()
    }

    /// Ненулевые выходные метки: последовательность слов.
    pub fn words(&self) -> Vec<Label> {
        self.arcs
            .iter()
            .map(|a| a.olabel)
            .filter(|&l| l != EPSILON)
            .collect()
    }

    /// Путь как линейный FST: состояния 0..=n, финал в последнем.
    pub fn to_fst(&self) -> VectorFst {
        let mut fst = VectorFst::with_states(self.arcs.len() + 1);
        fst.set_start(0);
        for (i, arc) in self.arcs.iter().enumerate() {
            fst.add_arc(
                i as u32,
                FstArc {
                    nextstate: i as u32 + 1,
                    ..*arc
                },
            );
        }
        fst.set_final(self.arcs.len() as u32, self.final_weight.value());
        fst
    }
}

/// Лучший токен таблицы: `cost + final`, если `use_final_probs`
/// (учитываются только финальные ключи), иначе просто `cost`.
pub(crate) fn best_token<S: SearchSpace>(
    table: &ActiveStateTable<S::Key>,
    store: &TokenStore,
    space: &mut S,
    use_final_probs: bool,
) -> DecoderResult<Option<(TokenId, TropicalWeight)>> {
    let mut best: Option<(TokenId, TropicalWeight, f64)> = None;
    for (key, tok) in table.iter() {
        let (final_weight, total) = if use_final_probs {
            let w = space.final_weight(key)?;
            if w.is_zero() {
                continue;
            }
            (w, store.cost(tok) + w.value() as f64)
        } else {
            (TropicalWeight::one(), store.cost(tok))
        };
        if best.map_or(true, |(_, _, c)| total < c) {
            best = Some((tok, final_weight, total));
        }
    }
    Ok(best.map(|(t, w, _)| (t, w)))
}

/// Собрать путь от корня до `token`.
pub(crate) fn extract(store: &TokenStore, token: TokenId, final_weight: TropicalWeight) -> LinearPath {
    LinearPath {
        arcs: store.trace_back(token),
        final_weight,
    }
}
