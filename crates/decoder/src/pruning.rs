//! Порог отсечения кадра: beam, max-active, min-active.
//!
//! Токен выживает, если его стоимость строго меньше порога.
//! max-active и min-active решаются частичным выбором
//! (`select_nth_unstable_by`), а не полной сортировкой. Адаптивный beam
//! для следующего кадра никогда не шире `beam`.

use decoder_core::FasterDecoderConfig;

/// Итог расчёта порога для одного кадра.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutoff {
    /// Порог: выживают токены с `cost < weight_cutoff`.
    pub weight_cutoff: f64,
    /// Beam для оценки порога следующего кадра.
    pub adaptive_beam: f64,
    /// Позиция лучшего кандидата во входном срезе.
    pub best_index: Option<usize>,
    /// Стоимость лучшего кандидата (+∞, если кандидатов нет).
    pub best_cost: f64,
    /// Сработал ли лимит max-active.
    pub max_active_hit: bool,
}

/// `k`-я по возрастанию стоимость (0-based) из `scratch`.
fn nth_smallest(scratch: &mut [f64], k: usize) -> f64 {
    let (_, nth, _) = scratch.select_nth_unstable_by(k, |a, b| a.total_cmp(b));
    *nth
}

/// Рассчитать порог по стоимостям кандидатов кадра.
///
/// `scratch`: переиспользуемый буфер, чтобы не аллоцировать на каждом кадре.
pub fn compute_cutoff(costs: &[f64], config: &FasterDecoderConfig, scratch: &mut Vec<f64>) -> Cutoff {
    let beam = config.beam as f64;
    let beam_delta = config.beam_delta as f64;

    let mut best_cost = f64::INFINITY;
    let mut best_index = None;
    for (i, &c) in costs.iter().enumerate() {
        if c < best_cost {
            best_cost = c;
            best_index = Some(i);
        }
    }
    let beam_cutoff = best_cost + beam;

    let max_active = config.max_active.unwrap_or(usize::MAX);
    let min_active = config.min_active.min(max_active);
    let mut result = Cutoff {
        weight_cutoff: beam_cutoff,
        adaptive_beam: beam,
        best_index,
        best_cost,
        max_active_hit: false,
    };

    if costs.len() <= min_active && costs.len() <= max_active {
        return result;
    }
    scratch.clear();
    scratch.extend_from_slice(costs);

    if max_active < scratch.len() {
        let max_active_cutoff = nth_smallest(scratch, max_active);
        if max_active_cutoff < beam_cutoff {
            result.weight_cutoff = max_active_cutoff;
            result.adaptive_beam = (max_active_cutoff - best_cost + beam_delta).min(beam);
            result.max_active_hit = true;
            return result;
        }
    }
    if min_active < scratch.len() {
        let min_active_cutoff = nth_smallest(scratch, min_active);
        if min_active_cutoff > beam_cutoff {
            result.weight_cutoff = min_active_cutoff;
            result.adaptive_beam = (min_active_cutoff - best_cost + beam_delta).min(beam);
        }
    }
    result
}
