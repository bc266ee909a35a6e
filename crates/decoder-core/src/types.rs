//! Общие типы для декодирования.

use serde::{Deserialize, Serialize};

/// Метка дуги (0 = epsilon).
pub type Label = u32;

/// Идентификатор состояния автомата.
pub type StateId = u32;

/// Метка epsilon (неэмитирующая дуга).
pub const EPSILON: Label = 0;

// ---------------------------------------------------------------------------
// Статистика декодирования
// ---------------------------------------------------------------------------

/// Статистика одного прохода декодера по высказыванию.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Количество обработанных кадров.
    pub frames_decoded: usize,

    /// Всего создано токенов (включая отброшенные при сравнении).
    pub tokens_created: usize,

    /// Максимальное число активных состояний на кадре.
    pub max_active_seen: usize,

    /// Сумма активных состояний по кадрам (для среднего).
    pub active_sum: usize,

    /// Кадры, на которых сработал лимит max-active.
    pub max_active_hits: usize,
}

impl DecodeStats {
    /// Учесть очередной кадр.
    pub fn record_frame(&mut self, active: usize, max_active_hit: bool) {
        self.frames_decoded += 1;
        self.active_sum += active;
        self.max_active_seen = self.max_active_seen.max(active);
        if max_active_hit {
            self.max_active_hits += 1;
        }
    }

    /// Среднее число активных состояний на кадр.
    pub fn mean_active(&self) -> f64 {
        if self.frames_decoded == 0 {
            0.0
        } else {
            self.active_sum as f64 / self.frames_decoded as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_mean() {
        let mut stats = DecodeStats::default();
        assert_eq!(stats.mean_active(), 0.0);
        stats.record_frame(4, false);
        stats.record_frame(2, true);
        assert_eq!(stats.frames_decoded, 2);
        assert_eq!(stats.max_active_seen, 4);
        assert_eq!(stats.max_active_hits, 1);
        assert!((stats.mean_active() - 3.0).abs() < 1e-9);
    }
}
