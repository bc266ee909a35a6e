//! Интерфейс акустического скорера.
//!
//! Декодер не вычисляет акустические вероятности сам: он запрашивает их
//! у [`Scorer`] по номеру кадра и индексу (обычно transition-id, входная
//! метка дуги графа).

use crate::error::DecoderResult;
use crate::types::Label;

/// Источник акустических стоимостей для декодера.
///
/// # Пример
/// ```ignore
/// let mut scorer = MatrixScorer::new(costs, num_indices)?;
/// let mut decoder = FasterDecoder::new(&graph, config)?;
/// decoder.decode(&mut scorer)?;
/// ```
pub trait Scorer {
    /// Акустическая стоимость (отрицательный log-likelihood, уже умноженный
    /// на acoustic scale) для кадра `frame` и индекса `index`.
    ///
    /// Для одной пары `(frame, index)` результат детерминирован.
    /// Запрос за пределами [`Self::num_frames_ready()`] является нарушением контракта
    /// и возвращается как ошибка.
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32>;

    /// Сколько кадров доступно прямо сейчас. В потоковом режиме растёт.
    fn num_frames_ready(&self) -> usize;

    /// `true`, если `frame` является последним кадром. `frame = -1` спрашивает,
    /// пуст ли вход целиком.
    ///
    /// В потоковом режиме может блокировать вызывающий поток, пока не
    /// придёт достаточно данных. Это единственная точка ожидания декодера.
    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool>;

    /// Размер пространства индексов (индексы `1..=num_indices()`).
    fn num_indices(&self) -> usize;
}

impl<S: Scorer + ?Sized> Scorer for &mut S {
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32> {
        (**self).acoustic_cost(frame, index)
    }

    fn num_frames_ready(&self) -> usize {
        (**self).num_frames_ready()
    }

    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool> {
        (**self).is_last_frame(frame)
    }

    fn num_indices(&self) -> usize {
        (**self).num_indices()
    }
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32> {
        (**self).acoustic_cost(frame, index)
    }

    fn num_frames_ready(&self) -> usize {
        (**self).num_frames_ready()
    }

    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool> {
        (**self).is_last_frame(frame)
    }

    fn num_indices(&self) -> usize {
        (**self).num_indices()
    }
}
