//! Готовые реализации [`Scorer`].
//!
//! - [`MatrixScorer`]: полностью известная матрица стоимостей (кадры × индексы).
//! - [`ScaledScorer`]: обёртка, умножающая стоимости на acoustic scale.
//! - [`StreamingScorer`]: потоковый буфер, который пополняется из другого
//!   потока через [`StreamingFeeder`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{DecoderError, DecoderResult};
use crate::traits::Scorer;
use crate::types::Label;

/// Индекс `i` (1-based) → столбец `i - 1`; индекс 0 (epsilon) не скорится.
fn column(index: Label, num_indices: usize) -> DecoderResult<usize> {
    if index == 0 || index as usize > num_indices {
        return Err(DecoderError::IndexOutOfRange { index, num_indices });
    }
    Ok(index as usize - 1)
}

fn check_row(row: &[f32], num_indices: usize, frame: usize) -> DecoderResult<()> {
    if row.len() != num_indices {
        return Err(DecoderError::Config(format!(
            "frame {frame} has {} costs, expected {num_indices}",
            row.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MatrixScorer
// ---------------------------------------------------------------------------

/// Скорер над заранее вычисленной матрицей стоимостей.
#[derive(Debug, Clone)]
pub struct MatrixScorer {
    /// `costs[frame][index - 1]`.
    costs: Vec<Vec<f32>>,
    num_indices: usize,
}

impl MatrixScorer {
    /// Создать скорер. Все строки обязаны иметь длину `num_indices`.
    pub fn new(costs: Vec<Vec<f32>>, num_indices: usize) -> DecoderResult<Self> {
        for (frame, row) in costs.iter().enumerate() {
            check_row(row, num_indices, frame)?;
        }
        Ok(Self { costs, num_indices })
    }

    /// Скорер, у которого каждая стоимость задаётся функцией `(frame, index)`.
    pub fn from_fn(
        num_frames: usize,
        num_indices: usize,
        mut f: impl FnMut(usize, Label) -> f32,
    ) -> Self {
        let costs = (0..num_frames)
            .map(|t| (1..=num_indices as Label).map(|i| f(t, i)).collect())
            .collect();
        Self { costs, num_indices }
    }

    /// Количество кадров.
    pub fn num_frames(&self) -> usize {
        self.costs.len()
    }
}

impl Scorer for MatrixScorer {
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32> {
        let col = column(index, self.num_indices)?;
        let row = self.costs.get(frame).ok_or(DecoderError::FrameOutOfRange {
            frame,
            ready: self.costs.len(),
        })?;
        Ok(row[col])
    }

    fn num_frames_ready(&self) -> usize {
        self.costs.len()
    }

    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool> {
        Ok(frame == self.costs.len() as isize - 1)
    }

    fn num_indices(&self) -> usize {
        self.num_indices
    }
}

// ---------------------------------------------------------------------------
// ScaledScorer
// ---------------------------------------------------------------------------

/// Умножает стоимости вложенного скорера на `scale` (acoustic scale).
#[derive(Debug, Clone)]
pub struct ScaledScorer<S> {
    inner: S,
    scale: f32,
}

impl<S: Scorer> ScaledScorer<S> {
    pub fn new(inner: S, scale: f32) -> Self {
        Self { inner, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Scorer> Scorer for ScaledScorer<S> {
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32> {
        Ok(self.scale * self.inner.acoustic_cost(frame, index)?)
    }

    fn num_frames_ready(&self) -> usize {
        self.inner.num_frames_ready()
    }

    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool> {
        self.inner.is_last_frame(frame)
    }

    fn num_indices(&self) -> usize {
        self.inner.num_indices()
    }
}

// ---------------------------------------------------------------------------
// Потоковый скорер
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StreamBuffer {
    frames: Vec<Vec<f32>>,
    finished: bool,
}

#[derive(Debug, Default)]
struct StreamShared {
    buffer: Mutex<StreamBuffer>,
    ready: Condvar,
}

impl StreamShared {
    fn lock(&self) -> MutexGuard<'_, StreamBuffer> {
        // Буфер остаётся согласованным даже после паники писателя:
        // каждая операция записи атомарна под мьютексом.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Сторона записи потокового скорера. Можно передать в другой поток.
#[derive(Debug, Clone)]
pub struct StreamingFeeder {
    shared: Arc<StreamShared>,
    num_indices: usize,
}

impl StreamingFeeder {
    /// Добавить кадр стоимостей (длина = `num_indices`).
    pub fn push_frame(&self, costs: Vec<f32>) -> DecoderResult<()> {
        let mut buffer = self.shared.lock();
        if buffer.finished {
            return Err(DecoderError::InvalidState(
                "push_frame after finish".to_string(),
            ));
        }
        check_row(&costs, self.num_indices, buffer.frames.len())?;
        buffer.frames.push(costs);
        self.shared.ready.notify_all();
        Ok(())
    }

    /// Сообщить, что кадров больше не будет.
    pub fn finish(&self) {
        let mut buffer = self.shared.lock();
        buffer.finished = true;
        debug!("StreamingFeeder: поток завершён, {} кадров", buffer.frames.len());
        self.shared.ready.notify_all();
    }
}

/// Сторона чтения потокового скорера.
#[derive(Debug)]
pub struct StreamingScorer {
    shared: Arc<StreamShared>,
    num_indices: usize,
}

impl StreamingScorer {
    /// Создать пару (скорер, писатель).
    pub fn channel(num_indices: usize) -> (StreamingScorer, StreamingFeeder) {
        let shared = Arc::new(StreamShared::default());
        (
            StreamingScorer {
                shared: Arc::clone(&shared),
                num_indices,
            },
            StreamingFeeder {
                shared,
                num_indices,
            },
        )
    }
}

impl Scorer for StreamingScorer {
    fn acoustic_cost(&mut self, frame: usize, index: Label) -> DecoderResult<f32> {
        let col = column(index, self.num_indices)?;
        let buffer = self.shared.lock();
        let row = buffer.frames.get(frame).ok_or(DecoderError::FrameOutOfRange {
            frame,
            ready: buffer.frames.len(),
        })?;
        Ok(row[col])
    }

    fn num_frames_ready(&self) -> usize {
        self.shared.lock().frames.len()
    }

    fn is_last_frame(&mut self, frame: isize) -> DecoderResult<bool> {
        // Ответ известен, когда пришёл кадр frame + 1 или поток закрыт.
        let needed = (frame + 1).max(0) as usize;
        let mut buffer = self.shared.lock();
        while !buffer.finished && buffer.frames.len() <= needed {
            buffer = self
                .shared
                .ready
                .wait(buffer)
                .unwrap_or_else(|e| e.into_inner());
        }
        Ok(buffer.finished && buffer.frames.len() == needed)
    }

    fn num_indices(&self) -> usize {
        self.num_indices
    }
}
