//! Конфигурация декодера.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecoderError, DecoderResult};

/// Параметры beam search для `FasterDecoder` и `BiglmFasterDecoder`.
///
/// Все стоимости заданы в тропическом полукольце (меньше = лучше).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FasterDecoderConfig {
    /// Максимальный разброс стоимости от лучшего токена кадра.
    pub beam: f32,

    /// Жёсткий лимит активных состояний на кадр (`None` = без лимита).
    #[serde(default)]
    pub max_active: Option<usize>,

    /// Нижняя граница числа активных состояний: если beam отсекает
    /// слишком много, порог ослабляется до `min_active`-го лучшего.
    /// По умолчанию 0 (выключено); при отсечении не превышает `max_active`.
    #[serde(default)]
    pub min_active: usize,

    /// Запас, добавляемый к адаптивному beam при срабатывании
    /// max-active/min-active.
    #[serde(default = "default_beam_delta")]
    pub beam_delta: f32,
}

fn default_beam_delta() -> f32 {
    0.5
}

impl Default for FasterDecoderConfig {
    fn default() -> Self {
        Self {
            beam: 16.0,
            max_active: None,
            min_active: 0,
            beam_delta: default_beam_delta(),
        }
    }
}

impl FasterDecoderConfig {
    /// Конфигурация с заданным beam, остальное по умолчанию.
    pub fn with_beam(beam: f32) -> Self {
        Self {
            beam,
            ..Self::default()
        }
    }

    /// Beam и max-active, остальное по умолчанию.
    pub fn with_limits(beam: f32, max_active: Option<usize>) -> Self {
        Self {
            beam,
            max_active,
            ..Self::default()
        }
    }

    /// Загрузить конфигурацию из JSON-файла и проверить её.
    pub fn from_json_file(path: impl AsRef<Path>) -> DecoderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("Конфиг декодера загружен из {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Проверить согласованность параметров.
    ///
    /// `min_active > max_active` допустимо: при отсечении `min_active`
    /// ограничивается сверху `max_active`.
    pub fn validate(&self) -> DecoderResult<()> {
        if self.beam.is_nan() || self.beam <= 0.0 {
            return Err(DecoderError::Config(format!(
                "beam must be positive, got {}",
                self.beam
            )));
        }
        if self.beam_delta.is_nan() || self.beam_delta < 0.0 {
            return Err(DecoderError::Config(format!(
                "beam_delta must be non-negative, got {}",
                self.beam_delta
            )));
        }
        Ok(())
    }
}
