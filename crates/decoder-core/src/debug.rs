//! Вспомогательные функции для отладочных проверок.

use std::sync::OnceLock;

/// Возвращает `true`, если включены дорогие проверки инвариантов
/// (аудит счётчиков ссылок токенов после каждого кадра).
///
/// Управляется переменной окружения `WFST_DECODER_DEBUG` (любое непустое значение).
pub fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("WFST_DECODER_DEBUG").is_some_and(|v| !v.is_empty()))
}
