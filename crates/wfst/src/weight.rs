//! Вес в тропическом полукольце (min, +).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Стоимость в тропическом полукольце: меньше = лучше.
///
/// `one()` = 0.0 (начало поиска), `zero()` = +∞ (недостижимо).
/// Умножение складывает стоимости (насыщается на +∞), сложение берёт минимум.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TropicalWeight(f32);

impl TropicalWeight {
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Мультипликативная единица (нулевая стоимость).
    #[inline]
    pub const fn one() -> Self {
        Self(0.0)
    }

    /// Аддитивная единица (недостижимо).
    #[inline]
    pub const fn zero() -> Self {
        Self(f32::INFINITY)
    }

    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == f32::INFINITY
    }

    /// ⊗: сумма стоимостей; `zero()` поглощает.
    #[inline]
    pub fn times(self, other: Self) -> Self {
        if self.is_zero() || other.is_zero() {
            Self::zero()
        } else {
            Self(self.0 + other.0)
        }
    }

    /// ⊕: минимум.
    #[inline]
    pub fn plus(self, other: Self) -> Self {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }

    /// Умножить стоимость на скаляр. `zero()` остаётся `zero()` при любом знаке.
    #[inline]
    pub fn scale(self, factor: f32) -> Self {
        if self.is_zero() {
            self
        } else {
            Self(self.0 * factor)
        }
    }

    /// Приближённое равенство (для тестов и проверок).
    pub fn approx_eq(self, other: Self, delta: f32) -> bool {
        if self.is_zero() || other.is_zero() {
            return self.is_zero() && other.is_zero();
        }
        (self.0 - other.0).abs() <= delta
    }
}

impl Default for TropicalWeight {
    fn default() -> Self {
        Self::one()
    }
}

impl From<f32> for TropicalWeight {
    fn from(value: f32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TropicalWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "Infinity")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
