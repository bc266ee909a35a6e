//! # wfst
//!
//! Взвешенные конечные автоматы для декодера:
//!
//! - [`TropicalWeight`]: стоимость в тропическом полукольце
//! - [`Fst`]: граф поиска только для чтения; [`VectorFst`] и CSR-вариант [`ConstFst`]
//! - [`validate`]: проверка отсутствия epsilon-циклов
//! - [`on_demand`]: ленивые детерминированные FST для big-LM декодирования

pub mod fst;
pub mod on_demand;
pub mod validate;
pub mod weight;

pub use fst::{ConstFst, Fst, FstArc, VectorFst};
pub use on_demand::{
    lm_difference, BackoffFst, CacheFst, ComposeFst, DeterministicOnDemandFst, LmDiffFst,
    ScaleFst,
};
pub use validate::{check_epsilon_acyclic, find_epsilon_cycle};
pub use weight::TropicalWeight;
