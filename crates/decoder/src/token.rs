//! Хранилище токенов и трассировки (trace-back).
//!
//! Токены живут в арене и адресуются целочисленным [`TokenId`]. Каждый
//! токен ссылается на предшественника; несколько токенов могут делить одного
//! предшественника (fan-in), циклов нет. Счётчик ссылок токена равен числу
//! токенов, ссылающихся на него как на `prev`, плюс одна «ссылка таблицы»,
//! пока токен лежит в таблице активных состояний.
//!
//! Освобождение итеративное: при обнулении счётчика декрементируем
//! предшественника и идём вверх, пока счётчики обнуляются. Глубина стека не
//! зависит от длины пути.

use decoder_core::{DecoderError, DecoderResult};
use wfst::{FstArc, TropicalWeight};

/// Handle of a token in a [`TokenStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(u32);

impl TokenId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Token {
    /// Дуга, по которой пришли; вес уже включает акустическую стоимость.
    arc: FstArc,
    /// Накопленная стоимость от начала декодирования.
    cost: f64,
    prev: Option<TokenId>,
    /// 0 = слот свободен.
    ref_count: u32,
}

/// Арена токенов со счётчиками ссылок.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Vec<Token>,
    free: Vec<u32>,
    live: usize,
    created: usize,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создать токен: `cost = prev.cost + arc.weight + acoustic_cost`.
    ///
    /// Новый токен начинает со счётчиком 1 (ссылка создателя, обычно таблицы).
    /// Счётчик `prev` увеличивается на единицу.
    pub fn new_token(&mut self, arc: FstArc, acoustic_cost: f32, prev: Option<TokenId>) -> TokenId {
        let arc_weight = arc.weight.value() + acoustic_cost;
        let prev_cost = match prev {
            Some(p) => {
                let prev_tok = &mut self.tokens[p.index()];
                debug_assert!(prev_tok.ref_count > 0, "predecessor already freed");
                prev_tok.ref_count += 1;
                prev_tok.cost
            }
            None => 0.0,
        };
        let token = Token {
            arc: FstArc {
                weight: TropicalWeight::new(arc_weight),
                ..arc
            },
            cost: prev_cost + arc.weight.value() as f64 + acoustic_cost as f64,
            prev,
            ref_count: 1,
        };

        self.live += 1;
        self.created += 1;
        match self.free.pop() {
            Some(slot) => {
                self.tokens[slot as usize] = token;
                TokenId(slot)
            }
            None => {
                self.tokens.push(token);
                TokenId((self.tokens.len() - 1) as u32)
            }
        }
    }

    /// Снять одну ссылку. При обнулении токен освобождается, и то же
    /// повторяется для предшественника.
    pub fn release(&mut self, id: TokenId) {
        let mut current = Some(id);
        while let Some(t) = current {
            let token = &mut self.tokens[t.index()];
            debug_assert!(token.ref_count > 0, "double release of token {:?}", t);
            token.ref_count -= 1;
            if token.ref_count > 0 {
                break;
            }
            current = token.prev.take();
            self.free.push(t.0);
            self.live -= 1;
        }
    }

    /// Снять ссылку таблицы с каждого токена отсоединённого кадра.
    pub fn clear_frame<I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = TokenId>,
    {
        for id in tokens {
            self.release(id);
        }
    }

    #[inline]
    pub fn cost(&self, id: TokenId) -> f64 {
        self.tokens[id.index()].cost
    }

    #[inline]
    pub fn arc(&self, id: TokenId) -> FstArc {
        self.tokens[id.index()].arc
    }

    #[inline]
    pub fn prev(&self, id: TokenId) -> Option<TokenId> {
        self.tokens[id.index()].prev
    }

    pub fn ref_count(&self, id: TokenId) -> u32 {
        self.tokens[id.index()].ref_count
    }

    /// Число живых токенов.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Сколько токенов создано за всё время жизни хранилища.
    pub fn tokens_created(&self) -> usize {
        self.created
    }

    /// Освободить всё разом и обнулить статистику (отмена декодирования).
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.free.clear();
        self.live = 0;
        self.created = 0;
    }

    /// Цепочка дуг от корня до `id` (дуга корня не включается).
    pub fn trace_back(&self, id: TokenId) -> Vec<FstArc> {
        let mut arcs = Vec::new();
        let mut current = id;
        while let Some(prev) = self.prev(current) {
            arcs.push(self.arc(current));
            current = prev;
        }
        arcs.reverse();
        arcs
    }

    /// Проверить инвариант счётчиков: для каждого живого токена
    /// `ref_count = число живых потомков + число удержаний `holders``.
    pub fn audit<I>(&self, holders: I) -> DecoderResult<()>
    where
        I: IntoIterator<Item = TokenId>,
    {
        let mut expected = vec![0u32; self.tokens.len()];
        for token in self.tokens.iter().filter(|t| t.ref_count > 0) {
            if let Some(p) = token.prev {
                expected[p.index()] += 1;
            }
        }
        for id in holders {
            expected[id.index()] += 1;
        }
        let mut live = 0;
        for (i, token) in self.tokens.iter().enumerate() {
            if token.ref_count > 0 {
                live += 1;
            }
            if token.ref_count != expected[i] {
                return Err(DecoderError::InvalidState(format!(
                    "token {i}: ref_count {} but {} holders",
                    token.ref_count, expected[i]
                )));
            }
        }
        if live != self.live {
            return Err(DecoderError::InvalidState(format!(
                "live counter {} disagrees with {} live tokens",
                self.live, live
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(ilabel: u32, weight: f32, next: u32) -> FstArc {
        FstArc::new(ilabel, ilabel, weight, next)
    }

    #[test]
    fn test_cost_accumulates() {
        let mut store = TokenStore::new();
        let root = store.new_token(arc(0, 0.0, 0), 0.0, None);
        let a = store.new_token(arc(3, 1.0, 1), 0.25, Some(root));
        let b = store.new_token(arc(0, 0.5, 2), 0.0, Some(a));
        assert!((store.cost(b) - 1.75).abs() < 1e-6);
        assert!((store.arc(a).weight.value() - 1.25).abs() < 1e-6);
        assert_eq!(store.ref_count(root), 2);
        assert_eq!(store.live_count(), 3);
    }

    #[test]
    fn test_release_frees_chain() {
        let mut store = TokenStore::new();
        let root = store.new_token(arc(0, 0.0, 0), 0.0, None);
        let a = store.new_token(arc(1, 1.0, 1), 0.0, Some(root));
        let b = store.new_token(arc(1, 1.0, 2), 0.0, Some(a));
        // таблица отпускает root и a; они живы через b
        store.release(root);
        store.release(a);
        assert_eq!(store.live_count(), 3);
        assert!(store.audit([b]).is_ok());

        store.release(b);
        assert_eq!(store.live_count(), 0);
        assert!(store.audit([]).is_ok());
    }

    #[test]
    fn test_shared_predecessor_survives_one_child() {
        let mut store = TokenStore::new();
        let root = store.new_token(arc(0, 0.0, 0), 0.0, None);
        let a = store.new_token(arc(1, 1.0, 1), 0.0, Some(root));
        let b = store.new_token(arc(2, 2.0, 2), 0.0, Some(root));
        store.release(root);
        store.release(a);
        assert_eq!(store.live_count(), 2);
        assert_eq!(store.ref_count(root), 1);
        store.release(b);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut store = TokenStore::new();
        let a = store.new_token(arc(1, 1.0, 0), 0.0, None);
        store.release(a);
        let b = store.new_token(arc(2, 2.0, 0), 0.0, None);
        assert_eq!(a, b);
        assert_eq!(store.tokens_created(), 2);
        assert_eq!(store.arc(b).ilabel, 2);
    }

    #[test]
    fn test_long_chain_release_is_iterative() {
        let mut store = TokenStore::new();
        let mut prev = store.new_token(arc(0, 0.0, 0), 0.0, None);
        for _ in 0..200_000 {
            let next = store.new_token(arc(1, 0.0, 0), 0.0, Some(prev));
            store.release(prev);
            prev = next;
        }
        assert_eq!(store.live_count(), 200_001);
        store.release(prev);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_trace_back_excludes_root() {
        let mut store = TokenStore::new();
        let root = store.new_token(arc(0, 0.0, 0), 0.0, None);
        let a = store.new_token(arc(5, 1.0, 1), 0.2, Some(root));
        let b = store.new_token(arc(0, 0.5, 2), 0.0, Some(a));
        let labels: Vec<u32> = store.trace_back(b).iter().map(|a| a.ilabel).collect();
        assert_eq!(labels, vec![5, 0]);
    }

    #[test]
    fn test_audit_detects_missing_holder() {
        let mut store = TokenStore::new();
        let root = store.new_token(arc(0, 0.0, 0), 0.0, None);
        assert!(store.audit([]).is_err());
        assert!(store.audit([root]).is_ok());
    }
}
