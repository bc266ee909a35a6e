//! Таблица активных состояний кадра.
//!
//! Гибрид из списка записей (в порядке вставки) и хеш-индекса
//! `ключ → позиция в списке`. Между кадрами список отсоединяется целиком
//! ([`ActiveStateTable::detach_and_reset`]) и остаётся обходимым, пока
//! таблица уже заполняется токенами следующего кадра.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::token::{TokenId, TokenStore};

/// Ключ → лучший живой токен текущего кадра.
#[derive(Debug)]
pub struct ActiveStateTable<K> {
    index: FxHashMap<K, usize>,
    entries: Vec<(K, TokenId)>,
}

impl<K: Copy + Eq + Hash> Default for ActiveStateTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash> ActiveStateTable<K> {
    pub fn new() -> Self {
        Self {
            index: FxHashMap::default(),
            entries: Vec::new(),
        }
    }

    pub fn find(&self, key: K) -> Option<TokenId> {
        self.index.get(&key).map(|&pos| self.entries[pos].1)
    }

    /// Вставить токен или заменить действующий, если новый строго дешевле.
    ///
    /// Проигравший токен освобождается. При равной стоимости остаётся
    /// действующий. Возвращает `true`, если таблица изменилась.
    pub fn insert_or_improve(&mut self, key: K, token: TokenId, store: &mut TokenStore) -> bool {
        match self.index.entry(key) {
            Entry::Occupied(e) => {
                let slot = &mut self.entries[*e.get()].1;
                let incumbent = *slot;
                if store.cost(token) < store.cost(incumbent) {
                    *slot = token;
                    store.release(incumbent);
                    true
                } else {
                    store.release(token);
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(self.entries.len());
                self.entries.push((key, token));
                true
            }
        }
    }

    /// Удалить записи со стоимостью не ниже `cutoff`, освободив их токены.
    /// Порядок выживших сохраняется. Возвращает число удалённых.
    pub fn prune(&mut self, cutoff: f64, store: &mut TokenStore) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&(_, tok)| {
            if store.cost(tok) < cutoff {
                true
            } else {
                store.release(tok);
                false
            }
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            self.index.clear();
            for (pos, &(key, _)) in self.entries.iter().enumerate() {
                self.index.insert(key, pos);
            }
        }
        removed
    }

    /// Отдать текущие записи как список без индекса и очистить таблицу.
    pub fn detach_and_reset(&mut self) -> DetachedList<K> {
        self.index.clear();
        let capacity = self.entries.len();
        DetachedList {
            entries: std::mem::replace(&mut self.entries, Vec::with_capacity(capacity)),
        }
    }

    /// Освободить токены отсоединённого списка.
    pub fn dispose(list: DetachedList<K>, store: &mut TokenStore) {
        store.clear_frame(list.entries.into_iter().map(|(_, t)| t));
    }

    /// Снять все удержания таблицы (отмена или сброс декодера).
    pub fn clear(&mut self, store: &mut TokenStore) {
        let list = self.detach_and_reset();
        Self::dispose(list, store);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, TokenId)> + '_ {
        self.entries.iter().copied()
    }

    pub fn tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.entries.iter().map(|&(_, t)| t)
    }
}

/// Записи прошлого кадра, отсоединённые от хеш-индекса.
#[derive(Debug)]
pub struct DetachedList<K> {
    entries: Vec<(K, TokenId)>,
}

impl<K: Copy> DetachedList<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<(K, TokenId)> {
        self.entries.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, TokenId)> + '_ {
        self.entries.iter().copied()
    }
}
