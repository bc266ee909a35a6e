//! Lazy LM-difference composition checked against a materialized product
//! of epsilon-free back-off language models.

use std::collections::{HashMap, HashSet, VecDeque};

use decoder_core::{Label, StateId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wfst::{
    lm_difference, BackoffFst, CacheFst, DeterministicOnDemandFst, Fst, FstArc, VectorFst,
};

const VOCAB: Label = 4;

/// Случайная back-off LM: state 0 является корнем без back-off; у остальных
/// back-off дуга ведёт в состояние с меньшим номером. `root_coverage`:
/// вероятность, что корень знает слово.
fn random_lm(rng: &mut StdRng, root_coverage: f64) -> VectorFst {
    let num_states = rng.gen_range(1..5);
    let mut lm = VectorFst::with_states(num_states);
    lm.set_start(rng.gen_range(0..num_states as StateId));
    for s in 0..num_states as StateId {
        for label in 1..=VOCAB {
            let p = if s == 0 { root_coverage } else { 0.4 };
            if rng.gen_bool(p) {
                let next = rng.gen_range(0..num_states as StateId);
                let weight = rng.gen_range(0.0..3.0f32);
                lm.add_arc(s, FstArc::new(label, label, weight, next));
            }
        }
        if s > 0 {
            let to = rng.gen_range(0..s);
            lm.add_arc(s, FstArc::new(0, 0, rng.gen_range(0.0..1.0f32), to));
        }
        if s == 0 || rng.gen_bool(0.3) {
            lm.set_final(s, rng.gen_range(0.0..2.0f32));
        }
    }
    lm
}

/// Back-off замыкание состояния: (состояние, накопленный вес) в порядке
/// удаления от исходного, начиная с него самого.
fn backoff_closure(lm: &VectorFst, state: StateId) -> Vec<(StateId, f64)> {
    let mut closure = vec![(state, 0.0)];
    let mut i = 0;
    while i < closure.len() {
        let (s, acc) = closure[i];
        for arc in lm.arcs(s).iter().filter(|a| a.ilabel == 0) {
            closure.push((arc.nextstate, acc + arc.weight.value() as f64));
        }
        i += 1;
    }
    closure
}

/// LM без epsilon-дуг: каждое слово, достижимое через back-off, получает
/// явную дугу от ближайшего по замыканию состояния, которое его знает.
fn materialize(lm: &VectorFst) -> VectorFst {
    let mut out = VectorFst::with_states(lm.num_states());
    if let Some(start) = lm.start() {
        out.set_start(start);
    }
    for s in 0..lm.num_states() as StateId {
        let closure = backoff_closure(lm, s);
        for label in 1..=VOCAB {
            let found = closure.iter().find_map(|&(t, acc)| {
                lm.arcs(t)
                    .iter()
                    .find(|a| a.ilabel == label)
                    .map(|a| (acc + a.weight.value() as f64, a.nextstate))
            });
            if let Some((weight, next)) = found {
                out.add_arc(s, FstArc::new(label, label, weight as f32, next));
            }
        }
        if let Some(&(t, acc)) = closure.iter().find(|&&(t, _)| lm.is_final(t)) {
            out.set_final(s, (acc + lm.final_weight(t).value() as f64) as f32);
        }
    }
    out
}

/// Явная разность `(−old) ∘ new` над достижимыми парами. Состояние `i`
/// результата соответствует паре `pairs[i]`.
fn explicit_difference(old: &VectorFst, new: &VectorFst) -> (VectorFst, Vec<(StateId, StateId)>) {
    let (old, new) = (materialize(old), materialize(new));
    let start = (old.start().unwrap(), new.start().unwrap());
    let mut ids: HashMap<(StateId, StateId), StateId> = HashMap::from([(start, 0)]);
    let mut pairs = vec![start];
    let mut arcs = Vec::new();
    let mut finals = Vec::new();

    let mut i = 0;
    while i < pairs.len() {
        let (s1, s2) = pairs[i];
        for a1 in old.arcs(s1) {
            let Some(a2) = new.arcs(s2).iter().find(|a| a.ilabel == a1.olabel) else {
                continue;
            };
            let next = (a1.nextstate, a2.nextstate);
            let id = *ids.entry(next).or_insert_with(|| {
                pairs.push(next);
                (pairs.len() - 1) as StateId
            });
            let weight = a2.weight.value() - a1.weight.value();
            arcs.push((i as StateId, FstArc::new(a1.ilabel, a2.olabel, weight, id)));
        }
        if old.is_final(s1) && new.is_final(s2) {
            let weight = new.final_weight(s2).value() - old.final_weight(s1).value();
            finals.push((i as StateId, weight));
        }
        i += 1;
    }

    let mut product = VectorFst::with_states(pairs.len());
    product.set_start(0);
    for (s, arc) in arcs {
        product.add_arc(s, arc);
    }
    for (s, weight) in finals {
        product.set_final(s, weight);
    }
    (product, pairs)
}

#[test]
fn test_lm_difference_matches_explicit_composition() {
    let mut rng = StdRng::seed_from_u64(5);
    for case in 0..100 {
        let old = random_lm(&mut rng, 0.8);
        let new = random_lm(&mut rng, 0.8);
        let (product, pairs) = explicit_difference(&old, &new);
        let index: HashMap<(StateId, StateId), StateId> = pairs
            .iter()
            .enumerate()
            .map(|(i, &pair)| (pair, i as StateId))
            .collect();

        let mut lazy = lm_difference(&old, &new).expect("lm_difference");
        let start = lazy.start().expect("start");
        assert_eq!(lazy.components(start), Some(pairs[0]));

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(state) = queue.pop_front() {
            let pair = lazy.components(state).expect("interned state");
            let p = *index
                .get(&pair)
                .unwrap_or_else(|| panic!("case {case}: {pair:?} missing from product"));

            let lazy_final = lazy.final_weight(state).unwrap();
            if product.is_final(p) {
                let want = product.final_weight(p).value();
                assert!(
                    (lazy_final.value() - want).abs() < 1e-4,
                    "case {case}: final of {pair:?}: {} vs {want}",
                    lazy_final
                );
            } else {
                assert!(lazy_final.is_zero(), "case {case}: final of {pair:?}");
            }

            for label in 1..=VOCAB {
                let got = lazy.get_arc(state, label).unwrap();
                let want = product.arcs(p).iter().find(|a| a.ilabel == label);
                match (got, want) {
                    (None, None) => {}
                    (Some(arc), Some(expected)) => {
                        assert!(
                            (arc.weight.value() - expected.weight.value()).abs() < 1e-4,
                            "case {case}: {pair:?} --{label}--> weight {} vs {}",
                            arc.weight,
                            expected.weight
                        );
                        assert_eq!(arc.ilabel, label);
                        assert_eq!(arc.olabel, expected.olabel);
                        assert_eq!(
                            lazy.components(arc.nextstate),
                            Some(pairs[expected.nextstate as usize])
                        );
                        if visited.insert(arc.nextstate) {
                            queue.push_back(arc.nextstate);
                        }
                    }
                    (got, want) => panic!("case {case}: {pair:?} --{label}--> {got:?} vs {want:?}"),
                }
            }
        }
        // Одна пара = одно составное состояние; лениво создано ровно столько,
        // сколько пар в явном произведении.
        assert_eq!(visited.len(), product.num_states());
        assert_eq!(lazy.num_states_created(), product.num_states());
    }
}

#[test]
fn test_biglm_difference_worked_example() {
    // Маленькая LM знает слово 5 только через back-off (2.0), большая знает напрямую (0.3).
    let mut small = VectorFst::with_states(2);
    small.set_start(0);
    small.add_arc(0, FstArc::new(0, 0, 2.0, 1));
    small.add_arc(1, FstArc::new(5, 5, 0.0, 1));
    small.set_final(1, 0.0);

    let mut large = VectorFst::with_states(2);
    large.set_start(0);
    large.add_arc(0, FstArc::new(5, 5, 0.3, 1));
    large.set_final(1, 0.0);

    let mut diff = lm_difference(small, large).unwrap();
    let start = diff.start().unwrap();
    let arc = diff.get_arc(start, 5).unwrap().expect("arc");
    assert!((arc.weight.value() - (-1.7)).abs() < 1e-6);
    assert!(diff.get_arc(start, 6).unwrap().is_none());
}

#[test]
fn test_cache_is_transparent() {
    let mut rng = StdRng::seed_from_u64(9);
    let old = random_lm(&mut rng, 1.0);
    let new = random_lm(&mut rng, 1.0);

    let mut plain = lm_difference(&old, &new).unwrap();
    let mut cached = CacheFst::new(lm_difference(&old, &new).unwrap(), 16);
    let (s_plain, s_cached) = (plain.start().unwrap(), cached.start().unwrap());

    for _ in 0..3 {
        for label in 1..=VOCAB {
            assert_eq!(
                plain.get_arc(s_plain, label).unwrap(),
                cached.get_arc(s_cached, label).unwrap()
            );
        }
    }
    let (hits, misses) = cached.stats();
    assert!(hits > 0);
    assert!(misses >= 1);
}

#[test]
fn test_backoff_rejects_duplicate_labels() {
    let mut lm = VectorFst::with_states(2);
    lm.set_start(0);
    lm.add_arc(0, FstArc::new(3, 3, 0.1, 1));
    lm.add_arc(0, FstArc::new(3, 3, 0.2, 0));
    assert!(BackoffFst::new(&lm).is_err());
}
