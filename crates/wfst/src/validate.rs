//! Проверки предусловий графа поиска.

use decoder_core::{DecoderError, DecoderResult, StateId};

use crate::fst::Fst;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Найти состояние, лежащее на цикле из epsilon-дуг (по входной метке).
///
/// Итеративный DFS с трёхцветной раскраской: O(V + E), без рекурсии.
pub fn find_epsilon_cycle<F: Fst>(fst: &F) -> Option<StateId> {
    let n = fst.num_states();
    let mut color = vec![Color::White; n];
    // (state, index of the next arc to inspect)
    let mut stack: Vec<(StateId, usize)> = Vec::new();

    for root in 0..n as StateId {
        if color[root as usize] != Color::White {
            continue;
        }
        color[root as usize] = Color::Grey;
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let s = top.0;
            let arcs = fst.arcs(s);
            let mut descend = None;
            while top.1 < arcs.len() {
                let arc = arcs[top.1];
                top.1 += 1;
                if !arc.is_epsilon() {
                    continue;
                }
                match color[arc.nextstate as usize] {
                    Color::Grey => return Some(arc.nextstate),
                    Color::White => {
                        descend = Some(arc.nextstate);
                        break;
                    }
                    Color::Black => {}
                }
            }
            match descend {
                Some(next) => {
                    color[next as usize] = Color::Grey;
                    stack.push((next, 0));
                }
                None => {
                    color[s as usize] = Color::Black;
                    stack.pop();
                }
            }
        }
    }
    None
}

/// Отклонить граф с epsilon-циклом: такой граф нарушает предусловия
/// неэмитирующего прохода.
pub fn check_epsilon_acyclic<F: Fst>(fst: &F) -> DecoderResult<()> {
    match find_epsilon_cycle(fst) {
        Some(state) => Err(DecoderError::EpsilonCycle { state }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::{FstArc, VectorFst};

    #[test]
    fn test_acyclic_graph_passes() {
        let mut fst = VectorFst::with_states(3);
        fst.set_start(0);
        fst.add_arc(0, FstArc::new(0, 0, 0.1, 1));
        fst.add_arc(1, FstArc::new(0, 0, 0.1, 2));
        fst.add_arc(0, FstArc::new(0, 0, 0.1, 2));
        // emitting self-loop is fine
        fst.add_arc(2, FstArc::new(3, 3, 0.1, 2));
        assert_eq!(find_epsilon_cycle(&fst), None);
        assert!(check_epsilon_acyclic(&fst).is_ok());
    }

    #[test]
    fn test_epsilon_cycle_detected() {
        let mut fst = VectorFst::with_states(3);
        fst.set_start(0);
        fst.add_arc(0, FstArc::new(1, 1, 0.1, 1));
        fst.add_arc(1, FstArc::new(0, 0, 0.1, 2));
        fst.add_arc(2, FstArc::new(0, 0, -1.0, 1));
        assert!(find_epsilon_cycle(&fst).is_some());
        assert!(matches!(
            check_epsilon_acyclic(&fst),
            Err(DecoderError::EpsilonCycle { .. })
        ));
    }

    #[test]
    fn test_epsilon_self_loop_detected() {
        let mut fst = VectorFst::with_states(1);
        fst.set_start(0);
        fst.add_arc(0, FstArc::new(0, 4, 0.0, 0));
        assert_eq!(find_epsilon_cycle(&fst), Some(0));
    }
}
