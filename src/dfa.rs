/* Perform subset construction to convert an NFA into a DFA recognising one token kind, and run the
 * resulting DFA over input to find the longest accepted prefix. */

use crate::fa::{Automaton, Symbol, FA};
use crate::nfa::{construct_nfa, NFA};
use crate::regex::{to_postfix, RegExError};
use crate::scanner::TokenKind;
use bitvec::prelude::*;
use color_eyre::eyre::{Report, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};

/// A struct which is a bitvec and its hash stored together to ease fetching the hash of the bitvec
/// quickly instead of calculating it each time.

#[derive(Clone)]
struct HashedBitVec {
    bv: BitVec<u8>,
    hash: u64,
}

impl HashedBitVec {
    fn new(bv: BitVec<u8>) -> Self {
        let mut hasher = DefaultHasher::new();
        bv.hash(&mut hasher);
        let hash = hasher.finish();
        Self { bv, hash }
    }
}

impl Hash for HashedBitVec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for HashedBitVec {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bv == other.bv
    }
}

impl Eq for HashedBitVec {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DFA {
    automaton: Automaton,
    token_kinds: BTreeMap<usize, TokenKind>, // Accept state id to the token kind it recognises
}

/// Outcome of running a DFA over some input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaMatch {
    /// The accept state the longest match ended in
    pub state: usize,
    /// Number of characters consumed by the longest match
    pub length: usize,
}

impl FA for DFA {
    fn automaton(&self) -> &Automaton {
        &self.automaton
    }
}

impl DFA {
    fn new() -> Self {
        DFA {
            automaton: Automaton::new(),
            token_kinds: BTreeMap::new(),
        }
    }

    fn add_state(&mut self, nfa_states: &BitVec<u8>, kind: Option<TokenKind>) -> usize {
        let state_id = self.automaton.add_state(kind.is_some());
        if let Some(state) = self.automaton.get_mut_state(state_id) {
            state.set_nfa_state_ids(nfa_states.iter_ones().collect());
        }
        if let Some(kind) = kind {
            self.token_kinds.insert(state_id, kind);
        }
        state_id
    }

    /// The token kind recognised when the DFA stops in `state_id`, if it is an accept state
    pub fn get_token_kind(&self, state_id: usize) -> Option<TokenKind> {
        self.token_kinds.get(&state_id).copied()
    }

    pub fn get_token_kinds(&self) -> &BTreeMap<usize, TokenKind> {
        &self.token_kinds
    }

    /// Prune unreachable states and renumber, carrying the token kinds of accept states along
    pub fn optimize(&mut self) {
        let remap = self.automaton.optimize();
        self.token_kinds = self
            .token_kinds
            .iter()
            .filter_map(|(state, kind)| Some((remap.get(*state).copied().flatten()?, *kind)))
            .collect();
    }

    /// Walk the DFA over `input` from the start state until the input ends or no transition
    /// exists. The last accept state seen decides the match, not the state at the dead end. An
    /// accepting start state gives a zero length match.
    pub fn simulate(&self, input: &[char]) -> Option<DfaMatch> {
        let mut state = self.get_start_state();
        let start = self.get_state(state)?;

        let mut last_accept = if start.is_final() {
            Some(DfaMatch { state, length: 0 })
        } else {
            None
        };

        for (pos, ch) in input.iter().enumerate() {
            let next_state = match self.automaton.next_state(state, Symbol::Char(*ch)) {
                Some(next_state) => next_state,
                None => break, // Dead end
            };

            state = next_state;

            if self.get_state(state).is_some_and(|state| state.is_final()) {
                last_accept = Some(DfaMatch {
                    state,
                    length: pos + 1,
                });
            }
        }

        last_accept
    }

    /// True if the whole of `text` is accepted
    pub fn accepts(&self, text: &str) -> bool {
        let input: Vec<char> = text.chars().collect();
        self.simulate(&input)
            .is_some_and(|found| found.length == input.len())
    }
}

fn to_bitvec(nfa: &NFA, nfa_states: &BitVec<u8>) -> BitVec<u8> {
    let mut result = nfa_states.clone();
    result.resize(nfa.get_num_states(), false);
    result
}

/// All NFA states reachable from `nfa_states` using only epsilon transitions, including the
/// states themselves
pub fn epsilon_closure(nfa: &NFA, nfa_states: &BitVec<u8>) -> BitVec<u8> {
    let mut closure = to_bitvec(nfa, nfa_states);

    let mut work_list: VecDeque<usize> = closure.iter_ones().collect();

    while let Some(state_id) = work_list.pop_front() {
        for transition in nfa.get_state_transitions(state_id) {
            let target = transition.get_target();
            if transition.get_symbol() == Symbol::Epsilon
                && target < closure.len()
                && !closure[target]
            {
                closure.set(target, true);
                work_list.push_back(target);
            }
        }
    }

    closure
}

/// The move step: NFA states reachable from `nfa_states` through one transition on `c`
pub fn delta(nfa: &NFA, nfa_states: &BitVec<u8>, c: char) -> BitVec<u8> {
    let mut result: BitVec<u8> = BitVec::repeat(false, nfa.get_num_states());

    for state_id in nfa_states.iter_ones() {
        for transition in nfa.get_state_transitions(state_id) {
            let target = transition.get_target();
            if transition.get_symbol() == Symbol::Char(c) && target < result.len() {
                result.set(target, true);
            }
        }
    }
    result
}

// Every non empty move out of `nfa_states` keyed by character, gathered in a single pass
fn moves(nfa: &NFA, nfa_states: &BitVec<u8>) -> BTreeMap<char, BitVec<u8>> {
    let num_states = nfa.get_num_states();
    let mut result: BTreeMap<char, BitVec<u8>> = BTreeMap::new();

    for state_id in nfa_states.iter_ones() {
        for transition in nfa.get_state_transitions(state_id) {
            let target = transition.get_target();
            if let Symbol::Char(c) = transition.get_symbol() {
                if target < num_states {
                    result
                        .entry(c)
                        .or_insert_with(|| BitVec::repeat(false, num_states))
                        .set(target, true);
                }
            }
        }
    }
    result
}

///  Apply the subset construction algorithm on an NFA to build a DFA. Every DFA state whose NFA
///  state set contains the NFA's accept state is tagged with `kind`.
pub fn construct_dfa(nfa: &NFA, kind: TokenKind) -> DFA {
    let mut result = DFA::new();

    if nfa.get_num_states() == 0 {
        return result;
    }

    let nfa_accept = nfa.get_accept_state();

    let accepting = |set: &BitVec<u8>| -> Option<TokenKind> {
        let accept = nfa_accept?;
        set.get(accept).filter(|bit| **bit).map(|_| kind)
    };

    // Mapping from nfa state set to DFA state
    let mut q_list: HashMap<HashedBitVec, usize> = HashMap::new();
    let mut work_list: VecDeque<(HashedBitVec, usize)> = VecDeque::new();

    let mut nfa_states: BitVec<u8> = BitVec::repeat(false, nfa.get_num_states());
    nfa_states.set(nfa.get_start_state(), true);

    let q0 = HashedBitVec::new(epsilon_closure(nfa, &nfa_states));
    let d0 = result.add_state(&q0.bv, accepting(&q0.bv));
    result.automaton.set_start_state(d0);

    q_list.insert(q0.clone(), d0);
    work_list.push_back((q0, d0));

    while let Some((q, dq)) = work_list.pop_front() {
        for (c, end_states) in moves(nfa, &q.bv) {
            let t = HashedBitVec::new(epsilon_closure(nfa, &end_states));

            let dt = match q_list.get(&t) {
                Some(&existing) => existing,
                None => {
                    let dt = result.add_state(&t.bv, accepting(&t.bv));
                    q_list.insert(t.clone(), dt);
                    work_list.push_back((t, dt));
                    dt
                }
            };

            result.automaton.add_transition(dq, dt, Symbol::Char(c));
        }
    }

    result.optimize();

    debug!("dfa for {} has {} states", kind, result.get_num_states());

    result
}

/// Compile a pattern into a DFA recognising `kind`: postfix rewriting, Thompson Construction and
/// Subset Construction in one call. Malformed patterns are compiled leniently.
pub fn compile_recognizer(pattern: &str, kind: TokenKind) -> DFA {
    let nfa = construct_nfa(&to_postfix(pattern));
    construct_dfa(&nfa, kind)
}

/// Like `compile_recognizer` but refuses patterns that needed any lenient recovery
pub fn compile_recognizer_strict(pattern: &str, kind: TokenKind) -> Result<DFA> {
    let nfa = construct_nfa(&to_postfix(pattern));

    if let Some(warning) = nfa.get_warnings().first() {
        let err = Report::new(RegExError::from_warning(pattern, warning));
        return Err(err);
    }

    Ok(construct_dfa(&nfa, kind))
}

#[cfg(test)]
mod dfa_tests {
    use super::*;

    fn dfa_for(pattern: &str) -> DFA {
        compile_recognizer(pattern, TokenKind::Identifier)
    }

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[test]
    fn test_moves_agree_with_delta() {
        let nfa = construct_nfa(&to_postfix("(ab|ac)*d"));
        let everything: BitVec<u8> = BitVec::repeat(true, nfa.get_num_states());

        let all_moves = moves(&nfa, &everything);
        assert_eq!(all_moves.keys().copied().collect::<Vec<char>>(), chars("abcd"));
        for (c, targets) in &all_moves {
            assert_eq!(targets, &delta(&nfa, &everything, *c));
        }
        assert!(delta(&nfa, &everything, 'e').not_any());
    }

    #[test]
    fn test_alternation_dfa() {
        let dfa = dfa_for("a|b");

        assert!(dfa.accepts("a"));
        assert!(dfa.accepts("b"));
        assert!(!dfa.accepts("c"));
        assert!(!dfa.accepts(""));
        assert!(!dfa.accepts("ab"));
    }

    #[test]
    fn test_star_dfa() {
        let dfa = dfa_for("(a|b)*");

        assert!(dfa.accepts(""));
        assert!(dfa.accepts("a"));
        assert!(dfa.accepts("aabba"));
        assert!(!dfa.accepts("abc"));
        assert!(!dfa.accepts("c"));
    }

    #[test]
    fn test_plus_dfa() {
        let dfa = dfa_for("a+");

        assert!(!dfa.accepts(""));
        assert!(dfa.accepts("a"));
        assert!(dfa.accepts("aaa"));
        assert!(!dfa.accepts("aab"));
    }

    #[test]
    fn test_dfa_has_no_epsilon_and_is_deterministic() {
        let dfa = dfa_for("(a|b)*abb");

        for state in dfa.get_states() {
            let mut symbols: Vec<Symbol> = state
                .get_transitions()
                .iter()
                .map(|transition| transition.get_symbol())
                .collect();
            assert!(!symbols.contains(&Symbol::Epsilon));
            let before = symbols.len();
            symbols.dedup();
            assert_eq!(before, symbols.len());
        }
        assert!(dfa.accepts("babb"));
        assert!(!dfa.accepts("bab"));
    }

    #[test]
    fn test_accept_states_are_tagged() {
        let dfa = compile_recognizer("ab", TokenKind::Number);

        let accepts: Vec<usize> = dfa.get_acceptor_states().iter_ones().collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(dfa.get_token_kind(accepts[0]), Some(TokenKind::Number));
        assert_eq!(dfa.get_token_kind(dfa.get_start_state()), None);
        assert_eq!(dfa.get_token_kinds().len(), 1);
    }

    #[test]
    fn test_dfa_states_remember_nfa_sets() {
        let dfa = dfa_for("a");
        let start = dfa.get_state(dfa.get_start_state()).unwrap();
        assert_eq!(start.get_nfa_state_ids(), &[0]);
    }

    #[test]
    fn test_equal_subsets_are_shared() {
        let dfa = dfa_for("a*");
        // The start set and the set after any number of a's differ, but every later set repeats
        assert_eq!(dfa.get_num_states(), 2);
    }

    #[test]
    fn test_empty_pattern_dfa() {
        let dfa = dfa_for("");

        assert_eq!(dfa.get_num_states(), 1);
        assert!(dfa.accepts(""));
        assert!(!dfa.accepts("a"));
        assert_eq!(
            dfa.simulate(&chars("abc")),
            Some(DfaMatch {
                state: 0,
                length: 0
            })
        );
    }

    #[test]
    fn test_simulate_keeps_last_accept() {
        let dfa = dfa_for("a|abc");

        let found = dfa.simulate(&chars("abx")).unwrap();
        assert_eq!(found.length, 1);

        let found = dfa.simulate(&chars("abcabc")).unwrap();
        assert_eq!(found.length, 3);
        assert_eq!(dfa.get_token_kind(found.state), Some(TokenKind::Identifier));

        assert_eq!(dfa.simulate(&chars("x")), None);
    }

    #[test]
    fn test_epsilon_closure_and_delta() {
        let nfa = construct_nfa(&to_postfix("a*"));

        let mut start: BitVec<u8> = BitVec::repeat(false, nfa.get_num_states());
        start.set(nfa.get_start_state(), true);

        let closure = epsilon_closure(&nfa, &start);
        // Start, the inner start and the accept state through the bypass
        assert_eq!(closure.count_ones(), 3);
        assert!(closure[nfa.get_accept_state().unwrap()]);

        let moved = delta(&nfa, &closure, 'a');
        assert_eq!(moved.count_ones(), 1);
        assert!(delta(&nfa, &closure, 'b').not_any());
    }

    #[test]
    fn test_strict_compilation() {
        assert!(compile_recognizer_strict("(a|b)*", TokenKind::Identifier).is_ok());

        let result = compile_recognizer_strict("(a|b", TokenKind::Identifier);
        assert!(result.is_err());

        let err = result.unwrap_err();
        match err.downcast_ref::<RegExError>() {
            Some(RegExError::UnbalancedParenthesisError(_)) => {}
            _ => unreachable!(),
        }

        // The lenient path still produces something usable
        assert!(compile_recognizer("(a|b", TokenKind::Identifier).accepts("b"));
    }

    #[test]
    fn test_optimize_is_idempotent_for_dfa() {
        let once = dfa_for("(a|b)*abb|c+");
        let mut twice = once.clone();
        twice.optimize();
        assert_eq!(once, twice);
    }
}
