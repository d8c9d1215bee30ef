/* Thompson construction over a postfix pattern. Every operand becomes a two state fragment and
 * every operator merges fragments by appending their states with an id offset and wiring them up
 * with epsilon transitions. */

use serde::Serialize;

use crate::fa::{Automaton, Symbol, FA};
use crate::regex::{Postfix, RegExWarning, RegexToken};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NFA {
    automaton: Automaton,
    accept_state: Option<usize>,
    warnings: Vec<RegExWarning>,
}

#[derive(Debug, Clone, Copy)]
enum Quantifier {
    Star,
    Plus,
}

impl FA for NFA {
    fn automaton(&self) -> &Automaton {
        &self.automaton
    }
}

impl NFA {
    fn new() -> Self {
        NFA {
            automaton: Automaton::new(),
            accept_state: None,
            warnings: Vec::new(),
        }
    }

    /// A single accepting state, matching only the empty input
    fn empty_construction() -> NFA {
        let mut result = NFA::new();
        let state = result.automaton.add_state(true);
        result.automaton.set_start_state(state);
        result.accept_state = Some(state);
        result
    }

    fn literal_construction(character: char) -> NFA {
        let mut result = NFA::new();
        let start_state = result.automaton.add_state(false);
        let end_state = result.automaton.add_state(true);
        result
            .automaton
            .add_transition(start_state, end_state, Symbol::Char(character));

        result.automaton.set_start_state(start_state);
        result.accept_state = Some(end_state);
        result
    }

    fn concatenate(nfa1: NFA, nfa2: NFA) -> NFA {
        let mut result = nfa1;
        let offset = result.automaton.append(&nfa2.automaton);
        let right_start = nfa2.get_start_state() + offset;

        // The left accept state now leads into the right fragment
        if let Some(left_accept) = result.accept_state {
            result.automaton.set_final(left_accept, false);
            result
                .automaton
                .add_transition(left_accept, right_start, Symbol::Epsilon);
        }

        result.accept_state = nfa2.accept_state.map(|accept| accept + offset);
        result
    }

    fn alternation(nfa1: NFA, nfa2: NFA) -> NFA {
        let mut result = NFA::new();
        let new_start = result.automaton.add_state(false);

        let offset1 = result.automaton.append(&nfa1.automaton);
        let offset2 = result.automaton.append(&nfa2.automaton);

        let new_accept = result.automaton.add_state(true);

        result
            .automaton
            .add_transition(new_start, nfa1.get_start_state() + offset1, Symbol::Epsilon);
        result
            .automaton
            .add_transition(new_start, nfa2.get_start_state() + offset2, Symbol::Epsilon);

        let old_accepts = [
            nfa1.accept_state.map(|accept| accept + offset1),
            nfa2.accept_state.map(|accept| accept + offset2),
        ];

        for accept in old_accepts.into_iter().flatten() {
            result.automaton.set_final(accept, false);
            result
                .automaton
                .add_transition(accept, new_accept, Symbol::Epsilon);
        }

        result.automaton.set_start_state(new_start);
        result.accept_state = Some(new_accept);
        result
    }

    fn closure(nfa: NFA, quantifier: Quantifier) -> NFA {
        let mut result = NFA::new();
        let new_start = result.automaton.add_state(false);

        let offset = result.automaton.append(&nfa.automaton);

        let new_accept = result.automaton.add_state(true);

        let old_start = nfa.get_start_state() + offset;

        result
            .automaton
            .add_transition(new_start, old_start, Symbol::Epsilon);

        if let Some(old_accept) = nfa.accept_state.map(|accept| accept + offset) {
            result.automaton.set_final(old_accept, false);
            result
                .automaton
                .add_transition(old_accept, old_start, Symbol::Epsilon);
            result
                .automaton
                .add_transition(old_accept, new_accept, Symbol::Epsilon);
        }

        match quantifier {
            Quantifier::Star => {
                // Zero occurrences skip the inner fragment entirely
                result
                    .automaton
                    .add_transition(new_start, new_accept, Symbol::Epsilon);
            }
            Quantifier::Plus => {}
        }

        result.automaton.set_start_state(new_start);
        result.accept_state = Some(new_accept);
        result
    }

    /// The designated accepting state, `None` when it was pruned as unreachable
    pub fn get_accept_state(&self) -> Option<usize> {
        self.accept_state
    }

    /// Everything that had to be dropped or skipped to build this NFA
    pub fn get_warnings(&self) -> &[RegExWarning] {
        &self.warnings
    }

    /// Prune unreachable states and renumber, keeping the accept state in step
    pub fn optimize(&mut self) {
        let remap = self.automaton.optimize();
        self.accept_state = self
            .accept_state
            .and_then(|accept| remap.get(accept).copied().flatten());
    }
}

/// Build an NFA from a postfix pattern using Thompson Construction. Operators without enough
/// operands are skipped and reported as warnings; an empty pattern gives an NFA accepting only the
/// empty input.
pub fn construct_nfa(postfix: &Postfix) -> NFA {
    let mut stack: Vec<NFA> = Vec::new();
    let mut warnings: Vec<RegExWarning> = postfix.get_warnings().to_vec();

    for token in postfix.get_tokens() {
        match token {
            RegexToken::Literal(_) | RegexToken::Escaped(_) => {
                if let Some(character) = token.literal_char() {
                    stack.push(NFA::literal_construction(character));
                }
            }
            RegexToken::Concat | RegexToken::Alternation => {
                if stack.len() < 2 {
                    warnings.push(RegExWarning::MissingOperand(*token));
                    continue;
                }
                if let (Some(nfa2), Some(nfa1)) = (stack.pop(), stack.pop()) {
                    let merged = if *token == RegexToken::Concat {
                        NFA::concatenate(nfa1, nfa2)
                    } else {
                        NFA::alternation(nfa1, nfa2)
                    };
                    stack.push(merged);
                }
            }
            RegexToken::Star | RegexToken::Plus => {
                let quantifier = if *token == RegexToken::Star {
                    Quantifier::Star
                } else {
                    Quantifier::Plus
                };
                match stack.pop() {
                    Some(nfa) => stack.push(NFA::closure(nfa, quantifier)),
                    None => warnings.push(RegExWarning::MissingOperand(*token)),
                }
            }
            RegexToken::LParen | RegexToken::RParen => {} // Never present in postfix
        }
    }

    if stack.len() > 1 {
        warnings.push(RegExWarning::DanglingFragments(stack.len()));
    }

    let mut result = stack.pop().unwrap_or_else(NFA::empty_construction);
    result.warnings = warnings;
    result.optimize();

    debug!("nfa for {} has {} states", postfix, result.get_num_states());

    result
}
