/* Shared graph container for NFAs and DFAs. States live in a vector and refer to each other by
 * index, so whole fragments can be merged by appending and offsetting ids. */

use bitvec::prelude::*;
use petgraph::dot::Dot;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::prelude::StableGraph;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum Symbol {
    Epsilon,
    Char(char),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Epsilon => write!(f, "ε"),
            Symbol::Char(ch) => write!(f, "{}", ch.escape_debug()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Transition {
    symbol: Symbol,
    target: usize,
}

impl Transition {
    pub fn new(symbol: Symbol, target: usize) -> Self {
        Transition { symbol, target }
    }

    pub fn get_symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn get_target(&self) -> usize {
        self.target
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct State {
    id: usize,
    is_final: bool,
    transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nfa_state_ids: Vec<usize>, // Only filled for DFA states, the NFA states this one stands for
}

impl State {
    fn new(id: usize, is_final: bool) -> Self {
        State {
            id,
            is_final,
            transitions: Vec::new(),
            nfa_state_ids: Vec::new(),
        }
    }

    pub fn get_id(&self) -> usize {
        self.id
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Get a list of all outgoing transitions for the given state
    pub fn get_transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The NFA states a DFA state was built from. Empty for NFA states.
    pub fn get_nfa_state_ids(&self) -> &[usize] {
        &self.nfa_state_ids
    }

    pub(crate) fn set_nfa_state_ids(&mut self, ids: Vec<usize>) {
        self.nfa_state_ids = ids;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Automaton {
    states: Vec<State>,
    start_state: usize,
}

/// Read-only view over a finite automaton, enough for a renderer to draw it.
pub trait FA {
    fn automaton(&self) -> &Automaton;

    fn get_num_states(&self) -> usize {
        self.automaton().states.len()
    }

    fn get_start_state(&self) -> usize {
        self.automaton().start_state
    }

    fn get_states(&self) -> &[State] {
        &self.automaton().states
    }

    fn get_state(&self, id: usize) -> Option<&State> {
        self.automaton().states.get(id)
    }

    fn get_state_transitions(&self, state_id: usize) -> &[Transition] {
        match self.get_state(state_id) {
            Some(state) => state.get_transitions(),
            None => &[],
        }
    }

    /// Every non epsilon symbol used on some transition, in sorted order
    fn get_alphabet(&self) -> BTreeSet<char> {
        let mut alphabet = BTreeSet::new();
        for state in self.get_states() {
            for transition in state.get_transitions() {
                if let Symbol::Char(ch) = transition.get_symbol() {
                    alphabet.insert(ch);
                }
            }
        }
        alphabet
    }

    fn get_acceptor_states(&self) -> BitVec<u8> {
        let mut accept_states = BitVec::repeat(false, self.get_num_states());
        for state in self.get_states() {
            if state.is_final() {
                accept_states.set(state.get_id(), true);
            }
        }
        accept_states
    }

    /// Build a petgraph graph of the automaton. Nodes are labelled by state id, parallel edges
    /// between the same pair of states are merged into one edge with a comma separated label.
    fn to_graph(&self) -> StableGraph<String, String> {
        let mut stable_graph = StableGraph::new();

        let num_states = self.get_num_states();

        let mut edge_map: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();

        for state_idx in 0..num_states {
            stable_graph.add_node(format!("State {}", state_idx));
        }

        for state_idx in 0..num_states {
            for transition in self.get_state_transitions(state_idx) {
                if transition.get_target() >= num_states {
                    continue;
                }
                let edge_label = transition.get_symbol().to_string();
                let from = NodeIndex::new(state_idx);
                let to = NodeIndex::new(transition.get_target());

                match edge_map.get(&(from, to)).copied() {
                    Some(edge_idx) => {
                        let old_label = &stable_graph[edge_idx];
                        let new_label = format!("{}, {}", old_label, edge_label);
                        stable_graph[edge_idx] = new_label;
                    }
                    None => {
                        let edge_idx = stable_graph.add_edge(from, to, edge_label);
                        edge_map.insert((from, to), edge_idx);
                    }
                }
            }
        }

        if self.get_start_state() < num_states {
            let start_node = NodeIndex::new(self.get_start_state());
            stable_graph[start_node] = format!("Start\n{}", stable_graph[start_node]);
        }

        for accept in self.get_acceptor_states().iter_ones() {
            let accept_node = NodeIndex::new(accept);
            stable_graph[accept_node] = format!("Accept\n{}", stable_graph[accept_node]);
        }

        stable_graph
    }

    /// Graphviz rendering of `to_graph`
    fn to_dot(&self) -> String {
        let graph = self.to_graph();
        Dot::new(&graph).to_string()
    }
}

impl FA for Automaton {
    fn automaton(&self) -> &Automaton {
        self
    }
}

impl Automaton {
    pub fn new() -> Self {
        Automaton {
            states: Vec::new(),
            start_state: 0,
        }
    }

    pub fn add_state(&mut self, is_final: bool) -> usize {
        let state_id = self.states.len();
        self.states.push(State::new(state_id, is_final));
        state_id
    }

    /// Adds a transition from `from` to `to`. Does nothing unless both are states.
    pub fn add_transition(&mut self, from: usize, to: usize, symbol: Symbol) {
        if to >= self.states.len() {
            return;
        }
        if let Some(state) = self.states.get_mut(from) {
            state.transitions.push(Transition::new(symbol, to));
        }
    }

    pub fn set_start_state(&mut self, state_id: usize) {
        self.start_state = state_id;
    }

    pub fn set_final(&mut self, state_id: usize, is_final: bool) {
        if let Some(state) = self.states.get_mut(state_id) {
            state.is_final = is_final;
        }
    }

    pub(crate) fn get_mut_state(&mut self, state_id: usize) -> Option<&mut State> {
        self.states.get_mut(state_id)
    }

    /// Follows the first transition on `symbol` out of `state_id`
    pub fn next_state(&self, state_id: usize, symbol: Symbol) -> Option<usize> {
        self.states
            .get(state_id)?
            .transitions
            .iter()
            .find(|transition| transition.symbol == symbol)
            .map(|transition| transition.target)
    }

    /// Copy all states of `other` to the end of this automaton, shifting their ids and
    /// transition targets. Returns the offset that was applied.
    pub fn append(&mut self, other: &Automaton) -> usize {
        let offset = self.states.len();

        for state in &other.states {
            let mut state = state.clone();
            state.id += offset;
            for transition in state.transitions.iter_mut() {
                transition.target += offset;
            }
            self.states.push(state);
        }

        offset
    }

    /// Sort and de-duplicate transitions, drop every state not reachable from the start state and
    /// renumber the survivors in breadth first order so the start state becomes 0.
    ///
    /// Returns the old id to new id mapping, `None` for dropped states. If the start state does not
    /// exist the automaton is emptied.
    pub fn optimize(&mut self) -> Vec<Option<usize>> {
        for state in self.states.iter_mut() {
            state.transitions.sort();
            state.transitions.dedup();
        }

        let num_states = self.states.len();
        let mut remap: Vec<Option<usize>> = vec![None; num_states];

        if self.start_state >= num_states {
            self.states.clear();
            self.start_state = 0;
            return remap;
        }

        let mut order: Vec<usize> = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        remap[self.start_state] = Some(0);
        order.push(self.start_state);
        queue.push_back(self.start_state);

        while let Some(state_id) = queue.pop_front() {
            for transition in &self.states[state_id].transitions {
                let target = transition.target;
                if target < num_states && remap[target].is_none() {
                    remap[target] = Some(order.len());
                    order.push(target);
                    queue.push_back(target);
                }
            }
        }

        let mut old_states = std::mem::take(&mut self.states);

        for (new_id, old_id) in order.into_iter().enumerate() {
            let mut state = std::mem::take(&mut old_states[old_id]);
            state.id = new_id;
            // Targets are rewritten and re-sorted so that running this again changes nothing
            let mut transitions: Vec<Transition> = state
                .transitions
                .iter()
                .filter_map(|transition| {
                    let target = remap.get(transition.target).copied().flatten()?;
                    Some(Transition::new(transition.symbol, target))
                })
                .collect();
            transitions.sort();
            transitions.dedup();
            state.transitions = transitions;
            self.states.push(state);
        }

        self.start_state = 0;

        remap
    }
}
