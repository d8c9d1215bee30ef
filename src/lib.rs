//! # parseviz
//!
//! The computational core of a lexing/parsing teaching tool.
//!
//! This library provides functionality to:
//! - Rewrite regular expressions into postfix form with explicit concatenation
//! - Convert postfix regular expressions to NFAs using Thompson Construction
//! - Convert NFAs to DFAs using Subset Construction, tagging accept states with a token kind
//! - Prune and renumber automata so they can be handed to a renderer
//! - Tokenize source text by longest match over an ordered list of DFAs
//! - Replay a fixed LL(1) grammar on a pushdown automaton one step at a time, keeping every step

// Diagnostics go to stderr. `debug!` prints with the `logging` feature, the per token `trace!`
// output also needs `logging-trace`.

macro_rules! debug {
    ($($arg:tt)*) => {
        if cfg!(feature = "logging") {
            eprintln!($($arg)*);
        }
    }
}

macro_rules! trace {
    ($($arg:tt)*) => {
        if cfg!(feature = "logging-trace") {
            eprint!("    ");
            eprintln!($($arg)*);
        }
    }
}

// Re-export the modules
pub mod dfa;
pub mod fa;
pub mod grammar;
pub mod nfa;
pub mod pda;
pub mod regex;
pub mod scanner;

// Re-export commonly used functions for convenience
pub use dfa::{compile_recognizer, compile_recognizer_strict, construct_dfa, DFA};
pub use fa::{Automaton, Symbol, FA};
pub use nfa::{construct_nfa, NFA};
pub use pda::{ParseStep, Pda, PdaStatus};
pub use regex::to_postfix;
pub use scanner::{tokenize, Token, TokenKind, Tokenizer};

#[cfg(test)]
mod lib_tests {
    #[test]
    fn test_trace_feature_enables_logging() {
        // The trace level only adds output on top of the debug level
        assert!(!cfg!(feature = "logging-trace") || cfg!(feature = "logging"));
        debug!("debug {}", 1);
        trace!("trace {}", 2);
    }
}
