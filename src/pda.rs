/* Explicit stack machine replaying the fixed grammar over a token stream. Each call to `step`
 * either expands one nonterminal or matches one terminal and records a snapshot of what it saw,
 * so a finished or half finished parse can be replayed from its history alone. */

use serde::Serialize;
use std::fmt;

use crate::grammar::{
    predict, GrammarSymbol, EOF, EPSILON, LBRACE, LPAREN, RBRACE, RPAREN, START_SYMBOL,
};
use crate::scanner::Token;

/// A bracket pair the grammar knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupingPair {
    Parenthesis,
    Brace,
}

impl GroupingPair {
    fn from_closer(terminal: &str) -> Option<GroupingPair> {
        match terminal {
            RPAREN => Some(GroupingPair::Parenthesis),
            RBRACE => Some(GroupingPair::Brace),
            _ => None,
        }
    }

    pub fn open(&self) -> &'static str {
        match self {
            GroupingPair::Parenthesis => LPAREN,
            GroupingPair::Brace => LBRACE,
        }
    }

    pub fn close(&self) -> &'static str {
        match self {
            GroupingPair::Parenthesis => RPAREN,
            GroupingPair::Brace => RBRACE,
        }
    }
}

impl fmt::Display for GroupingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingPair::Parenthesis => write!(f, "parenthesis"),
            GroupingPair::Brace => write!(f, "brace"),
        }
    }
}

/// Why a parse was rejected. The display text is the action label of the failing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParseError {
    /// A closing bracket was expected but a different token was found
    MismatchedGrouping { pair: GroupingPair, found: String },
    /// A closing bracket appeared with no opening partner waiting for it
    UnexpectedClosing(GroupingPair),
    /// The input ended while a closing bracket was still expected
    UnclosedGrouping(GroupingPair),
    UnexpectedTerminal { expected: String, found: String },
    CannotExpand { nonterminal: String, found: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MismatchedGrouping { pair, found } => write!(
                f,
                "Mismatched grouping: expected '{}' to close {}, got '{}'",
                pair.close(),
                pair,
                found
            ),
            ParseError::UnexpectedClosing(pair) => write!(
                f,
                "Mismatched grouping: '{}' has no matching '{}'",
                pair.close(),
                pair.open()
            ),
            ParseError::UnclosedGrouping(pair) => write!(
                f,
                "Mismatched grouping: '{}' is never closed by '{}'",
                pair.open(),
                pair.close()
            ),
            ParseError::UnexpectedTerminal { expected, found } => {
                write!(f, "Stack error: expected '{}', got '{}'", expected, found)
            }
            ParseError::CannotExpand { nonterminal, found } => {
                write!(f, "Error expanding {} with '{}'", nonterminal, found)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Snapshot taken before a step changed anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseStep {
    stack: Vec<GrammarSymbol>,
    token: Token,
    action: String,
}

impl ParseStep {
    /// Stack contents, bottom first
    pub fn get_stack(&self) -> &[GrammarSymbol] {
        &self.stack
    }

    pub fn get_token(&self) -> &Token {
        &self.token
    }

    pub fn get_action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for ParseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack: Vec<String> = self.stack.iter().map(|symbol| symbol.to_string()).collect();
        write!(f, "[{}] {} : {}", stack.join(" "), self.token, self.action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PdaStatus {
    Running,
    Accepted,
    Rejected,
}

impl fmt::Display for PdaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdaStatus::Running => write!(f, "running"),
            PdaStatus::Accepted => write!(f, "accepted"),
            PdaStatus::Rejected => write!(f, "rejected"),
        }
    }
}

// The grammar spelling used in messages, falling back to the raw text for unknown tokens
fn token_name(token: &Token) -> String {
    match token.get_kind().terminal() {
        Some(terminal) => terminal.to_string(),
        None => token.get_text().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Pda {
    stack: Vec<GrammarSymbol>,
    tokens: Vec<Token>,
    cursor: usize,
    history: Vec<ParseStep>,
    error: Option<ParseError>,
    success: bool,
}

impl Default for Pda {
    fn default() -> Self {
        Self::new()
    }
}

impl Pda {
    /// A machine with the start symbol seeded and no input loaded
    pub fn new() -> Self {
        let mut pda = Pda {
            stack: Vec::new(),
            tokens: Vec::new(),
            cursor: 0,
            history: Vec::new(),
            error: None,
            success: false,
        };
        pda.reset();
        pda
    }

    /// Seed the stack with the end marker beneath the start symbol and forget any progress. The
    /// loaded tokens are kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(GrammarSymbol::Terminal(EOF));
        self.stack.push(GrammarSymbol::NonTerminal(START_SYMBOL));
        self.cursor = 0;
        self.history.clear();
        self.error = None;
        self.success = false;
    }

    pub fn load_input(&mut self, tokens: Vec<Token>) {
        self.reset();
        self.tokens = tokens;
    }

    /// Stack contents, bottom first
    pub fn get_stack(&self) -> &[GrammarSymbol] {
        &self.stack
    }

    pub fn get_tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get_cursor(&self) -> usize {
        self.cursor
    }

    pub fn get_history(&self) -> &[ParseStep] {
        &self.history
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> PdaStatus {
        if self.success {
            PdaStatus::Accepted
        } else if self.error.is_some() {
            PdaStatus::Rejected
        } else {
            PdaStatus::Running
        }
    }

    /// The token under the cursor. Past the end, or with nothing loaded, this is an end of
    /// stream token.
    pub fn current_token(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => token.clone(),
            None => {
                let position = self
                    .tokens
                    .last()
                    .map(|token| token.get_position())
                    .unwrap_or(0);
                let line = self.tokens.last().map(|token| token.get_line()).unwrap_or(1);
                Token::end_of_stream(position, line)
            }
        }
    }

    fn at_end_of_stream(&self) -> bool {
        self.cursor + 1 >= self.tokens.len()
    }

    fn record(&mut self, stack: Vec<GrammarSymbol>, token: Token, action: String) {
        debug!("{} | {}", token, action);
        self.history.push(ParseStep {
            stack,
            token,
            action,
        });
    }

    fn fail(&mut self, stack: Vec<GrammarSymbol>, token: Token, error: ParseError) -> bool {
        self.record(stack, token, error.to_string());
        self.error = Some(error);
        false
    }

    // Closest closing bracket still waiting on the stack
    fn pending_closer(&self) -> Option<GroupingPair> {
        self.stack.iter().rev().find_map(|symbol| match symbol {
            GrammarSymbol::Terminal(name) => GroupingPair::from_closer(name),
            GrammarSymbol::NonTerminal(_) => None,
        })
    }

    /// Perform one expansion or match. Returns false once the machine has halted, including on
    /// the step that rejects the input.
    pub fn step(&mut self) -> bool {
        if self.success || self.error.is_some() {
            return false;
        }

        let top = match self.stack.last() {
            Some(top) => *top,
            None => {
                self.success = self.at_end_of_stream();
                return false;
            }
        };

        let snapshot = self.stack.clone();
        let token = self.current_token();
        let lookahead = token.get_kind().terminal();

        match top {
            GrammarSymbol::Terminal(EPSILON) => {
                self.stack.pop();
                self.record(snapshot, token, format!("Match {}", EPSILON));
                true
            }
            GrammarSymbol::Terminal(expected) if lookahead == Some(expected) => {
                self.stack.pop();
                if expected == EOF {
                    self.success = true;
                } else {
                    self.cursor += 1;
                }
                self.record(snapshot, token, format!("Match {}", expected));
                true
            }
            GrammarSymbol::Terminal(expected) => {
                let found = token_name(&token);
                let error = match (
                    GroupingPair::from_closer(expected),
                    lookahead.and_then(GroupingPair::from_closer),
                ) {
                    (Some(pair), _) => ParseError::MismatchedGrouping { pair, found },
                    (None, Some(pair)) => ParseError::UnexpectedClosing(pair),
                    (None, None) => ParseError::UnexpectedTerminal {
                        expected: expected.to_string(),
                        found,
                    },
                };
                self.fail(snapshot, token, error)
            }
            GrammarSymbol::NonTerminal(nonterminal) => {
                self.stack.pop();

                let next = self
                    .tokens
                    .get(self.cursor + 1)
                    .and_then(|token| token.get_kind().terminal());

                match predict(nonterminal, lookahead, next) {
                    Some(production) => {
                        self.stack.extend(
                            production
                                .get_rhs()
                                .iter()
                                .rev()
                                .filter(|symbol| !symbol.is_epsilon()),
                        );
                        self.record(snapshot, token, production.to_string());
                        true
                    }
                    None => {
                        let error = match (
                            lookahead,
                            self.pending_closer(),
                            lookahead.and_then(GroupingPair::from_closer),
                        ) {
                            (Some(EOF), Some(pair), _) => ParseError::UnclosedGrouping(pair),
                            (_, None, Some(pair)) => ParseError::UnexpectedClosing(pair),
                            _ => ParseError::CannotExpand {
                                nonterminal: nonterminal.to_string(),
                                found: token_name(&token),
                            },
                        };
                        self.fail(snapshot, token, error)
                    }
                }
            }
        }
    }

    /// Step until the machine halts
    pub fn run(&mut self) -> PdaStatus {
        while self.step() {}
        self.status()
    }
}

#[cfg(test)]
mod pda_tests {
    use super::*;
    use crate::grammar::{EXPR, STMT};
    use crate::scanner::Tokenizer;
    use once_cell::sync::Lazy;

    static DEFAULT_TOKENIZER: Lazy<Tokenizer> = Lazy::new(Tokenizer::with_default_rules);

    fn load(source: &str) -> Pda {
        let tokens = DEFAULT_TOKENIZER.tokenize(source);
        let mut pda = Pda::new();
        pda.load_input(tokens);
        pda
    }

    #[test]
    fn test_initial_stack() {
        let pda = Pda::new();
        assert_eq!(
            pda.get_stack(),
            &[
                GrammarSymbol::Terminal(EOF),
                GrammarSymbol::NonTerminal(STMT)
            ]
        );
        assert_eq!(pda.get_cursor(), 0);
        assert!(!pda.is_error());
        assert!(!pda.is_success());
        assert_eq!(pda.status(), PdaStatus::Running);
    }

    #[test]
    fn test_assignment_is_accepted() {
        let mut pda = load("x = 10 + 20");

        assert_eq!(pda.run(), PdaStatus::Accepted);
        assert!(pda.is_success());
        assert!(!pda.is_error());
        assert_eq!(pda.get_cursor(), pda.get_tokens().len() - 1);
        assert_eq!(pda.get_stack(), &[] as &[GrammarSymbol]);

        let history = pda.get_history();
        assert_eq!(history[0].get_action(), "Stmt -> id = Expr");
        assert_eq!(history[1].get_action(), "Match id");
        assert_eq!(history.last().unwrap().get_action(), "Match EOF");
    }

    #[test]
    fn test_first_step_snapshot() {
        let mut pda = load("1");
        assert!(pda.step());

        let first = &pda.get_history()[0];
        assert_eq!(
            first.get_stack(),
            &[
                GrammarSymbol::Terminal(EOF),
                GrammarSymbol::NonTerminal(STMT)
            ]
        );
        assert_eq!(first.get_token().get_text(), "1");
        assert_eq!(first.get_action(), "Stmt -> Expr");
        assert_eq!(
            pda.get_stack(),
            &[
                GrammarSymbol::Terminal(EOF),
                GrammarSymbol::NonTerminal(EXPR)
            ]
        );
    }

    #[test]
    fn test_epsilon_is_never_pushed() {
        let mut pda = load("a");
        while pda.step() {
            assert!(pda.get_stack().iter().all(|symbol| !symbol.is_epsilon()));
        }
        assert!(pda.is_success());
        assert!(pda
            .get_history()
            .iter()
            .any(|step| step.get_action() == "Term' -> epsilon"));
    }

    #[test]
    fn test_unclosed_group() {
        let mut pda = load("(1 + ");

        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::UnclosedGrouping(GroupingPair::Parenthesis))
        );
        let last = pda.get_history().last().unwrap().get_action();
        assert!(last.starts_with("Mismatched grouping"));
        assert!(last.contains("'('"));
    }

    #[test]
    fn test_mismatched_pair() {
        let mut pda = load("(1 }");

        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::MismatchedGrouping {
                pair: GroupingPair::Parenthesis,
                found: "}".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_closing() {
        let mut pda = load("1 )");
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::UnexpectedClosing(GroupingPair::Parenthesis))
        );

        let mut pda = load("}");
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::UnexpectedClosing(GroupingPair::Brace))
        );
    }

    #[test]
    fn test_cannot_expand() {
        let mut pda = load("1 +");

        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::CannotExpand {
                nonterminal: "Term".to_string(),
                found: "EOF".to_string()
            })
        );
        assert_eq!(
            pda.get_history().last().unwrap().get_action(),
            "Error expanding Term with 'EOF'"
        );
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let mut pda = load("1 $ 2");
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::CannotExpand {
                nonterminal: "Term'".to_string(),
                found: "$".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_terminal() {
        let mut pda = load("1 2");
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert!(matches!(
            pda.error(),
            Some(ParseError::CannotExpand { .. }) | Some(ParseError::UnexpectedTerminal { .. })
        ));

        let mut pda = load("x = = 1");
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::CannotExpand {
                nonterminal: "Expr".to_string(),
                found: "=".to_string()
            })
        );
    }

    #[test]
    fn test_block_statement() {
        let mut pda = load("{ x = 1 } * (2 - y) / 3");
        assert_eq!(pda.run(), PdaStatus::Accepted);
    }

    #[test]
    fn test_halted_step_is_a_no_op() {
        let mut pda = load("1 +");
        pda.run();

        let history_len = pda.get_history().len();
        let stack = pda.get_stack().to_vec();

        assert!(!pda.step());
        assert!(!pda.step());
        assert_eq!(pda.get_history().len(), history_len);
        assert_eq!(pda.get_stack(), stack.as_slice());
    }

    #[test]
    fn test_history_counts_steps() {
        for source in ["x = 10 + 20", "(1 + ", "a * (b - 2)", "1 )", ""] {
            let mut pda = load(source);
            let mut true_steps = 0;
            let mut calls = 0;
            while pda.step() {
                true_steps += 1;
                calls += 1;
            }
            calls += 1;

            let recorded = pda.get_history().len();
            assert!(recorded >= true_steps, "{}", source);
            assert!(recorded <= true_steps + 1, "{}", source);
            assert!(recorded <= calls);
        }
    }

    #[test]
    fn test_no_input_sees_end_of_stream() {
        let mut pda = Pda::new();
        assert_eq!(pda.current_token().get_kind(), crate::scanner::TokenKind::Eof);
        assert_eq!(pda.run(), PdaStatus::Rejected);
        assert_eq!(
            pda.error(),
            Some(&ParseError::CannotExpand {
                nonterminal: "Expr".to_string(),
                found: "EOF".to_string()
            })
        );
    }

    #[test]
    fn test_reset_keeps_tokens() {
        let mut pda = load("x = 1");
        pda.run();
        assert!(pda.is_success());

        pda.reset();
        assert_eq!(pda.status(), PdaStatus::Running);
        assert!(pda.get_history().is_empty());
        assert_eq!(pda.get_tokens().len(), 4);
        assert_eq!(pda.run(), PdaStatus::Accepted);
    }
}
