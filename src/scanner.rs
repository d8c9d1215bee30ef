/* Maximal munch scanner. Every registered DFA is run from the current position and the longest
 * accepted prefix wins, ties going to the DFA registered first. Characters no DFA accepts become
 * single character UNKNOWN tokens, so scanning never fails. */

use serde::Serialize;
use std::fmt;

use crate::dfa::{compile_recognizer, compile_recognizer_strict, DFA};
use color_eyre::eyre::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TokenKind {
    Identifier,
    Number,
    Plus,
    Minus,
    Mult,
    Div,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Unknown,
    Eof,
}

impl TokenKind {
    /// How the grammar spells this kind of token. UNKNOWN tokens have no grammar terminal.
    pub fn terminal(&self) -> Option<&'static str> {
        match self {
            TokenKind::Identifier => Some("id"),
            TokenKind::Number => Some("num"),
            TokenKind::Plus => Some("+"),
            TokenKind::Minus => Some("-"),
            TokenKind::Mult => Some("*"),
            TokenKind::Div => Some("/"),
            TokenKind::Assign => Some("="),
            TokenKind::LParen => Some("("),
            TokenKind::RParen => Some(")"),
            TokenKind::LBrace => Some("{"),
            TokenKind::RBrace => Some("}"),
            TokenKind::Unknown => None,
            TokenKind::Eof => Some("EOF"),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Mult => "MULT",
            TokenKind::Div => "DIV",
            TokenKind::Assign => "ASSIGN",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Unknown => "UNKNOWN",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    kind: TokenKind,
    text: String,
    position: usize,
    line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: String, position: usize, line: usize) -> Self {
        Token {
            kind,
            text,
            position,
            line,
        }
    }

    pub(crate) fn end_of_stream(position: usize, line: usize) -> Self {
        Token::new(TokenKind::Eof, String::new(), position, line)
    }

    pub fn get_kind(&self) -> TokenKind {
        self.kind
    }

    /// The matched source text, empty for the end of stream token
    pub fn get_text(&self) -> &str {
        &self.text
    }

    /// Offset of the first character of the token, counted in characters
    pub fn get_position(&self) -> usize {
        self.position
    }

    pub fn get_line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.kind, self.text)
    }
}

/// Builds "(a|b|c)" out of a list of characters, escaping the ones the regex syntax reserves
fn one_of(chars: impl IntoIterator<Item = char>) -> String {
    let alternatives: Vec<String> = chars
        .into_iter()
        .map(|ch| match ch {
            '|' | '*' | '+' | '(' | ')' | '\\' => format!("\\{}", ch),
            ch => ch.to_string(),
        })
        .collect();
    format!("({})", alternatives.join("|"))
}

/// Patterns for the expression language in priority order: operators and brackets first, then
/// numbers, then identifiers.
pub fn default_rules() -> Vec<(String, TokenKind)> {
    let digit = one_of('0'..='9');
    let letter = one_of(('a'..='z').chain('A'..='Z').chain(['_']));

    vec![
        ("\\+".to_string(), TokenKind::Plus),
        ("-".to_string(), TokenKind::Minus),
        ("\\*".to_string(), TokenKind::Mult),
        ("/".to_string(), TokenKind::Div),
        ("=".to_string(), TokenKind::Assign),
        ("\\(".to_string(), TokenKind::LParen),
        ("\\)".to_string(), TokenKind::RParen),
        ("{".to_string(), TokenKind::LBrace),
        ("}".to_string(), TokenKind::RBrace),
        (format!("{digit}{digit}*"), TokenKind::Number),
        (format!("{letter}({letter}|{digit})*"), TokenKind::Identifier),
    ]
}

/// Ordered list of recognisers, earlier ones win ties
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    recognizers: Vec<DFA>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer {
            recognizers: Vec::new(),
        }
    }

    /// The rules of the expression language understood by the pushdown parser
    pub fn with_default_rules() -> Self {
        let mut tokenizer = Tokenizer::new();
        for (pattern, kind) in default_rules() {
            tokenizer.add_rule(&pattern, kind);
        }
        tokenizer
    }

    /// Compile `pattern` and register it after every existing rule
    pub fn add_rule(&mut self, pattern: &str, kind: TokenKind) {
        self.recognizers.push(compile_recognizer(pattern, kind));
    }

    /// Like `add_rule` but fails on patterns that need lenient recovery
    pub fn add_rule_strict(&mut self, pattern: &str, kind: TokenKind) -> Result<()> {
        let dfa = compile_recognizer_strict(pattern, kind)?;
        self.recognizers.push(dfa);
        Ok(())
    }

    pub fn add_recognizer(&mut self, dfa: DFA) {
        self.recognizers.push(dfa);
    }

    pub fn get_recognizers(&self) -> &[DFA] {
        &self.recognizers
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenize(&self.recognizers, text)
    }
}

// Longest non empty prefix accepted by any recogniser, the first one registered wins ties
fn longest_match(recognizers: &[DFA], input: &[char]) -> Option<(TokenKind, usize)> {
    let mut best: Option<(TokenKind, usize)> = None;

    for dfa in recognizers {
        let Some(found) = dfa.simulate(input) else {
            continue;
        };
        let Some(kind) = dfa.get_token_kind(found.state) else {
            continue;
        };
        let best_len = best.map(|(_, len)| len).unwrap_or(0);
        if found.length > best_len {
            best = Some((kind, found.length));
        }
    }

    best
}

/// Scan `text` into tokens using the recognisers in priority order. Whitespace separates tokens
/// and is dropped; the result always ends with exactly one EOF token.
pub fn tokenize(recognizers: &[DFA], text: &str) -> Vec<Token> {
    let input: Vec<char> = text.chars().collect();
    let mut token_list: Vec<Token> = Vec::new();
    let mut cursor = 0;
    let mut line = 1;

    while cursor < input.len() {
        let ch = input[cursor];

        if ch.is_whitespace() {
            if ch == '\n' {
                line += 1;
            }
            cursor += 1;
            continue;
        }

        let token = match longest_match(recognizers, &input[cursor..]) {
            Some((kind, length)) => {
                let lexeme: String = input[cursor..cursor + length].iter().collect();
                Token::new(kind, lexeme, cursor, line)
            }
            None => Token::new(TokenKind::Unknown, ch.to_string(), cursor, line),
        };

        trace!("token {} at {}:{}", token, token.get_line(), token.get_position());

        cursor += token.get_text().chars().count();
        token_list.push(token);
    }

    token_list.push(Token::end_of_stream(input.len(), line));

    debug!("scanned {} tokens", token_list.len());

    token_list
}
