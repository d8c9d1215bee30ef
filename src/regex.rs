/* Regular expression front end. A pattern is split into tokens, explicit concatenation operators
 * are inserted between adjacent operands and the result is rewritten into postfix order with a
 * shunting-yard pass. Malformed patterns never fail here; the problems found are recorded as
 * warnings and the best effort postfix is returned. */

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegexToken {
    Literal(char),
    Escaped(char),
    Concat,
    Alternation,
    Star,
    Plus,
    LParen,
    RParen,
}

impl RegexToken {
    fn precedence(&self) -> u8 {
        match self {
            RegexToken::Star | RegexToken::Plus => 3,
            RegexToken::Concat => 2,
            RegexToken::Alternation => 1,
            _ => 0,
        }
    }

    // A concatenation is needed between a token that ends an operand and one that begins one
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            RegexToken::Literal(_)
                | RegexToken::Escaped(_)
                | RegexToken::RParen
                | RegexToken::Star
                | RegexToken::Plus
        )
    }

    fn begins_operand(&self) -> bool {
        matches!(
            self,
            RegexToken::Literal(_) | RegexToken::Escaped(_) | RegexToken::LParen
        )
    }

    /// The input character an operand token stands for. `None` for operators and parentheses.
    pub fn literal_char(&self) -> Option<char> {
        match self {
            RegexToken::Literal(ch) => Some(*ch),
            RegexToken::Escaped(ch) => Some(unescape(*ch)),
            _ => None,
        }
    }
}

impl fmt::Display for RegexToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexToken::Literal(ch) => write!(f, "{}", ch),
            RegexToken::Escaped(ch) => write!(f, "\\{}", ch),
            RegexToken::Concat => write!(f, "·"),
            RegexToken::Alternation => write!(f, "|"),
            RegexToken::Star => write!(f, "*"),
            RegexToken::Plus => write!(f, "+"),
            RegexToken::LParen => write!(f, "("),
            RegexToken::RParen => write!(f, ")"),
        }
    }
}

fn unescape(escape_ch: char) -> char {
    match escape_ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        ch => ch,
    }
}

/// Problems found while compiling a pattern leniently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegExWarning {
    /// An opening parenthesis was never closed and has been dropped
    UnmatchedOpeningParenthesis,
    /// A closing parenthesis had no opening partner and has been dropped
    UnmatchedClosingParenthesis,
    /// An operator did not have enough operands and has been skipped
    MissingOperand(RegexToken),
    /// Several fragments were left after construction, only the last one is kept
    DanglingFragments(usize),
}

impl fmt::Display for RegExWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegExWarning::UnmatchedOpeningParenthesis => {
                write!(f, "Warning: unmatched '(' ignored")
            }
            RegExWarning::UnmatchedClosingParenthesis => {
                write!(f, "Warning: unmatched ')' ignored")
            }
            RegExWarning::MissingOperand(op) => {
                write!(f, "Warning: operator '{}' is missing an operand", op)
            }
            RegExWarning::DanglingFragments(count) => write!(
                f,
                "Warning: {} unconnected fragments left, keeping the last one",
                count
            ),
        }
    }
}

/// Errors raised when a pattern is compiled in strict mode
#[derive(Debug, PartialEq, Eq)]
pub enum RegExError {
    UnbalancedParenthesisError(String),
    MissingOperandError(String, RegexToken),
    DanglingFragmentsError(String, usize),
}

impl RegExError {
    pub fn from_warning(pattern: &str, warning: &RegExWarning) -> Self {
        match warning {
            RegExWarning::UnmatchedOpeningParenthesis
            | RegExWarning::UnmatchedClosingParenthesis => {
                RegExError::UnbalancedParenthesisError(pattern.to_string())
            }
            RegExWarning::MissingOperand(op) => {
                RegExError::MissingOperandError(pattern.to_string(), *op)
            }
            RegExWarning::DanglingFragments(count) => {
                RegExError::DanglingFragmentsError(pattern.to_string(), *count)
            }
        }
    }
}

impl fmt::Display for RegExError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegExError::UnbalancedParenthesisError(regex) => {
                write!(f, "Error: {} has unbalanced parenthesis!", regex)
            }
            RegExError::MissingOperandError(regex, op) => {
                write!(f, "Error: operator {} in {} is missing an operand!", op, regex)
            }
            RegExError::DanglingFragmentsError(regex, count) => write!(
                f,
                "Error: {} leaves {} unconnected fragments!",
                regex, count
            ),
        }
    }
}

impl std::error::Error for RegExError {}

/// A pattern in postfix order together with whatever had to be dropped to get there
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Postfix {
    tokens: Vec<RegexToken>,
    warnings: Vec<RegExWarning>,
}

impl Postfix {
    pub fn get_tokens(&self) -> &[RegexToken] {
        &self.tokens
    }

    pub fn get_warnings(&self) -> &[RegExWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for Postfix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

fn scan_pattern(pattern: &str) -> Vec<RegexToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        let token = match ch {
            '\\' => match chars.next() {
                Some(escaped) => RegexToken::Escaped(escaped),
                None => RegexToken::Literal('\\'), // A trailing backslash stands for itself
            },
            '|' => RegexToken::Alternation,
            '*' => RegexToken::Star,
            '+' => RegexToken::Plus,
            '(' => RegexToken::LParen,
            ')' => RegexToken::RParen,
            ch => RegexToken::Literal(ch),
        };
        tokens.push(token);
    }
    tokens
}

/// Split the pattern into tokens and make every concatenation explicit
pub fn preprocess(pattern: &str) -> Vec<RegexToken> {
    let tokens = scan_pattern(pattern);
    let mut result: Vec<RegexToken> = Vec::with_capacity(tokens.len() * 2);

    for token in tokens {
        if let Some(prev) = result.last() {
            if prev.ends_operand() && token.begins_operand() {
                result.push(RegexToken::Concat);
            }
        }
        result.push(token);
    }
    result
}

/// Convert an infix pattern to postfix. Closures bind tightest, then concatenation, then
/// alternation; equal precedence associates to the left.
pub fn to_postfix(pattern: &str) -> Postfix {
    let mut output: Vec<RegexToken> = Vec::new();
    let mut op_stack: Vec<RegexToken> = Vec::new();
    let mut warnings: Vec<RegExWarning> = Vec::new();

    for token in preprocess(pattern) {
        match token {
            RegexToken::Literal(_) | RegexToken::Escaped(_) => output.push(token),
            RegexToken::LParen => op_stack.push(token),
            RegexToken::RParen => {
                let mut matched = false;
                while let Some(top) = op_stack.pop() {
                    if top == RegexToken::LParen {
                        matched = true;
                        break;
                    }
                    output.push(top);
                }
                if !matched {
                    warnings.push(RegExWarning::UnmatchedClosingParenthesis);
                }
            }
            op => {
                while let Some(&top) = op_stack.last() {
                    if top == RegexToken::LParen || top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(top);
                    op_stack.pop();
                }
                op_stack.push(op);
            }
        }
    }

    while let Some(top) = op_stack.pop() {
        if top == RegexToken::LParen {
            warnings.push(RegExWarning::UnmatchedOpeningParenthesis);
        } else {
            output.push(top);
        }
    }

    let postfix = Postfix {
        tokens: output,
        warnings,
    };

    debug!("postfix of {:?} is {}", pattern, postfix);
    for warning in postfix.get_warnings() {
        debug!("{}", warning);
    }

    postfix
}

#[cfg(test)]
mod regex_tests {
    use super::*;

    fn postfix_string(pattern: &str) -> String {
        to_postfix(pattern).to_string()
    }

    #[test]
    fn test_preprocess_inserts_concat() {
        let tokens = preprocess("ab");
        assert_eq!(
            tokens,
            vec![
                RegexToken::Literal('a'),
                RegexToken::Concat,
                RegexToken::Literal('b')
            ]
        );

        let rendered: String = preprocess("a*(b)c+d").iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, "a*·(b)·c+·d");
    }

    #[test]
    fn test_preprocess_leaves_alternation_alone() {
        let rendered: String = preprocess("a|b").iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, "a|b");

        let rendered: String = preprocess("(a)|(b)").iter().map(|t| t.to_string()).collect();
        assert_eq!(rendered, "(a)|(b)");
    }

    #[test]
    fn test_escapes_are_single_literals() {
        let tokens = preprocess("\\+a\\(");
        assert_eq!(
            tokens,
            vec![
                RegexToken::Escaped('+'),
                RegexToken::Concat,
                RegexToken::Literal('a'),
                RegexToken::Concat,
                RegexToken::Escaped('(')
            ]
        );
        assert_eq!(tokens[0].literal_char(), Some('+'));
        assert_eq!(RegexToken::Escaped('n').literal_char(), Some('\n'));
        assert_eq!(RegexToken::Concat.literal_char(), None);
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(preprocess("a\\").last(), Some(&RegexToken::Literal('\\')));
    }

    #[test]
    fn test_postfix_precedence() {
        assert_eq!(postfix_string("a|b"), "ab|");
        assert_eq!(postfix_string("ab|c"), "ab·c|");
        assert_eq!(postfix_string("a|bc*"), "abc*·|");
        assert_eq!(postfix_string("(a|b)*c"), "ab|*c·");
        assert_eq!(postfix_string("abc"), "ab·c·");
        assert_eq!(postfix_string("a+"), "a+");
    }

    #[test]
    fn test_postfix_clean_pattern_has_no_warnings() {
        assert!(to_postfix("(a|b)*abb").get_warnings().is_empty());
        assert!(to_postfix("").is_empty());
    }

    #[test]
    fn test_postfix_unmatched_open_is_dropped() {
        let postfix = to_postfix("(ab");
        assert_eq!(postfix.to_string(), "ab·");
        assert_eq!(
            postfix.get_warnings(),
            &[RegExWarning::UnmatchedOpeningParenthesis]
        );
    }

    #[test]
    fn test_postfix_unmatched_close_is_dropped() {
        let postfix = to_postfix("a)b");
        assert_eq!(postfix.to_string(), "ab·");
        assert_eq!(
            postfix.get_warnings(),
            &[RegExWarning::UnmatchedClosingParenthesis]
        );
    }

    #[test]
    fn test_postfix_trailing_operator_is_kept() {
        let postfix = to_postfix("a|");
        assert_eq!(postfix.to_string(), "a|");
        assert!(postfix.get_warnings().is_empty());
    }

    #[test]
    fn test_strict_error_from_warning() {
        let err = RegExError::from_warning("(a", &RegExWarning::UnmatchedOpeningParenthesis);
        assert_eq!(err, RegExError::UnbalancedParenthesisError("(a".to_string()));
        assert_eq!(err.to_string(), "Error: (a has unbalanced parenthesis!");
    }
}
