/* The fixed grammar driven by the pushdown parser, written as an LL(1) prediction table.
 *
 *   Stmt    -> id = Expr | Expr
 *   Expr    -> Term Expr'
 *   Expr'   -> + Term Expr' | - Term Expr' | epsilon
 *   Term    -> Factor Term'
 *   Term'   -> * Factor Term' | / Factor Term' | epsilon
 *   Factor  -> ( Expr ) | { Stmt } | num | id
 *
 * Stmt is the only place a second token of lookahead is used, to tell an assignment from an
 * expression starting with an identifier. */

use serde::Serialize;
use std::fmt;

pub const STMT: &str = "Stmt";
pub const EXPR: &str = "Expr";
pub const EXPR_REST: &str = "Expr'";
pub const TERM: &str = "Term";
pub const TERM_REST: &str = "Term'";
pub const FACTOR: &str = "Factor";

pub const ID: &str = "id";
pub const NUM: &str = "num";
pub const PLUS: &str = "+";
pub const MINUS: &str = "-";
pub const MULT: &str = "*";
pub const DIV: &str = "/";
pub const ASSIGN: &str = "=";
pub const LPAREN: &str = "(";
pub const RPAREN: &str = ")";
pub const LBRACE: &str = "{";
pub const RBRACE: &str = "}";
pub const EOF: &str = "EOF";
/// Marks a production that derives nothing. Never pushed onto the parse stack.
pub const EPSILON: &str = "epsilon";

pub const START_SYMBOL: &str = STMT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GrammarSymbol {
    Terminal(&'static str),
    NonTerminal(&'static str),
}

impl GrammarSymbol {
    pub fn get_name(&self) -> &'static str {
        match self {
            GrammarSymbol::Terminal(name) | GrammarSymbol::NonTerminal(name) => name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GrammarSymbol::Terminal(_))
    }

    pub fn is_epsilon(&self) -> bool {
        *self == GrammarSymbol::Terminal(EPSILON)
    }
}

impl fmt::Display for GrammarSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarSymbol::Terminal(name) => write!(f, "'{}'", name),
            GrammarSymbol::NonTerminal(name) => write!(f, "<{}>", name),
        }
    }
}

use GrammarSymbol::{NonTerminal as N, Terminal as T};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Production {
    lhs: &'static str,
    rhs: &'static [GrammarSymbol],
}

impl Production {
    pub fn get_lhs(&self) -> &'static str {
        self.lhs
    }

    pub fn get_rhs(&self) -> &'static [GrammarSymbol] {
        self.rhs
    }

    pub fn is_epsilon(&self) -> bool {
        self.rhs.iter().all(|symbol| symbol.is_epsilon())
    }
}

// Renders like "Expr -> Term Expr'"
impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.lhs)?;
        for symbol in self.rhs {
            write!(f, " {}", symbol.get_name())?;
        }
        Ok(())
    }
}

const STMT_ASSIGN: Production = Production {
    lhs: STMT,
    rhs: &[T(ID), T(ASSIGN), N(EXPR)],
};
const STMT_EXPR: Production = Production {
    lhs: STMT,
    rhs: &[N(EXPR)],
};
const EXPR_TERM: Production = Production {
    lhs: EXPR,
    rhs: &[N(TERM), N(EXPR_REST)],
};
const EXPR_REST_PLUS: Production = Production {
    lhs: EXPR_REST,
    rhs: &[T(PLUS), N(TERM), N(EXPR_REST)],
};
const EXPR_REST_MINUS: Production = Production {
    lhs: EXPR_REST,
    rhs: &[T(MINUS), N(TERM), N(EXPR_REST)],
};
const EXPR_REST_EMPTY: Production = Production {
    lhs: EXPR_REST,
    rhs: &[T(EPSILON)],
};
const TERM_FACTOR: Production = Production {
    lhs: TERM,
    rhs: &[N(FACTOR), N(TERM_REST)],
};
const TERM_REST_MULT: Production = Production {
    lhs: TERM_REST,
    rhs: &[T(MULT), N(FACTOR), N(TERM_REST)],
};
const TERM_REST_DIV: Production = Production {
    lhs: TERM_REST,
    rhs: &[T(DIV), N(FACTOR), N(TERM_REST)],
};
const TERM_REST_EMPTY: Production = Production {
    lhs: TERM_REST,
    rhs: &[T(EPSILON)],
};
const FACTOR_PAREN: Production = Production {
    lhs: FACTOR,
    rhs: &[T(LPAREN), N(EXPR), T(RPAREN)],
};
const FACTOR_BLOCK: Production = Production {
    lhs: FACTOR,
    rhs: &[T(LBRACE), N(STMT), T(RBRACE)],
};
const FACTOR_NUM: Production = Production {
    lhs: FACTOR,
    rhs: &[T(NUM)],
};
const FACTOR_ID: Production = Production {
    lhs: FACTOR,
    rhs: &[T(ID)],
};

static PRODUCTIONS: [Production; 14] = [
    STMT_ASSIGN,
    STMT_EXPR,
    EXPR_TERM,
    EXPR_REST_PLUS,
    EXPR_REST_MINUS,
    EXPR_REST_EMPTY,
    TERM_FACTOR,
    TERM_REST_MULT,
    TERM_REST_DIV,
    TERM_REST_EMPTY,
    FACTOR_PAREN,
    FACTOR_BLOCK,
    FACTOR_NUM,
    FACTOR_ID,
];

/// Every production of the grammar, grouped by left hand side
pub fn productions() -> &'static [Production] {
    &PRODUCTIONS
}

fn starts_expr(lookahead: &str) -> bool {
    matches!(lookahead, ID | NUM | LPAREN | LBRACE)
}

/// Pick the production to expand `nonterminal` with. `lookahead` is the grammar spelling of the
/// current token and `next` that of the token after it; either is `None` when the token has no
/// spelling or does not exist. `None` is returned when no production applies.
pub fn predict(
    nonterminal: &str,
    lookahead: Option<&str>,
    next: Option<&str>,
) -> Option<&'static Production> {
    if nonterminal == STMT {
        if lookahead == Some(ID) && next == Some(ASSIGN) {
            return Some(&STMT_ASSIGN);
        }
        return Some(&STMT_EXPR);
    }

    let lookahead = lookahead?;

    let production = match nonterminal {
        EXPR if starts_expr(lookahead) => &EXPR_TERM,
        EXPR_REST => match lookahead {
            PLUS => &EXPR_REST_PLUS,
            MINUS => &EXPR_REST_MINUS,
            RPAREN | RBRACE | EOF => &EXPR_REST_EMPTY,
            _ => return None,
        },
        TERM if starts_expr(lookahead) => &TERM_FACTOR,
        TERM_REST => match lookahead {
            MULT => &TERM_REST_MULT,
            DIV => &TERM_REST_DIV,
            PLUS | MINUS | RPAREN | RBRACE | EOF => &TERM_REST_EMPTY,
            _ => return None,
        },
        FACTOR => match lookahead {
            LPAREN => &FACTOR_PAREN,
            LBRACE => &FACTOR_BLOCK,
            NUM => &FACTOR_NUM,
            ID => &FACTOR_ID,
            _ => return None,
        },
        _ => return None,
    };

    Some(production)
}
