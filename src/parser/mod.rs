mod error;
mod lexer;
mod clause;
mod parse;

#[cfg(test)]
pub(crate) mod str_test_strategies;

pub use error::ParserError;
pub(crate) use lexer::{Lexer, Token};
pub use clause::{Atom, Category, CategoryClause, Clause, ClauseSet, Compare, Crit, Threshold};
pub use parse::{parse_equation, evaluate, evaluate_with};
