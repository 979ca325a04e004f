//! Evaluator for tabletop dice notation such as `2d20kl1 + 2d6!r1 - 3 < 10`.
//!
//! An expression is split into signed terms, each term's option suffix is
//! decoded into a [`ClauseSet`], and every [`DiceTerm`] is rolled against a
//! [`Registry`] of dice types: rerolls, explosions and keep rules first, then
//! the success, failure, boon and complication counters. The resulting
//! [`Equation`] carries everything a presentation layer needs.
//!
//! ```
//! use faceroll::{evaluate, Registry};
//!
//! let registry = Registry::from_json_str(r#"{ "F": { "faces": ["-", "0", "+"], "values": { "-": -1, "+": 1 } } }"#).unwrap();
//! let equation = evaluate("4dF + 2", &registry).unwrap();
//!
//! assert!((-2..=6).contains(&equation.total()));
//! ```
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]


#[cfg(test)]
mod roll_test_strategies;

mod error;
mod registry;
mod roll;
mod parser;
mod equation;

pub use error::{Error, RegistryError};
pub use registry::{DiceType, Face, Registry};
pub use roll::{DiceTerm, DieSource, Keep, Counters, ITERATION_LIMIT, MAX_DICE};
pub use parser::{
    ParserError,
    Atom, Category, CategoryClause, Clause, ClauseSet, Compare, Crit, Threshold,
    parse_equation, evaluate, evaluate_with
};
pub use equation::{Equation, Term, Sign, Comparison, Headline};
