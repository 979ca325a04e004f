/// Errors raised while splitting an expression or decoding one of its terms.
///
/// Anything attributable to a single term is wrapped in [`ParserError::InTerm`]
/// together with that term's source text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParserError {
    /// Wraps the error of the term whose source text is given.
    #[error("In term `{0}` - {1}")]
    InTerm(String, Box<ParserError>),

    /// Structural problem: no terms, a bad term shape or leftover option text.
    #[error("Malformed expression: {0}")]
    Malformed(String),

    /// The named token needs an operand and has none.
    #[error("Missing operand for `{0}`")]
    MissingOperand(String),

    /// Neither a registry code nor a positive number of sides.
    #[error("Unknown dice type: {0}")]
    UnknownDiceType(String),

    /// A label used where a number is needed has no value.
    #[error("Face `{0}` has no numeric value")]
    UnknownDiceValue(String),

    /// An operator that is not a comparison.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A quoted face label was not closed.
    #[error("Quoted face label was not closed")]
    UnterminatedLabel,

    /// A count, side count or operand is not a valid integer.
    #[error("Invalid number: {0}")]
    Number(#[from] std::num::ParseIntError),
}

impl ParserError {
    /// Returns the underlying error, skipping the [`ParserError::InTerm`] wrapper.
    pub fn err(&self) -> &Self {
        match self {
            ParserError::InTerm(_, err) => err.as_ref(),
            other => other
        }
    }

    /// Source text of the term the error originated in, if known.
    pub fn term(&self) -> Option<&str> {
        match self {
            ParserError::InTerm(term, _) => Some(term),
            _ => None
        }
    }

    /// Attaches the originating term. An error that already names a term keeps it.
    pub fn in_term(self, term: &str) -> Self {
        match self {
            ParserError::InTerm(_, _) => self,
            other => ParserError::InTerm(term.into(), Box::new(other))
        }
    }
}

/// Result of the parsing stages.
pub type Result<T> = std::result::Result<T, ParserError>;


#[cfg(test)]
mod test {
    use super::*;


    #[test]
    fn test_in_term_wraps_once() {
        let err = ParserError::MissingOperand("k".into())
            .in_term("4d6k")
            .in_term("other");

        assert_eq!(err.term(), Some("4d6k"));
        assert_eq!(err.err(), &ParserError::MissingOperand("k".into()));
        assert_eq!(err.to_string(), "In term `4d6k` - Missing operand for `k`");
    }

    #[test]
    fn test_unwrapped_error() {
        let err = ParserError::UnterminatedLabel;

        assert_eq!(err.term(), None);
        assert_eq!(err.err(), &ParserError::UnterminatedLabel);
    }
}
