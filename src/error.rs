use crate::parser::ParserError;


/// Failure of [`crate::evaluate`] and of rolling an [`crate::Equation`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The command did not parse. Nothing was rolled.
    #[error("Parser error - {0}")]
    ParserError(#[from] ParserError),

    /// A rolled face has neither a mapped value nor an integer label.
    #[error("In term `{term}` - face `{face}` has no numeric value")]
    UnknownDiceValue {
        /// Source text of the term.
        term: String,
        /// Label of the offending face.
        face: String
    },

    /// Explosions kept adding dice past the iteration limit.
    #[error("In term `{term}` - explosions did not settle within {limit} iterations")]
    IterationLimitExceeded {
        /// Source text of the term.
        term: String,
        /// See [`crate::ITERATION_LIMIT`].
        limit: usize
    },
}


/// Failure to load a [`crate::Registry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry file could not be read.
    #[error("Failed to read registry: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid registry JSON.
    #[error("Invalid registry document: {0}")]
    Json(#[from] serde_json::Error),

    /// A dice type has neither `sides` nor a non-empty `faces` list.
    #[error("Dice type `{0}` defines no faces")]
    NoFaces(String),

    /// A natural threshold could not be built.
    #[error("Invalid natural rule for dice type `{code}` - {source}")]
    Rule {
        /// Code of the dice type.
        code: String,
        /// Why the rule was rejected.
        source: ParserError
    },
}
