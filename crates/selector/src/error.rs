//! Compile-time selector errors.

/// What was wrong with a selector text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("selector is empty")]
    Empty,
    #[error("one side of a '|' disjunction is empty")]
    EmptyAlternative,
    #[error("{0} consecutive '/' characters, at most two are allowed")]
    SeparatorRun(usize),
    #[error("'/' must be followed by a node test")]
    MissingNodeTest,
    #[error("unterminated '[' group")]
    UnterminatedBracket,
    #[error("unterminated quoted value")]
    UnterminatedQuote,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unknown node test \"{0}\"")]
    UnknownNodeTest(String),
    #[error("invalid attribute predicate \"{0}\"")]
    InvalidPredicate(String),
    #[error("invalid position \"{0}\"")]
    InvalidPosition(String),
    #[error("a positional predicate must be the last bracket group")]
    PositionNotLast,
    #[error("node test \"{0}\" does not accept predicates or modifiers")]
    PredicateOnLeaf(String),
    #[error("node test \"{0}\" must be the last segment")]
    LeafNotLast(String),
    #[error("more than one of the id, class and reference modifiers on one segment")]
    ConflictingModifiers,
    #[error("empty '{0}' modifier")]
    EmptyModifier(char),
    #[error("reference \"{0}\" could not be resolved")]
    UnresolvedReference(String),
    #[error("reference \"{reference}\" resolved to \"{resolved}\", which is not a single element segment")]
    InvalidReference { reference: String, resolved: String },
    #[error("both sides of a disjunction must start with the same depth mode")]
    DepthModeMismatch,
}

/// A selector text that failed to compile.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid syntax in selector \"{selector}\": {kind}")]
pub struct SelectorSyntaxError {
    /// The offending selector text.
    pub selector: String,
    /// Why it was rejected.
    pub kind: SyntaxErrorKind,
}

impl SelectorSyntaxError {
    #[inline]
    pub(crate) fn new(selector: &str, kind: SyntaxErrorKind) -> Self {
        Self {
            selector: selector.to_owned(),
            kind,
        }
    }
}

pub type SelectorResult<T> = Result<T, SelectorSyntaxError>;
