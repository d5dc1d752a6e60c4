#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QueryAstError {
    /// Malformed SQL text.
    #[error("parse error: {0}")]
    Parse(String),
    /// Well-formed SQL whose structure the evaluator cannot model.
    #[error("unsupported statement shape: {0}")]
    ParseShape(String),
    /// A table or CTE name that neither the schema nor the CTE registry knows.
    #[error("unknown relation: {0}")]
    UnknownRelation(String),
}

impl QueryAstError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        QueryAstError::ParseShape(msg.into())
    }
}
