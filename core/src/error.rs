use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unrecognized request: {0}")]
    UnknownKind(String),
    #[error("{kind}: missing field `{field}`")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("invalid integer `{0}`")]
    BadInteger(String),
    #[error("invalid term entry `{0}`")]
    BadTerm(String),
    #[error("path `{0}` contains a reserved character")]
    BadPath(String),
    #[error("malformed reply: {0}")]
    BadReply(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("frequency of `{term}` in document {doc} would overflow")]
    FrequencyOverflow { term: String, doc: u64 },
}
