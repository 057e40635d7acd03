use thiserror::Error;

/// Failures that abort translation outright. Everything softer (an
/// unrecognized DSL node, an unknown field) degrades instead: the planner
/// marks the affected entry `can_parse = false` and keeps going.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("request body must be a JSON object")]
    BodyNotAnObject,
    #[error("schema input is not valid JSON: {0}")]
    MalformedSchema(serde_json::Error),
}
