//! Error types for the evaluation core.
//!
//! Two currencies, never mixed:
//! - [`PolicyError`] is raised while building expressions and function
//!   calls. A malformed policy fails here and never reaches evaluation.
//! - [`Indeterminate`] is the evaluation-time failure, the third outcome
//!   next to true and false.

use crate::datatype::Datatype;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for construction-time operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Result type for evaluation.
pub type EvalResult<T> = std::result::Result<T, Indeterminate>;

/// Errors raised while building an expression tree.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Wrong number of arguments for a function.
    #[error("Invalid number of arguments for function '{function}': expected {expected}, got {actual}")]
    InvalidArity {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Argument datatype does not match the declared parameter type.
    #[error("Invalid arg #{index} for function '{function}': expected datatype {expected}, got {actual}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: Datatype,
        actual: Datatype,
    },

    /// Argument list unacceptable for reasons other than count or type.
    #[error("Invalid arguments for function '{function}': {reason}")]
    InvalidArguments { function: String, reason: String },

    /// No function registered under this identifier.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Function identifier already registered.
    #[error("Function already registered: {0}")]
    DuplicateFunction(String),

    /// Reference to an undefined variable.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Variable identifier already defined.
    #[error("Variable already defined: {0}")]
    DuplicateVariable(String),

    /// First argument of a higher-order function is not a constant function.
    #[error("Invalid first arg for higher-order function '{function}': not a statically defined function")]
    NonConstantFunctionArgument { function: String },

    /// Sub-function of a higher-order function is not acceptable.
    #[error("Invalid sub-function '{sub_function}' for higher-order function '{function}': {reason}")]
    InvalidSubFunction {
        function: String,
        sub_function: String,
        reason: String,
    },

    /// Variable reference chain longer than allowed.
    #[error("Variable '{variable}' has a reference chain of length {depth}, exceeding the maximum {max}")]
    VariableDepthExceeded {
        variable: String,
        depth: usize,
        max: usize,
    },

    /// Literal value does not match the lexical space of its datatype.
    #[error("Invalid {datatype} literal '{value}': {reason}")]
    InvalidLiteral {
        datatype: Datatype,
        value: String,
        reason: String,
    },

    /// Regular expression could not be compiled.
    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    /// Function definition inconsistent with its implementation.
    #[error("Invalid signature for function '{function}': {reason}")]
    InvalidSignature { function: String, reason: String },

    /// Expression unsuitable where it is used.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// Feature disabled or not available.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration could not be parsed or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(err: serde_yaml::Error) -> Self {
        PolicyError::Config(err.to_string())
    }
}

impl From<regex::Error> for PolicyError {
    fn from(err: regex::Error) -> Self {
        PolicyError::InvalidRegex(err.to_string())
    }
}

/// Status category of an [`Indeterminate`] result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    /// The XACML status code URN.
    pub fn urn(&self) -> &'static str {
        match self {
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::MissingAttribute => "missing-attribute",
            StatusCode::SyntaxError => "syntax-error",
            StatusCode::ProcessingError => "processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation-time failure: a status category, a message and an optional
/// chained cause.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{status}: {message}")]
pub struct Indeterminate {
    status: StatusCode,
    message: String,
    #[source]
    cause: Option<Arc<Indeterminate>>,
}

impl Indeterminate {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }

    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self::new(StatusCode::MissingAttribute, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SyntaxError, message)
    }

    pub fn processing_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ProcessingError, message)
    }

    /// Chains `cause` under this failure.
    pub fn with_cause(mut self, cause: impl Into<Arc<Indeterminate>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Wraps the failure of argument `index` of `function`, keeping the
    /// argument's status category.
    pub fn for_arg(function: &str, index: usize, cause: Indeterminate) -> Self {
        Self::new(
            cause.status,
            format!("{function}: indeterminate arg #{index}"),
        )
        .with_cause(cause)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Indeterminate> {
        self.cause.as_deref()
    }

    /// The innermost failure of the cause chain.
    pub fn root_cause(&self) -> &Indeterminate {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Serialize for Indeterminate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Indeterminate", 3)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("cause", &self.cause())?;
        state.end()
    }
}
