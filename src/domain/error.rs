//! Engine error taxonomy.

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for triggerlab.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown variable: {variable_id}")]
    UnknownVariable { variable_id: String },

    #[error("unknown indicator: {name}")]
    UnknownIndicator { name: String },

    #[error("insufficient data for {indicator}: have {available} values, need {required}")]
    InsufficientData {
        indicator: String,
        available: usize,
        required: usize,
    },

    #[error("invalid parameter {parameter} for {indicator}: {reason}")]
    InvalidParameter {
        indicator: String,
        parameter: String,
        reason: String,
    },

    #[error("trigger {trigger_id} rejected: {reason}")]
    IncompatibleTrigger { trigger_id: String, reason: String },

    #[error("duplicate trigger id: {trigger_id}")]
    DuplicateTrigger { trigger_id: String },

    #[error("cannot compare {left} with {right}: {reason}")]
    IncompatibleComparison {
        left: String,
        right: String,
        reason: String,
    },

    #[error("no normalization defined for {left} -> {right}: {reason}")]
    UnsupportedGroupPair {
        left: String,
        right: String,
        reason: String,
    },

    #[error("missing data for {what}")]
    MissingData { what: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn invalid_param(
        indicator: &str,
        parameter: &str,
        reason: impl Into<String>,
    ) -> Self {
        EngineError::InvalidParameter {
            indicator: indicator.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::PriceData { .. } => 3,
            EngineError::ConditionParse(_)
            | EngineError::InvalidParameter { .. }
            | EngineError::DuplicateTrigger { .. } => 4,
            EngineError::InsufficientData { .. } | EngineError::MissingData { .. } => 5,
            EngineError::UnknownVariable { .. } | EngineError::UnknownIndicator { .. } => 6,
            EngineError::IncompatibleTrigger { .. }
            | EngineError::IncompatibleComparison { .. }
            | EngineError::UnsupportedGroupPair { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
