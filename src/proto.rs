use std::time::Duration;

pub mod codec;
pub mod command;
pub mod response;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("I/O error: {:?}", _0)]
    Io(#[from] std::io::Error),

    #[error("Connection to {port} failed: {source}")]
    ConnectionFailed {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Instrument model '{}' is not supported", _0)]
    UnsupportedModel(String),
    #[error("Unable to parse device identification: '{}'", _0)]
    IdentityParse(String),
    #[error("Invalid {setting} '{value}', must be one of {allowed}")]
    InvalidSetting {
        setting: &'static str,
        value: String,
        allowed: String,
    },

    #[error("Unknown command '{}' (cmd err)", _0)]
    UnknownCommand(String),
    #[error("Command '{}' failed (execu err)", _0)]
    ExecutionFailed(String),
    #[error("Command '{command}' returned unexpected response '{response}'")]
    Unexpected { command: String, response: String },
    #[error("Command '{}' could not be read (Rcmd err)", _0)]
    ReadFailed(String),
    #[error("Malformed reading: '{}'", _0)]
    MalformedReading(String),
    #[error("No response to '{command}' within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("Connection was closed")]
    Abort,
}

impl ProtoError {
    pub(crate) fn invalid(
        setting: &'static str,
        value: impl ToString,
        allowed: impl ToString,
    ) -> Self {
        Self::InvalidSetting {
            setting,
            value: value.to_string(),
            allowed: allowed.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
