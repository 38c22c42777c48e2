use std::fmt;

use super::{ProtoError, Result};

/// One decoded response line.
///
/// The instrument answers every write with a status line. Queries are
/// answered with the value itself, or `Rcmd err` when the value could not
/// be read.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success,        // exec success
    UnknownCommand, // cmd err
    ExecutionError, // execu err
    ReadError,      // Rcmd err
    Payload(String),
}

impl Response {
    pub fn classify(line: &str) -> Self {
        match line {
            "exec success" => Response::Success,
            "cmd err" => Response::UnknownCommand,
            "execu err" => Response::ExecutionError,
            "Rcmd err" => Response::ReadError,
            other => Response::Payload(other.to_string()),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success => f.write_str("exec success"),
            Response::UnknownCommand => f.write_str("cmd err"),
            Response::ExecutionError => f.write_str("execu err"),
            Response::ReadError => f.write_str("Rcmd err"),
            Response::Payload(line) => f.write_str(line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub manufacturer: String,
    pub model: String,
    pub firmware: String,
    pub hardware: String,
    pub serial: String,
}

impl TryFrom<&str> for Ident {
    type Error = ProtoError;

    fn try_from(value: &str) -> Result<Self> {
        let values: Vec<&str> = value.split(',').map(str::trim).collect();
        if values.len() == 5 {
            Ok(Self {
                manufacturer: String::from(values[0]),
                model: String::from(values[1]),
                firmware: String::from(values[2]),
                hardware: String::from(values[3]),
                serial: String::from(values[4]),
            })
        } else {
            Err(ProtoError::IdentityParse(value.to_string()))
        }
    }
}

/// Simultaneous primary and secondary measurement values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub primary: f64,
    pub secondary: f64,
}

impl TryFrom<&str> for Reading {
    type Error = ProtoError;

    fn try_from(value: &str) -> Result<Self> {
        let values: Vec<&str> = value.split(',').map(str::trim).collect();
        if let [primary, secondary] = values.as_slice() {
            let parse = |field: &str| {
                field
                    .parse::<f64>()
                    .map_err(|_| ProtoError::MalformedReading(value.to_string()))
            };
            Ok(Self {
                primary: parse(primary)?,
                secondary: parse(secondary)?,
            })
        } else {
            Err(ProtoError::MalformedReading(value.to_string()))
        }
    }
}
