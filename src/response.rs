//! Control-channel response validation.
//!
//! Every response carries a numeric result code matching the Kea
//! protocol exactly. The validator classifies each response as success
//! with leases, success with no leases, or a soft error that marks the
//! answering app as erred without aborting the fleet query.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::{Command, ResponseKind};
use crate::model::Lease;

/// Result codes used by the Kea control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// The command succeeded.
    Success = 0,
    /// The daemon reported a failure.
    Error = 1,
    /// The daemon does not support the command.
    CommandUnsupported = 2,
    /// The command succeeded but matched nothing.
    Empty = 3,
}

impl ResultCode {
    /// Map a wire value to a known result code.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(ResultCode::Success),
            1 => Some(ResultCode::Error),
            2 => Some(ResultCode::CommandUnsupported),
            3 => Some(ResultCode::Empty),
            _ => None,
        }
    }
}

/// One element of the response list returned for a command:
/// `{"result": <0|1|2|3>, "text": <string>, "arguments": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Numeric result code.
    pub result: i32,
    /// Free-text status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Typed payload; a single lease or a lease list depending on the
    /// command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// A soft, per-command failure. These fold the answering app into the
/// erred list; they never abort the fleet query.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The daemon returned the `Error` result code.
    #[error("error returned by Kea in response to the {command} command")]
    DaemonFailure {
        /// Wire name of the failed command.
        command: &'static str,
    },
    /// The daemon returned `CommandUnsupported`, e.g. the server runs
    /// an older dialect or lacks the hook.
    #[error("{command} command unsupported")]
    Unsupported {
        /// Wire name of the unsupported command.
        command: &'static str,
    },
    /// Protocol-violation guard: a success response must carry
    /// arguments.
    #[error("response to the {command} command lacks arguments")]
    MissingArguments {
        /// Wire name of the offending command.
        command: &'static str,
    },
    /// The arguments did not decode into the expected lease payload.
    #[error("malformed arguments in response to the {command} command: {source}")]
    Decode {
        /// Wire name of the offending command.
        command: &'static str,
        /// Underlying decode failure.
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct LeaseListArguments {
    #[serde(default)]
    leases: Vec<Lease>,
}

/// Validate a response to a lease command and unwrap its leases.
///
/// Returns an empty vector for the `Empty` result code, which is a
/// valid "nothing matched" answer, not an error. Result codes other
/// than `Error`, `CommandUnsupported` and `Empty` are treated as
/// success as long as arguments are present.
pub fn extract_leases(
    command: &Command,
    response: &CommandResponse,
) -> Result<Vec<Lease>, ResponseError> {
    match ResultCode::from_wire(response.result) {
        Some(ResultCode::Error) => Err(ResponseError::DaemonFailure {
            command: command.name(),
        }),
        Some(ResultCode::CommandUnsupported) => Err(ResponseError::Unsupported {
            command: command.name(),
        }),
        Some(ResultCode::Empty) => Ok(Vec::new()),
        _ => {
            let arguments =
                response
                    .arguments
                    .as_ref()
                    .ok_or(ResponseError::MissingArguments {
                        command: command.name(),
                    })?;
            match command.response_kind() {
                ResponseKind::SingleLease => {
                    let lease: Lease = serde_json::from_value(arguments.clone()).map_err(
                        |source| ResponseError::Decode {
                            command: command.name(),
                            source,
                        },
                    )?;
                    Ok(vec![lease])
                }
                ResponseKind::LeaseList => {
                    let list: LeaseListArguments = serde_json::from_value(arguments.clone())
                        .map_err(|source| ResponseError::Decode {
                            command: command.name(),
                            source,
                        })?;
                    Ok(list.leases)
                }
            }
        }
    }
}
