//! Agent transport: carries batched commands to an app's control
//! channel.
//!
//! The engine talks to the fleet through the [`AgentTransport`] trait
//! so the wire plumbing stays swappable (and mockable in tests). A
//! transport failure is a hard error for the affected app only; the
//! engine folds it into the erred-apps bookkeeping and keeps querying
//! the rest of the fleet.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::command::Command;
use crate::model::App;
use crate::response::CommandResponse;

/// Errors raised by the transport itself, as opposed to error result
/// codes returned by a daemon.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The agent or control channel could not be reached.
    #[error("communication with {url} failed: {source}")]
    Connection {
        /// Control endpoint that failed.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The control channel answered with a non-JSON or otherwise
    /// unparseable body.
    #[error("malformed control channel payload from {url}: {source}")]
    Malformed {
        /// Control endpoint that failed.
        url: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
    /// The control channel returned an empty response list for a
    /// command.
    #[error("no response received to the {command} command")]
    EmptyResponse {
        /// Wire name of the command.
        command: &'static str,
    },
    /// The number of responses does not match the number of commands.
    #[error("received {received} responses to {sent} commands")]
    ResponseCountMismatch {
        /// Commands sent.
        sent: usize,
        /// Responses received.
        received: usize,
    },
    /// The per-app deadline elapsed before the dispatch completed.
    #[error("control channel call timed out")]
    Timeout,
}

/// Transport contract consumed by the lease engine.
///
/// All commands destined for one app are handed over in a single call
/// to keep per-app round trips minimal. On success the returned vector
/// holds exactly one response per command, positionally matched: slot
/// *i* answers command *i*, even when the daemon reported an error
/// result code.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Forward a batch of commands to the app's control channel.
    async fn forward_commands(
        &self,
        app: &App,
        commands: &[Command],
    ) -> Result<Vec<CommandResponse>, TransportError>;
}

/// Transport that POSTs the JSON command envelope directly to each
/// app's control endpoint over HTTP.
pub struct HttpAgentTransport {
    client: reqwest::Client,
}

impl HttpAgentTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn forward_commands(
        &self,
        app: &App,
        commands: &[Command],
    ) -> Result<Vec<CommandResponse>, TransportError> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            debug!(app = %app.name, command = command.name(), "forwarding command");
            let reply = self
                .client
                .post(&app.control_url)
                .json(command)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|source| TransportError::Connection {
                    url: app.control_url.clone(),
                    source,
                })?;
            // The control channel answers with a list holding one
            // element per daemon in the service list; we always target
            // a single daemon.
            let list: Vec<CommandResponse> =
                reply
                    .json()
                    .await
                    .map_err(|source| TransportError::Malformed {
                        url: app.control_url.clone(),
                        source,
                    })?;
            let first = list
                .into_iter()
                .next()
                .ok_or(TransportError::EmptyResponse {
                    command: command.name(),
                })?;
            responses.push(first);
        }
        Ok(responses)
    }
}
