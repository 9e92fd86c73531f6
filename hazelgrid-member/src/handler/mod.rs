//! Command handlers and the table that dispatches requests to them.
//!
//! A handler turns one request into one response. Errors never escape a
//! handler: [`CommandHandler::process`] folds them into a failure response,
//! and a plain miss is a success without a value.

mod internal;
mod map;
mod ping;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use hazelgrid_core::protocol::constants::{
    COMMAND_CONTAINS_KEY, COMMAND_GET, COMMAND_INTERNAL_MAP, COMMAND_PING, COMMAND_PUT,
    COMMAND_REMOVE,
};
use hazelgrid_core::{GridError, Protocol, Result};

use crate::node::Node;

pub use internal::InternalMapHandler;
pub use map::{MapContainsKeyHandler, MapGetHandler, MapPutHandler, MapRemoveHandler};
pub use ping::{PingHandler, PONG};

/// Executes one command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Executes `request` on `node`, returning the response value.
    ///
    /// `Ok(None)` is a success without a value.
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>>;

    /// Executes `request` and builds the response, turning any error into a
    /// failure that carries its code and message.
    async fn process(&self, node: &Node, request: &Protocol) -> Protocol {
        match self.handle(node, request).await {
            Ok(value) => request.success(value),
            Err(e) => {
                warn!(
                    command = %request.command(),
                    correlation_id = request.correlation_id(),
                    code = %e.code(),
                    error = %e,
                    "command failed"
                );
                request.failure(&e)
            }
        }
    }
}

/// An immutable table from command name to handler.
#[derive(Clone)]
pub struct CommandDispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    /// Returns a builder with no handlers registered.
    pub fn builder() -> CommandDispatcherBuilder {
        CommandDispatcherBuilder::new()
    }

    /// Returns a dispatcher with every built-in handler.
    pub fn with_default_handlers() -> Self {
        CommandDispatcherBuilder::new().with_default_handlers().build()
    }

    /// Returns `true` if a handler is registered for `command`.
    pub fn handles(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Returns the registered command names in sorted order.
    pub fn commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        commands.sort_unstable();
        commands
    }

    /// Routes `request` to its handler and returns the response.
    ///
    /// Unknown commands and messages that are not requests are answered with
    /// a protocol failure.
    pub async fn dispatch(&self, node: &Node, request: &Protocol) -> Protocol {
        if !request.is_request() {
            return request.failure(&GridError::Protocol(format!(
                "expected a request, got a response to '{}'",
                request.command()
            )));
        }
        match self.handlers.get(request.command()) {
            Some(handler) => handler.process(node, request).await,
            None => {
                debug!(command = %request.command(), "unknown command");
                request.failure(&GridError::Protocol(format!(
                    "unknown command '{}'",
                    request.command()
                )))
            }
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::with_default_handlers()
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("commands", &self.commands())
            .finish()
    }
}

/// Builder for [`CommandDispatcher`].
#[derive(Default)]
pub struct CommandDispatcherBuilder {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandDispatcherBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `command`, replacing any earlier registration.
    pub fn register(
        mut self,
        command: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        let command = command.into();
        if self.handlers.insert(command.clone(), Arc::new(handler)).is_some() {
            debug!(command = %command, "replaced command handler");
        }
        self
    }

    /// Registers the map, health-check and forwarding handlers.
    pub fn with_default_handlers(self) -> Self {
        self.register(COMMAND_GET, MapGetHandler)
            .register(COMMAND_PUT, MapPutHandler)
            .register(COMMAND_REMOVE, MapRemoveHandler)
            .register(COMMAND_CONTAINS_KEY, MapContainsKeyHandler)
            .register(COMMAND_PING, PingHandler)
            .register(COMMAND_INTERNAL_MAP, InternalMapHandler)
    }

    /// Freezes the table.
    pub fn build(self) -> CommandDispatcher {
        CommandDispatcher {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemberConfig;
    use hazelgrid_core::ErrorCode;

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, _node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
            Ok(Some(Bytes::copy_from_slice(request.arg(0)?.as_bytes())))
        }
    }

    fn node_with(dispatcher: CommandDispatcher) -> Node {
        Node::builder(MemberConfig::default())
            .dispatcher(dispatcher)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_commands() {
        let dispatcher = CommandDispatcher::with_default_handlers();
        assert_eq!(
            dispatcher.commands(),
            vec!["containsKey", "get", "internal.map", "ping", "put", "remove"]
        );
    }

    #[tokio::test]
    async fn test_custom_handler() {
        let node = node_with(CommandDispatcher::builder().register("echo", EchoHandler).build());
        let request = Protocol::request("echo").with_arg("hi");
        let response = node.process(request.clone()).await;
        assert!(response.is_success());
        assert_eq!(response.correlation_id(), request.correlation_id());
        assert_eq!(response.value().unwrap().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let node = node_with(CommandDispatcher::builder().register("echo", EchoHandler).build());
        let response = node.process(Protocol::request("echo")).await;
        let failure = response.failure_details().unwrap();
        assert_eq!(failure.code, ErrorCode::Protocol);
        assert!(failure.message.contains("missing argument 0"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let node = node_with(CommandDispatcher::with_default_handlers());
        let response = node.process(Protocol::request("frobnicate")).await;
        assert!(response.is_failure());
        assert_eq!(response.failure_details().unwrap().code, ErrorCode::Protocol);
        assert!(!response.is_retryable());
    }

    #[tokio::test]
    async fn test_response_is_rejected() {
        let node = node_with(CommandDispatcher::with_default_handlers());
        let response = Protocol::request(COMMAND_PING).success(None);
        let answer = node.process(response).await;
        assert_eq!(answer.failure_details().unwrap().code, ErrorCode::Protocol);
    }
}
