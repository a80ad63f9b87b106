//! Request dispatch.
//!
//! One client message is one request. The dispatcher parses it into
//! statements and runs them in order against a single [`RequestContext`]:
//!
//! 1. resolve the command key (`first.second` if registered, else `first`)
//! 2. run the command (terminal commands fan out to every handler)
//! 3. if the command left a response object, transmit it with the request's
//!    protocol (or the default one)
//!
//! The first failing statement stops the request. Dispatch errors are sent
//! to the client as an error response (`status=error` extension followed by
//! the rendered error); transport errors are returned to the caller.

use std::sync::Arc;

use bes_core::{
    DispatchError, DispatchResult, ErrorResponse, InfoResponse, RequestContext, ResponseObject,
    Session, VersionResponse,
};
use bes_protocol::{Extension, PptError, ResponseSink};
use tracing::{debug, error, warn};

use crate::config::{ServerSettings, DEFAULT_TRANSMITTER};
use crate::error::RequestError;
use crate::registry::{Command, Registries};
use crate::request::{self, Args, Statement, Token};
use crate::status::ServerStatus;

/// Name the server reports for itself in `show version`.
pub const SERVER_NAME: &str = "bes";

/// Server version reported in `show version`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What a command may touch besides the request context.
pub struct CommandEnv<'a> {
    pub session: &'a mut Session,
    pub registries: &'a Registries,
    pub status: &'a ServerStatus,
    /// Protocol used when a request does not name one
    pub default_transmitter: &'a str,
}

/// How a request ended, when the connection survived it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    /// An error response was sent to the client.
    Failed(DispatchError),
}

pub struct Dispatcher {
    registries: Arc<Registries>,
    status: Arc<ServerStatus>,
    default_transmitter: String,
    annotation_url: Option<String>,
}

impl Dispatcher {
    pub fn new(registries: Arc<Registries>, status: Arc<ServerStatus>) -> Self {
        Self {
            registries,
            status,
            default_transmitter: DEFAULT_TRANSMITTER.to_string(),
            annotation_url: None,
        }
    }

    pub fn from_settings(
        registries: Arc<Registries>,
        status: Arc<ServerStatus>,
        settings: &ServerSettings,
    ) -> Self {
        Self {
            registries,
            status,
            default_transmitter: settings.default_transmitter.clone(),
            annotation_url: settings.annotation_url.clone(),
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn status(&self) -> &ServerStatus {
        &self.status
    }

    pub fn default_transmitter(&self) -> &str {
        &self.default_transmitter
    }

    fn new_context(&self) -> RequestContext {
        RequestContext::default().with_annotation_url(self.annotation_url.clone())
    }

    /// Runs one request, writing responses (or an error response) to
    /// `sink`.
    ///
    /// Does not write the end-of-message marker.
    pub async fn execute(
        &self,
        request: &str,
        session: &mut Session,
        sink: &mut dyn ResponseSink,
    ) -> Result<RequestOutcome, PptError> {
        let mut ctx = self.new_context();
        ctx.log_line = request.trim().to_string();

        match self.run(request, session, &mut ctx, sink).await {
            Ok(()) => Ok(RequestOutcome::Completed),
            Err(RequestError::Transport(e)) => Err(e),
            Err(RequestError::Dispatch(e)) => {
                let protocol = ctx.transmit_protocol.clone();
                self.report_error(&e, protocol.as_deref(), &ctx, sink).await?;
                Ok(RequestOutcome::Failed(e))
            }
        }
    }

    /// Sends an error response for a request that never reached dispatch.
    pub async fn reject(
        &self,
        error: &DispatchError,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), PptError> {
        let ctx = self.new_context();
        self.report_error(error, None, &ctx, sink).await
    }

    async fn run(
        &self,
        request: &str,
        session: &mut Session,
        ctx: &mut RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), RequestError> {
        let statements = request::parse(request)?;

        for statement in &statements {
            let (key, command, tokens) = self.resolve(statement)?;
            ctx.begin_command(&key);
            debug!(command = %key, "Executing command");

            self.execute_command(&key, &command, tokens, ctx, session)?;

            if let Some(response) = ctx.take_response() {
                let protocol = ctx
                    .transmit_protocol
                    .clone()
                    .unwrap_or_else(|| self.default_transmitter.clone());
                self.registries
                    .transmitters
                    .send_response(&protocol, response.method_key(), &response, ctx, sink)
                    .await?;
            }
        }
        Ok(())
    }

    /// Finds the command for a statement.
    ///
    /// Returns the command key, the command and its argument tokens.
    fn resolve<'s>(
        &self,
        statement: &'s Statement,
    ) -> DispatchResult<(String, Arc<Command>, &'s [Token])> {
        let commands = &self.registries.commands;
        let first = statement
            .word(0)
            .ok_or_else(|| DispatchError::syntax("statement must start with a command name"))?;

        if let Some(second) = statement.word(1) {
            let key = format!("{first}.{second}");
            if let Some(command) = commands.find(&key) {
                return Ok((key, command, statement.tokens.get(2..).unwrap_or_default()));
            }
        }

        if let Some(command) = commands.find(first) {
            return Ok((
                first.to_string(),
                command,
                statement.tokens.get(1..).unwrap_or_default(),
            ));
        }

        // Report "show.frob" rather than "show" when "show" is a command group.
        let group = format!("{first}.");
        let name = match statement.word(1) {
            Some(second) if commands.names().iter().any(|n| n.starts_with(&group)) => {
                format!("{first}.{second}")
            }
            _ => first.to_string(),
        };
        Err(DispatchError::UnknownCommand(name))
    }

    fn execute_command(
        &self,
        key: &str,
        command: &Command,
        tokens: &[Token],
        ctx: &mut RequestContext,
        session: &mut Session,
    ) -> DispatchResult<()> {
        let mut args = Args::new(key, tokens);
        match command {
            Command::Terminal => {
                args.finish()?;
                ctx.set_response(terminal_response(key));
                self.registries.handlers.execute_all(key, ctx)
            }
            Command::Parsed(handler) => {
                let mut env = CommandEnv {
                    session,
                    registries: &self.registries,
                    status: &self.status,
                    default_transmitter: &self.default_transmitter,
                };
                handler.execute(&mut args, ctx, &mut env)
            }
        }
    }

    async fn report_error(
        &self,
        error: &DispatchError,
        protocol: Option<&str>,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), PptError> {
        if error.is_internal() {
            error!(error = %error, request = %ctx.log_line, "Internal error while handling request");
        } else {
            warn!(error = %error, request = %ctx.log_line, "Request failed");
        }

        sink.write_extensions(&[Extension::error_status()]).await?;

        let response = ResponseObject::Error(ErrorResponse::from_dispatch(
            error,
            self.annotation_url.as_deref(),
        ));
        let transmitters = &self.registries.transmitters;
        let protocol = protocol
            .filter(|p| transmitters.contains(p))
            .unwrap_or(self.default_transmitter.as_str());

        match transmitters
            .send_response(protocol, "error", &response, ctx, sink)
            .await
        {
            Ok(()) => Ok(()),
            Err(RequestError::Transport(e)) => Err(e),
            Err(RequestError::Dispatch(e)) => {
                error!(error = %e, "Failed to render error response, sending plain text");
                let plain = format!("{} error: {}\n", error.kind(), error);
                sink.write_data(plain.as_bytes()).await
            }
        }
    }
}

/// Response a terminal command starts from before handlers fill it in.
fn terminal_response(key: &str) -> ResponseObject {
    if key == "show.version" {
        let mut version = VersionResponse::default();
        version.add_module(SERVER_NAME, SERVER_VERSION);
        ResponseObject::Version(version)
    } else {
        let title = key.strip_prefix("show.").unwrap_or(key);
        ResponseObject::Info(InfoResponse::new(title))
    }
}
