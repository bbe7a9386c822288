//! The session engine.

use std::time::Duration;

use log::{debug, error, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::audit::{AuditSink, MASK};
use super::mode::{Mode, ModeStep};
use super::options::SessionOptions;
use super::response::Response;
use super::SessionId;
use crate::channel::{ResponseBuffer, ends_with_terminator, error_line, parse_response};
use crate::error::{Error, Result, SessionError};
use crate::platform::PlatformDefinition;
use crate::transport::Transport;

/// What ends a command/response exchange.
#[derive(Debug, Clone, Copy)]
enum Expect<'a> {
    /// The session's own prompt in any mode.
    Prompt,
    /// A literal terminator such as `(config)#`.
    Literal(&'a str),
    /// Either a literal (e.g. a password prompt) or the session's prompt.
    PromptOr(&'a str),
}

/// What is written to the device.
#[derive(Debug, Clone, Copy)]
enum Outgoing<'a> {
    /// A command line, echoed back by the device.
    Line(&'a str),
    /// A hidden line (password), never echoed and masked in the audit trail.
    Secret(&'a str),
    /// A raw control sequence, sent without a line terminator.
    Control(&'a [u8]),
}

impl Outgoing<'_> {
    fn label(&self) -> String {
        match self {
            Outgoing::Line(line) => line.to_string(),
            Outgoing::Secret(_) => MASK.to_string(),
            Outgoing::Control(bytes) => bytes.escape_ascii().to_string(),
        }
    }
}

/// An interactive CLI session with one device.
///
/// All interaction is serialized through `&mut self`; the session owns its
/// transport exclusively and [`end`](Self::end) consumes it.
pub struct Session<T: Transport> {
    id: SessionId,
    transport: T,
    platform: PlatformDefinition,
    options: SessionOptions,
    enable_password: Option<SecretString>,
    audit: Box<dyn AuditSink>,
    buffer: ResponseBuffer,
    mode: Mode,
    name: String,
    last_response: String,
    started: bool,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(
        transport: T,
        platform: PlatformDefinition,
        options: SessionOptions,
        enable_password: Option<SecretString>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        Self {
            id: SessionId::next(),
            transport,
            platform,
            options,
            enable_password,
            audit,
            buffer: ResponseBuffer::default(),
            mode: Mode::None,
            name: String::new(),
            last_response: String::new(),
            started: false,
        }
    }

    /// Identity used by config nodes to refer back to this session.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Mode of the last recognized prompt.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Device name learned from its prompt (empty until the first prompt).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw output of the last completed exchange.
    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Open the transport, wait for the first prompt and run the platform's
    /// on-open commands.
    ///
    /// With `suppress_connection_errors`, a connectivity failure is logged
    /// and the session is left in [`Mode::None`].
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SessionError::AlreadyStarted.into());
        }

        match self.open_and_sync().await {
            Err(err) if err.is_connectivity() && self.options.suppress_connection_errors => {
                error!("{}: failed to start: {}", self.id, err);
                self.mode = Mode::None;
                Ok(())
            }
            other => other,
        }
    }

    async fn open_and_sync(&mut self) -> Result<()> {
        debug!("{}: opening transport ({})", self.id, self.platform.name);
        self.transport.open().await?;
        self.started = true;

        self.wait_prompt().await?;

        for command in self.platform.on_open_commands.clone() {
            self.write_with_response(&command).await?;
        }
        Ok(())
    }

    /// Nudge the device with a bare newline until it prints a recognizable
    /// prompt, then record its mode and name.
    ///
    /// Each attempt drains stale input first and waits a little longer than
    /// the previous one.
    pub async fn wait_prompt(&mut self) -> Result<Mode> {
        self.ensure_started()?;

        let attempts = self.options.retry_count;
        for attempt in 1..=attempts {
            self.drain().await?;

            self.audit.command(self.id, "");
            let newline = self.platform.newline.clone();
            self.transport.send(newline.as_bytes()).await?;

            let output = self.read_available(self.options.poll_interval * attempt).await?;

            let (mode, name) = parse_response(&output);
            if mode != Mode::None && !name.is_empty() {
                if name != self.name {
                    debug!("{}: device name is '{}'", self.id, name);
                }
                self.mode = mode;
                self.name = name;
                self.last_response = output;
                debug!("{}: prompt recognized, mode {}", self.id, self.mode);
                return Ok(mode);
            }
            debug!("{}: no prompt on attempt {}/{}", self.id, attempt, attempts);
        }

        self.mode = Mode::None;
        Err(SessionError::PromptNotFound { attempts }.into())
    }

    /// Send a command and wait for the session's prompt.
    ///
    /// A line starting with the platform's error sigil fails with
    /// [`SessionError::Device`] unless syntax errors are suppressed.
    pub async fn write_with_response(&mut self, command: &str) -> Result<Response> {
        let result = self.command(command, Expect::Prompt, false).await;
        self.suppress_connectivity(command, result)
    }

    /// Send a command and wait for a literal terminator instead of the prompt.
    pub async fn write_until(&mut self, command: &str, terminator: &str) -> Result<Response> {
        let result = self.command(command, Expect::Literal(terminator), false).await;
        self.suppress_connectivity(command, result)
    }

    /// Send a command that may legitimately be rejected by the device.
    ///
    /// A device error marker is reported through
    /// [`Response::failure_message`] instead of an error.
    pub async fn write_allow_failure(&mut self, command: &str) -> Result<Response> {
        let result = self.command(command, Expect::Prompt, true).await;
        self.suppress_connectivity(command, result)
    }

    /// Converge to User mode.
    pub async fn to_user(&mut self) -> Result<()> {
        self.converge(Mode::User).await
    }

    /// Converge to Exec mode.
    pub async fn to_exec(&mut self) -> Result<()> {
        self.converge(Mode::Exec).await
    }

    /// Converge to global configuration mode.
    pub async fn to_config(&mut self) -> Result<()> {
        self.converge(Mode::Config).await
    }

    /// Close the transport, ending the session.
    pub async fn end(mut self) -> Result<()> {
        debug!("{}: closing", self.id);
        self.transport.close().await
    }

    async fn command(&mut self, command: &str, expect: Expect<'_>, allow_failure: bool) -> Result<Response> {
        let start = Instant::now();
        let raw = self.exchange(Outgoing::Line(command), expect).await?;
        self.observe(&raw);
        let elapsed = start.elapsed();

        if let Some(line) = error_line(&raw, &self.platform.error_sigil) {
            if allow_failure || self.options.suppress_syntax_errors {
                debug!("{}: '{}' rejected: {}", self.id, command, line);
                let message = line.trim().to_string();
                return Ok(Response::failed(command, raw, self.mode, elapsed, message));
            }
            return Err(SessionError::Device {
                command: command.to_string(),
                response: raw,
            }
            .into());
        }

        Ok(Response::new(command, raw, self.mode, elapsed))
    }

    fn suppress_connectivity(&mut self, command: &str, result: Result<Response>) -> Result<Response> {
        match result {
            Err(err) if err.is_connectivity() && self.options.suppress_connection_errors => {
                error!("{}: '{}' failed: {}", self.id, command, err);
                self.mode = Mode::None;
                Ok(Response::failed(command, "", Mode::None, Duration::ZERO, err.to_string()))
            }
            other => other,
        }
    }

    /// One write followed by reads until `expect` is met.
    ///
    /// Strips the command echo from the first chunk, answers pager markers
    /// and enforces `command_timeout` over the whole exchange.
    async fn exchange(&mut self, outgoing: Outgoing<'_>, expect: Expect<'_>) -> Result<String> {
        self.ensure_started()?;
        self.buffer.clear();

        let mut payload = match outgoing {
            Outgoing::Line(text) | Outgoing::Secret(text) => text.as_bytes().to_vec(),
            Outgoing::Control(bytes) => bytes.to_vec(),
        };
        if !matches!(outgoing, Outgoing::Control(_)) {
            payload.extend_from_slice(self.platform.newline.as_bytes());
        }

        let label = outgoing.label();
        self.audit.command(self.id, &label);
        trace!("{} >>> {:?}", self.id, label);
        self.transport.send(&payload).await?;

        let mut echo = match outgoing {
            Outgoing::Line(text) if !text.is_empty() => Some(text),
            _ => None,
        };
        let timeout = self.options.command_timeout;
        let deadline = Instant::now() + timeout;
        let mut transcript = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.buffer.clear();
                self.audit.response(self.id, &String::from_utf8_lossy(&transcript));
                self.mode = Mode::None;
                return Err(SessionError::CommandTimeout {
                    command: label,
                    timeout,
                }
                .into());
            }

            let chunk = self
                .transport
                .recv(remaining.min(self.options.poll_interval))
                .await?;
            if chunk.is_empty() {
                continue;
            }
            trace!("{} <<< {:?}", self.id, String::from_utf8_lossy(&chunk));
            transcript.extend_from_slice(&chunk);
            self.buffer.extend(&chunk);

            if let Some(text) = echo {
                // Wait for the whole echo and its line break
                let head = self.buffer.as_slice();
                if head.len() <= text.len() && text.as_bytes().starts_with(head) {
                    continue;
                }
                self.buffer.strip_echo(text);
                echo = None;
            }

            if self.buffer.truncate_tail_match(&self.platform.pager_pattern) {
                debug!("{}: pager marker, requesting next page", self.id);
                self.transport.send(&self.platform.pager_advance).await?;
                continue;
            }

            if self.is_complete(expect) {
                break;
            }
        }

        self.audit.response(self.id, &String::from_utf8_lossy(&transcript));
        let raw = self.buffer.take_string();
        self.last_response.clone_from(&raw);
        Ok(raw)
    }

    fn is_complete(&self, expect: Expect<'_>) -> bool {
        let tail = self.buffer.tail_str_lossy();
        let at_prompt = || {
            let (mode, name) = parse_response(&tail);
            mode != Mode::None && (self.name.is_empty() || name == self.name)
        };

        match expect {
            Expect::Prompt => at_prompt(),
            Expect::Literal(terminator) => ends_with_terminator(&tail, terminator),
            Expect::PromptOr(terminator) => ends_with_terminator(&tail, terminator) || at_prompt(),
        }
    }

    /// Re-derive the mode (and the name, if still unknown) from a response.
    ///
    /// An unrecognized prompt leaves the previous mode in place.
    fn observe(&mut self, raw: &str) {
        let (mode, name) = parse_response(raw);
        if mode == Mode::None {
            debug!("{}: no prompt in response, staying in {}", self.id, self.mode);
            return;
        }
        if mode != self.mode {
            debug!("{}: mode {} -> {}", self.id, self.mode, mode);
        }
        self.mode = mode;
        if self.name.is_empty() {
            self.name = name;
        }
    }

    /// Discard anything the device printed since the last exchange.
    ///
    /// Gives up after `command_timeout` on a device that never goes quiet.
    async fn drain(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.options.command_timeout;
        while Instant::now() < deadline {
            let stale = self.transport.recv(Duration::ZERO).await?;
            if stale.is_empty() {
                return Ok(());
            }
            trace!("{}: discarding {} stale bytes", self.id, stale.len());
            self.audit.response(self.id, &String::from_utf8_lossy(&stale));
        }
        warn!("{}: device still printing after {:?}", self.id, self.options.command_timeout);
        Ok(())
    }

    /// Read until the device stays quiet for one poll interval, for at most
    /// `command_timeout`.
    ///
    /// Everything read goes to the audit sink as received.
    async fn read_available(&mut self, first_wait: Duration) -> Result<String> {
        self.buffer.clear();
        let timeout = self.options.command_timeout;
        let deadline = Instant::now() + first_wait + timeout;
        let mut transcript = Vec::new();

        let mut chunk = self.transport.recv(first_wait).await?;
        while !chunk.is_empty() {
            transcript.extend_from_slice(&chunk);
            self.buffer.extend(&chunk);
            if Instant::now() >= deadline {
                self.audit.response(self.id, &String::from_utf8_lossy(&transcript));
                self.buffer.clear();
                self.mode = Mode::None;
                return Err(SessionError::CommandTimeout {
                    command: self.platform.newline.escape_debug().to_string(),
                    timeout,
                }
                .into());
            }
            chunk = self.transport.recv(self.options.poll_interval).await?;
        }

        self.audit.response(self.id, &String::from_utf8_lossy(&transcript));
        Ok(self.buffer.take_string())
    }

    async fn converge(&mut self, target: Mode) -> Result<()> {
        self.ensure_started()?;

        for attempt in 1..=self.options.retry_count {
            let step = match self.mode.step_toward(target) {
                None => return Ok(()),
                Some(ModeStep::ReachExec) => self
                    .mode
                    .step_toward(Mode::Exec)
                    .unwrap_or(ModeStep::WaitPrompt),
                Some(step) => step,
            };
            debug!(
                "{}: {} -> {} via {:?} (attempt {})",
                self.id, self.mode, target, step, attempt
            );
            self.take_step(step).await?;
        }

        if self.mode == target {
            return Ok(());
        }
        warn!("{}: stuck in {} on the way to {}", self.id, self.mode, target);
        Err(SessionError::ModeTransition {
            target,
            last: self.mode,
        }
        .into())
    }

    async fn take_step(&mut self, step: ModeStep) -> Result<()> {
        match step {
            ModeStep::WaitPrompt => {
                self.wait_prompt().await?;
            }
            ModeStep::Escalate => self.escalate().await?,
            ModeStep::Deescalate => {
                let command = self.platform.deescalate_command.clone();
                self.write_with_response(&command).await?;
            }
            ModeStep::HardExit => {
                let sequence = self.platform.hard_exit.clone();
                let raw = self
                    .exchange(Outgoing::Control(&sequence), Expect::Prompt)
                    .await;
                let raw = self.tolerate_timeout(raw)?;
                self.observe(&raw);
            }
            ModeStep::ExitLevel => {
                let command = self.platform.exit_command.clone();
                self.write_with_response(&command).await?;
            }
            ModeStep::EnterConfig => {
                let command = self.platform.config_command.clone();
                let prompt = self.platform.config_prompt.clone();
                self.write_until(&command, &prompt).await?;
            }
            ModeStep::ReachExec => {
                // Resolved to a concrete Exec step by converge()
            }
        }
        Ok(())
    }

    async fn escalate(&mut self) -> Result<()> {
        let command = self.platform.escalate_command.clone();
        let password_prompt = self.platform.escalate_password_prompt.clone();

        let raw = self
            .exchange(Outgoing::Line(&command), Expect::PromptOr(&password_prompt))
            .await;
        let raw = self.tolerate_timeout(raw)?;
        if !ends_with_terminator(&raw, &password_prompt) {
            self.observe(&raw);
            return Ok(());
        }

        let password = match &self.enable_password {
            Some(password) => password.expose_secret().to_string(),
            None => {
                warn!("{}: device asked for an enable password, none configured", self.id);
                String::new()
            }
        };
        let raw = self
            .exchange(Outgoing::Secret(&password), Expect::Prompt)
            .await;
        let raw = self.tolerate_timeout(raw)?;
        self.observe(&raw);
        Ok(())
    }

    /// Inside a convergence loop a lost answer is retried like any other
    /// failed step when connectivity errors are suppressed.
    fn tolerate_timeout(&mut self, result: Result<String>) -> Result<String> {
        match result {
            Err(err) if err.is_connectivity() && self.options.suppress_connection_errors => {
                error!("{}: mode step failed: {}", self.id, err);
                self.mode = Mode::None;
                Ok(String::new())
            }
            other => other,
        }
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started {
            Ok(())
        } else {
            Err(Error::Session(SessionError::NotStarted))
        }
    }
}
