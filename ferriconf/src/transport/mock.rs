//! Scripted in-memory Cisco-style router for tests.
//!
//! Tracks its own CLI mode from the commands it receives, echoes input,
//! prints mode-accurate prompts and records every command so tests can
//! assert on exactly what went over the wire.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::Transport;
use crate::error::{Result, TransportError};
use crate::session::{Session, SessionBuilder};

const INVALID_INPUT: &str = "% Invalid input detected at '^' marker.";
const MORE: &str = " --More-- ";
/// What IOS prints to wipe the pager marker before the next page.
const MORE_ERASE: &str = "\x08\x08\x08\x08\x08\x08\x08\x08\x08         \x08\x08\x08\x08\x08\x08\x08\x08\x08";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    User,
    Exec,
    Config,
}

pub(crate) struct MockRouter {
    hostname: String,
    level: Level,
    /// Configuration sub-mode stack, innermost last (`router`, `router-af`).
    submodes: Vec<&'static str>,
    enable_password: Option<String>,
    awaiting_password: bool,
    rejected: Vec<String>,
    outputs: HashMap<String, String>,
    paged: HashMap<String, Vec<String>>,
    pending_pages: VecDeque<String>,
    hang_up_on: Option<String>,
    echo_split: Option<usize>,
    stream: Option<String>,
    silent: bool,
    opened: bool,
    closed: bool,
    line: Vec<u8>,
    outbound: VecDeque<Vec<u8>>,
    commands: Vec<String>,
    sends: Vec<Vec<u8>>,
}

impl MockRouter {
    /// A router named `hostname` sitting at its Exec prompt.
    pub(crate) fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            level: Level::Exec,
            submodes: vec![],
            enable_password: None,
            awaiting_password: false,
            rejected: vec![],
            outputs: HashMap::new(),
            paged: HashMap::new(),
            pending_pages: VecDeque::new(),
            hang_up_on: None,
            echo_split: None,
            stream: None,
            silent: false,
            opened: false,
            closed: false,
            line: vec![],
            outbound: VecDeque::new(),
            commands: vec![],
            sends: vec![],
        }
    }

    pub(crate) fn in_user_mode(mut self) -> Self {
        self.level = Level::User;
        self
    }

    pub(crate) fn with_enable_password(mut self, password: &str) -> Self {
        self.enable_password = Some(password.to_string());
        self
    }

    /// Answer any command starting with `prefix` with an invalid-input marker.
    pub(crate) fn reject(mut self, prefix: &str) -> Self {
        self.rejected.push(prefix.to_string());
        self
    }

    pub(crate) fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    /// Answer `command` page by page, waiting for a space between pages.
    pub(crate) fn with_pages(mut self, command: &str, pages: &[&str]) -> Self {
        self.paged.insert(
            command.to_string(),
            pages.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    /// Never answer anything.
    pub(crate) fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Drop the connection as soon as `command` is received.
    pub(crate) fn hang_up_on(mut self, command: &str) -> Self {
        self.hang_up_on = Some(command.to_string());
        self
    }

    /// Deliver each echo in two reads, split after `at` bytes.
    pub(crate) fn split_echo(mut self, at: usize) -> Self {
        self.echo_split = Some(at);
        self
    }

    /// From now on, print `line` on every read, like a console with
    /// logging turned on.
    pub(crate) fn stream_forever(&mut self, line: &str) {
        self.stream = Some(line.to_string());
    }

    /// Every line received, in order (empty lines included, passwords masked).
    pub(crate) fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Received lines without the bare newlines of prompt waits.
    pub(crate) fn issued(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| !c.is_empty())
            .map(String::as_str)
            .collect()
    }

    /// Raw payload of every `send` call.
    pub(crate) fn sends(&self) -> &[Vec<u8>] {
        &self.sends
    }

    pub(crate) fn clear_log(&mut self) {
        self.commands.clear();
        self.sends.clear();
    }

    pub(crate) fn prompt(&self) -> String {
        match (self.level, self.submodes.last()) {
            (Level::User, _) => format!("{}>", self.hostname),
            (Level::Exec, _) => format!("{}#", self.hostname),
            (Level::Config, None) => format!("{}(config)#", self.hostname),
            (Level::Config, Some(sub)) => format!("{}(config-{})#", self.hostname, sub),
        }
    }

    fn queue(&mut self, text: impl Into<String>) {
        if !self.silent {
            self.outbound.push_back(text.into().into_bytes());
        }
    }

    fn queue_prompt(&mut self, body: &str) {
        let prompt = self.prompt();
        self.queue(format!("{}{}", body, prompt));
    }

    fn receive(&mut self, data: &[u8]) {
        for &byte in data {
            match byte {
                0x1a => {
                    if self.level == Level::Config {
                        self.level = Level::Exec;
                        self.submodes.clear();
                    }
                    self.queue_prompt("^Z\r\n");
                }
                b' ' if self.line.is_empty() && !self.pending_pages.is_empty() => {
                    self.queue(MORE_ERASE);
                    self.next_page();
                }
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.line)
                        .trim_end_matches('\r')
                        .to_string();
                    self.line.clear();
                    self.handle_line(line);
                }
                _ => self.line.push(byte),
            }
        }
    }

    fn next_page(&mut self) {
        if let Some(page) = self.pending_pages.pop_front() {
            if self.pending_pages.is_empty() {
                self.queue_prompt(&format!("{}\r\n", page));
            } else {
                self.queue(format!("{}\r\n{}", page, MORE));
            }
        }
    }

    fn handle_line(&mut self, line: String) {
        if self.awaiting_password {
            self.awaiting_password = false;
            self.commands.push("<password>".to_string());
            if self.enable_password.as_deref() == Some(line.as_str()) {
                self.level = Level::Exec;
                self.queue_prompt("\r\n");
            } else {
                self.queue_prompt("\r\n% Access denied\r\n\r\n");
            }
            return;
        }

        self.commands.push(line.clone());
        if self.hang_up_on.as_deref() == Some(line.as_str()) {
            self.closed = true;
            return;
        }
        let echo = format!("{}\r\n", line);
        match self.echo_split {
            Some(at) if at < line.len() => {
                let (head, tail) = echo.split_at(at);
                self.queue(head);
                self.queue(tail);
            }
            _ => self.queue(echo),
        }

        let command = line.trim();
        if self.rejected.iter().any(|prefix| command.starts_with(prefix.as_str())) {
            self.queue_prompt(&format!("        ^\r\n{}\r\n\r\n", INVALID_INPUT));
            return;
        }
        if let Some(pages) = self.paged.get(command).cloned() {
            self.pending_pages = pages.into();
            self.next_page();
            return;
        }
        if let Some(output) = self.outputs.get(command).cloned() {
            self.queue_prompt(&format!("{}\r\n", output));
            return;
        }

        match self.level {
            Level::User | Level::Exec => self.exec_command(command),
            Level::Config => self.config_command(command),
        }
    }

    fn exec_command(&mut self, command: &str) {
        let word = command.split_whitespace().next().unwrap_or_default();
        match (self.level, word) {
            (_, "") => self.queue_prompt(""),
            (Level::User, "enable" | "ena") => match self.enable_password {
                Some(_) => {
                    self.awaiting_password = true;
                    self.queue("Password: ");
                }
                None => {
                    self.level = Level::Exec;
                    self.queue_prompt("");
                }
            },
            (Level::Exec, "enable" | "ena") => self.queue_prompt(""),
            (Level::Exec, "disable") => {
                self.level = Level::User;
                self.queue_prompt("");
            }
            (Level::Exec, "config" | "configure") if command.contains(" term") => {
                self.level = Level::Config;
                self.submodes.clear();
                self.queue_prompt(
                    "Enter configuration commands, one per line.  End with CNTL/Z.\r\n",
                );
            }
            (_, "show" | "terminal" | "ping") => self.queue_prompt(""),
            _ => self.queue_prompt(&format!("        ^\r\n{}\r\n\r\n", INVALID_INPUT)),
        }
    }

    fn config_command(&mut self, command: &str) {
        let mut words = command.split_whitespace();
        match (words.next().unwrap_or_default(), words.next().unwrap_or_default()) {
            ("router", _) => self.submodes = vec!["router"],
            ("address-family", _) => self.submodes = vec!["router", "router-af"],
            ("exit-address-family", _) => self.submodes = vec!["router"],
            ("interface", _) => self.submodes = vec!["if"],
            ("ip", "vrf") if self.submodes.is_empty() => self.submodes = vec!["vrf"],
            ("exit", _) => {
                if self.submodes.pop().is_none() {
                    self.level = Level::Exec;
                }
            }
            ("end", _) => {
                self.level = Level::Exec;
                self.submodes.clear();
            }
            _ => {}
        }
        self.queue_prompt("");
    }
}

impl Transport for MockRouter {
    async fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.opened = true;
            self.queue_prompt("\r\n");
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }
        if !self.opened {
            return Err(TransportError::NotOpen.into());
        }
        self.sends.push(data.to_vec());
        self.receive(data);
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Vec<u8>> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }
        match self.outbound.pop_front() {
            Some(chunk) => Ok(chunk),
            None if self.stream.is_some() => {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(self.stream.clone().unwrap_or_default().into_bytes())
            }
            None => {
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A started session over `router` with short timings and an empty log.
pub(crate) async fn started(router: MockRouter) -> Session<MockRouter> {
    let mut session = SessionBuilder::new()
        .poll_interval(Duration::from_millis(5))
        .command_timeout(Duration::from_millis(500))
        .build(router);
    session.start().await.expect("mock session starts");
    session.transport_mut().clear_log();
    session
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exchange(router: &mut MockRouter, line: &str) -> String {
        router.send(format!("{}\n", line).as_bytes()).await.unwrap();
        let mut out = String::new();
        while let Some(chunk) = router.outbound.pop_front() {
            out.push_str(&String::from_utf8_lossy(&chunk));
        }
        out
    }

    #[tokio::test]
    async fn test_mode_tracking() {
        let mut router = MockRouter::new("R1");
        router.open().await.unwrap();
        router.outbound.clear();

        assert!(exchange(&mut router, "config term").await.ends_with("R1(config)#"));
        assert!(exchange(&mut router, "router bgp 65000").await.ends_with("R1(config-router)#"));
        assert!(
            exchange(&mut router, "address-family ipv4 unicast")
                .await
                .ends_with("R1(config-router-af)#")
        );
        assert!(exchange(&mut router, "exit-address-family").await.ends_with("R1(config-router)#"));
        assert!(exchange(&mut router, "exit").await.ends_with("R1(config)#"));
        router.send(&[0x1a]).await.unwrap();
        assert_eq!(router.prompt(), "R1#");
    }

    #[tokio::test]
    async fn test_enable_password() {
        let mut router = MockRouter::new("R1").in_user_mode().with_enable_password("pw");
        router.open().await.unwrap();

        assert!(exchange(&mut router, "enable").await.ends_with("Password: "));
        assert!(exchange(&mut router, "pw").await.ends_with("R1#"));
        assert_eq!(router.commands(), &["enable", "<password>"]);
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let mut router = MockRouter::new("R1").reject("show bogus");
        router.open().await.unwrap();
        let out = exchange(&mut router, "show bogus").await;
        assert!(out.contains(INVALID_INPUT));
        assert!(out.ends_with("R1#"));
    }
}
