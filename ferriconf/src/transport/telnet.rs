//! Telnet transport: a TCP stream with minimal option negotiation.
//!
//! The device is driven as a dumb terminal, so every option the server
//! proposes is refused (`DO x` → `WONT x`, `WILL x` → `DONT x`) and
//! subnegotiations are skipped.

use std::time::Duration;

use log::{debug, trace};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::Transport;
use super::config::TelnetConfig;
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Any duplex byte stream the Telnet codec can run over.
trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// Telnet client transport.
pub struct TelnetTransport {
    /// Where to connect (None for transports built from an existing stream).
    config: Option<TelnetConfig>,

    /// The underlying stream (None until opened).
    stream: Option<Box<dyn Stream>>,

    /// Option-negotiation parser state, kept across reads.
    decoder: TelnetDecoder,

    /// Set on EOF or after `close()`.
    closed: bool,
}

impl TelnetTransport {
    /// Create an unconnected transport.
    pub fn new(config: TelnetConfig) -> Self {
        Self {
            config: Some(config),
            stream: None,
            decoder: TelnetDecoder::default(),
            closed: false,
        }
    }

    /// Run the Telnet codec over an already-connected stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            config: None,
            stream: Some(Box::new(stream)),
            decoder: TelnetDecoder::default(),
            closed: false,
        }
    }
}

impl Transport for TelnetTransport {
    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let config = self.config.as_ref().ok_or(TransportError::NotOpen)?;

        debug!("Connecting to {} over Telnet", config.socket_addr());
        let stream = timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;

        self.stream = Some(Box::new(stream));
        self.decoder = TelnetDecoder::default();
        self.closed = false;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        trace!("Telnet send {} bytes", data.len());
        stream
            .write_all(&escape_iac(data))
            .await
            .map_err(TransportError::Io)?;
        stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let mut chunk = [0u8; 4096];
        let n = match timeout(wait, stream.read(&mut chunk)).await {
            Err(_) => return Ok(Vec::new()),
            Ok(read) => read.map_err(TransportError::Io)?,
        };
        if n == 0 {
            self.closed = true;
            return Err(TransportError::Disconnected.into());
        }

        let mut data = Vec::with_capacity(n);
        let mut replies = Vec::new();
        self.decoder.decode(&chunk[..n], &mut data, &mut replies);

        if !replies.is_empty() {
            trace!("Telnet refusing {} option bytes", replies.len());
            stream.write_all(&replies).await.map_err(TransportError::Io)?;
            stream.flush().await.map_err(TransportError::Io)?;
        }

        trace!("Telnet recv {} bytes ({} data)", n, data.len());
        Ok(data)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(TransportError::Io)?;
        }
        Ok(())
    }
}

/// Double every literal 0xFF so the peer does not read it as IAC.
fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some(pos) = memchr(IAC, rest) {
        out.extend_from_slice(&rest[..=pos]);
        out.push(IAC);
        rest = &rest[pos + 1..];
    }
    out.extend_from_slice(rest);
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental Telnet command parser.
#[derive(Debug, Default)]
struct TelnetDecoder {
    state: State,
}

impl TelnetDecoder {
    /// Split `input` into user data and the refusals to send back.
    fn decode(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        let mut rest = input;
        while !rest.is_empty() {
            if self.state == State::Data {
                match memchr(IAC, rest) {
                    Some(pos) => {
                        data.extend_from_slice(&rest[..pos]);
                        self.state = State::Iac;
                        rest = &rest[pos + 1..];
                    }
                    None => {
                        data.extend_from_slice(rest);
                        return;
                    }
                }
                continue;
            }

            let byte = rest[0];
            rest = &rest[1..];
            self.state = match (self.state, byte) {
                (State::Iac, IAC) => {
                    data.push(IAC);
                    State::Data
                }
                (State::Iac, DO | DONT | WILL | WONT) => State::Negotiate(byte),
                (State::Iac, SB) => State::Subnegotiation,
                (State::Iac, _) => State::Data,

                (State::Negotiate(DO), option) => {
                    replies.extend_from_slice(&[IAC, WONT, option]);
                    State::Data
                }
                (State::Negotiate(WILL), option) => {
                    replies.extend_from_slice(&[IAC, DONT, option]);
                    State::Data
                }
                (State::Negotiate(_), _) => State::Data,

                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,

                (State::Data, _) => State::Data,
            };
        }
    }
}
