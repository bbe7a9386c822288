//! # Ferriconf
//!
//! Async configuration library for Cisco-style network device CLIs.
//!
//! Ferriconf drives a device's interactive CLI over Telnet or SSH, tracks
//! its mode from the prompt it prints, and renders a declarative tree of
//! configuration nodes (interfaces, VRFs, BGP, OSPF, LDP) into CLI
//! commands.
//!
//! ## Features
//!
//! - Telnet and SSH (russh) transports behind one `Transport` trait
//! - Prompt-driven mode tracking with convergent mode transitions
//! - Echo stripping, pager handling and in-band error detection
//! - Config nodes that push changes immediately once attached
//! - Audit trail of every command and response
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferriconf::{SessionBuilder, TelnetConfig};
//! use ferriconf::config::{Interface, InterfaceSetting};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferriconf::Error> {
//!     let mut session = SessionBuilder::new()
//!         .enable_password("secret")
//!         .telnet(TelnetConfig::new("192.0.2.10"));
//!     session.start().await?;
//!
//!     let mut lo = Interface::new("Loopback0")
//!         .with(InterfaceSetting::Ipv4(Some("10.255.0.1/32".parse()?)));
//!     lo.create(&mut session).await?;
//!
//!     let response = session.write_with_response("show ip interface brief").await?;
//!     println!("{}", response.result);
//!
//!     session.end().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use config::ConfigNode;
pub use error::{Error, Result};
pub use platform::PlatformDefinition;
pub use session::{Mode, Response, Session, SessionBuilder, SessionId, SessionOptions};
pub use transport::{AuthMethod, SshConfig, SshShellTransport, TelnetConfig, TelnetTransport, Transport};
