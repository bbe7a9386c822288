//! BGP lab example: loopback, iBGP peer, inspection and teardown.
//!
//! Connects to a Cisco IOS router over Telnet, creates a loopback and an
//! iBGP peering sourced from it, shows the BGP state and removes
//! everything again.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example bgp_lab -- --host 192.0.2.10 --enable secret --peer 10.255.0.2
//! ```

use std::env;
use std::time::Duration;

use ferriconf::config::{
    AddressFamily, Bgp, BgpAddressFamily, BgpNeighbor, BgpNeighborAddressFamily, BgpVrf, Interface,
    InterfaceSetting, local_bgp_as,
};
use ferriconf::{SessionBuilder, TelnetConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = SessionBuilder::new().command_timeout(Duration::from_secs(args.timeout));
    if let Some(password) = &args.enable {
        builder = builder.enable_password(password.as_str());
    }
    let mut session = builder.telnet(TelnetConfig::new(&args.host).port(args.port));
    session.start().await?;
    println!("Connected to {} ({} mode)", session.name(), session.mode());

    let mut loopback = Interface::new("Loopback0")
        .with(InterfaceSetting::Ipv4(Some(args.loopback.parse()?)))
        .with(InterfaceSetting::Description(Some("bgp lab".into())));
    loopback.create(&mut session).await?;

    let peer = BgpNeighbor::new(&args.peer, args.asn)
        .with_update_source(loopback.name())
        .with_family(BgpNeighborAddressFamily::new(AddressFamily::Ipv4Unicast).with_feature("next-hop-self")?);
    let family = BgpAddressFamily::new(AddressFamily::Ipv4Unicast).with_feature("redistribute connected")?;
    let mut bgp = Bgp::new(args.asn).with_vrf(BgpVrf::default_vrf().with_neighbor(peer).with_family(family));
    bgp.create(&mut session).await?;

    println!("\nLocal BGP AS: {:?}", local_bgp_as(&mut session).await?);
    println!("{}", "-".repeat(50));
    let response = session.write_with_response("show ip bgp summary").await?;
    println!("{}", response.result);
    println!("{}", "-".repeat(50));

    println!("\nRemoving lab configuration...");
    bgp.delete(&mut session).await?;
    loopback.delete(&mut session).await?;

    session.end().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    port: u16,
    enable: Option<String>,
    asn: u32,
    peer: String,
    loopback: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 23,
            enable: None,
            asn: 65000,
            peer: "10.255.0.2".to_string(),
            loopback: "10.255.0.1/32".to_string(),
            timeout: 30,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(23),
                ("--enable" | "-e", Some(v)) => parsed.enable = Some(v),
                ("--asn" | "-a", Some(v)) => parsed.asn = v.parse().unwrap_or(65000),
                ("--peer", Some(v)) => parsed.peer = v,
                ("--loopback", Some(v)) => parsed.loopback = v,
                ("--timeout" | "-t", Some(v)) => parsed.timeout = v.parse().unwrap_or(30),
                ("--help", _) => {
                    Self::print_help();
                    std::process::exit(0);
                }
                (other, _) => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"ferriconf bgp_lab example

USAGE:
    cargo run --example bgp_lab -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Router address [default: localhost]
    -p, --port <PORT>        Telnet port [default: 23]
    -e, --enable <PASS>      Enable password
    -a, --asn <AS>           Local (and peer) AS [default: 65000]
    --peer <ADDR>            iBGP peer address [default: 10.255.0.2]
    --loopback <PREFIX>      Loopback0 address [default: 10.255.0.1/32]
    -t, --timeout <SECS>     Command timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}
