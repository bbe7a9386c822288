//! Inventory queries: what already exists on the device.
//!
//! Each query moves the session to Exec, runs one `show` command and
//! scrapes the table with a pure parser.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;

static INTERFACE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Interface\s+IP-Address.+Protocol\s*$").expect("static interface header regex")
});

static VRF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Name\s+Default RD\s+Protocols\s+Interfaces\s*$").expect("static vrf header regex")
});

static LOCAL_AS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"local AS number\s+(\d+)").expect("static local AS regex"));

/// Interface names (lowercased) from `show ip interface brief`.
pub fn parse_interfaces(output: &str) -> Vec<String> {
    table_keys(&INTERFACE_HEADER, output)
        .map(str::to_lowercase)
        .collect()
}

/// VRF names from `show vrf`.
pub fn parse_vrfs(output: &str) -> Vec<String> {
    table_keys(&VRF_HEADER, output).map(str::to_string).collect()
}

/// Local AS from `show ip bgp summary`; `None` when BGP is not running.
pub fn parse_local_as(output: &str) -> Option<u32> {
    LOCAL_AS
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
        .filter(|asn| *asn != 0)
}

/// First column of every table row after `header`.
///
/// Single-token lines (wrapped interface lists, the trailing prompt) are
/// not rows.
fn table_keys<'a>(header: &Regex, output: &'a str) -> impl Iterator<Item = &'a str> {
    let body = header.find(output).map_or("", |m| &output[m.end()..]);
    body.lines().filter_map(|line| {
        let mut columns = line.split_whitespace();
        let key = columns.next()?;
        columns.next()?;
        Some(key)
    })
}

/// List the device's interfaces.
pub async fn list_interfaces<T: Transport>(session: &mut Session<T>) -> Result<Vec<String>> {
    session.to_exec().await?;
    let response = session.write_with_response("show ip interface brief").await?;
    Ok(parse_interfaces(&response.result))
}

/// List the device's VRFs.
pub async fn list_vrfs<T: Transport>(session: &mut Session<T>) -> Result<Vec<String>> {
    session.to_exec().await?;
    let response = session.write_with_response("show vrf").await?;
    Ok(parse_vrfs(&response.result))
}

/// The AS of the running BGP process, if any.
pub async fn local_bgp_as<T: Transport>(session: &mut Session<T>) -> Result<Option<u32>> {
    session.to_exec().await?;
    let response = session.write_allow_failure("show ip bgp summary").await?;
    if !response.is_success() {
        debug!("BGP is not active on {}", session.name());
        return Ok(None);
    }
    Ok(parse_local_as(&response.result))
}
