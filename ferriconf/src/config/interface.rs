//! Interfaces: physical ports, sub-interfaces and loopbacks.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock;

use log::info;
use regex::Regex;

use super::inventory::list_interfaces;
use super::{
    ConfigNode, NodeKind, NodeRef, Scope, attached_scope, check_session, exit_level, normalize_name,
    top_level_scope, write_all,
};
use crate::error::{ConfigError, Error, Result};
use crate::session::Session;
use crate::transport::Transport;

static SUBINTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z-]+[0-9/]+\.\d+$").expect("static subinterface regex"));

static LOOPBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^loopback\d+$").expect("static loopback regex"));

/// An IPv4 address with its prefix length (`10.0.0.1/24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Prefix {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Prefix {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(ConfigError::InvalidValue {
                field: "ipv4 prefix length",
                value: prefix_len.to_string(),
            }
            .into());
        }
        Ok(Self { address, prefix_len })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Dotted-quad netmask (`/24` is `255.255.255.0`).
    pub fn mask(&self) -> Ipv4Addr {
        let bits = u32::MAX
            .checked_shl(32 - u32::from(self.prefix_len))
            .unwrap_or(0);
        Ipv4Addr::from(bits)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || -> Error {
            ConfigError::InvalidValue {
                field: "ipv4 prefix",
                value: s.to_string(),
            }
            .into()
        };
        let (address, prefix_len) = s.trim().split_once('/').ok_or_else(invalid)?;
        let address = address.parse().map_err(|_| invalid())?;
        let prefix_len = prefix_len.parse().map_err(|_| invalid())?;
        Self::new(address, prefix_len)
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// One interface property. `None` (or `false`) removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSetting {
    Vrf(Option<String>),
    Ipv4(Option<Ipv4Prefix>),
    Ipv6(Option<String>),
    Description(Option<String>),
    Mpls(bool),
    VlanId(Option<u16>),
}

/// A device interface.
///
/// Settings given before the interface is created are replayed by
/// [`create`](Interface::create); once attached, [`modify`](Interface::modify)
/// pushes them immediately.
#[derive(Debug, Clone)]
pub struct Interface {
    name: String,
    vrf: Option<String>,
    ipv4: Option<Ipv4Prefix>,
    ipv6: Option<String>,
    description: Option<String>,
    mpls: Option<bool>,
    vlan_id: Option<u16>,
    attachment: Option<Scope>,
}

impl Interface {
    /// The interface named `name` (case-insensitive, e.g. `Loopback0`).
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name).to_lowercase(),
            vrf: None,
            ipv4: None,
            ipv6: None,
            description: None,
            mpls: None,
            vlan_id: None,
            attachment: None,
        }
    }

    /// Record a setting without touching any device.
    pub fn with(mut self, setting: InterfaceSetting) -> Self {
        self.record(setting);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vrf(&self) -> Option<&str> {
        self.vrf.as_deref()
    }

    pub fn ipv4(&self) -> Option<Ipv4Prefix> {
        self.ipv4
    }

    pub fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.ipv4.map(|prefix| prefix.address())
    }

    pub fn ipv4_mask(&self) -> Option<Ipv4Addr> {
        self.ipv4.map(|prefix| prefix.mask())
    }

    pub fn ipv6(&self) -> Option<&str> {
        self.ipv6.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `GigabitEthernet0/1.100`
    pub fn is_subinterface(&self) -> bool {
        SUBINTERFACE.is_match(&self.name)
    }

    pub fn is_loopback(&self) -> bool {
        LOOPBACK.is_match(&self.name)
    }

    fn is_physical(&self) -> bool {
        !self.is_subinterface() && !self.is_loopback()
    }

    /// Attach to the interface if the device already has it.
    pub async fn attach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<bool> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let present = list_interfaces(session).await?.contains(&self.name);
        if present {
            self.attachment = Some(Scope::root(session.id()));
        }
        Ok(present)
    }

    /// Create the interface with every recorded setting.
    ///
    /// Physical ports cannot be created, so they are reset to defaults
    /// first.
    pub async fn create<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        if self.is_physical() {
            session
                .write_with_response(&format!("default interface {}", self.name))
                .await?;
        }
        self.apply(session, &scope).await?;
        session.to_config().await?;
        info!("{} created on {}", self.node_ref(), session.name());
        Ok(())
    }

    /// Change settings. Pushed to the device when attached, recorded
    /// otherwise.
    pub async fn modify<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        settings: impl IntoIterator<Item = InterfaceSetting>,
    ) -> Result<()> {
        let settings: Vec<InterfaceSetting> = settings.into_iter().collect();
        if self.attachment.is_none() {
            settings.into_iter().for_each(|setting| self.record(setting));
            return Ok(());
        }

        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        session.write_with_response(&self.context_command()).await?;
        for setting in settings {
            write_all(session, &self.setting_commands(&setting)).await?;
            self.record(setting);
        }
        session.to_config().await
    }

    /// `no shutdown`
    pub async fn up<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        self.set_shutdown(session, false).await
    }

    /// `shutdown`
    pub async fn down<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        self.set_shutdown(session, true).await
    }

    /// Remove a logical interface, or reset a physical one to defaults.
    pub async fn delete<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = Some(scope);
        self.detach(session).await?;
        session.to_config().await?;
        info!("{} deleted on {}", self.node_ref(), session.name());
        Ok(())
    }

    async fn set_shutdown<T: Transport>(&mut self, session: &mut Session<T>, shutdown: bool) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        session.write_with_response(&self.context_command()).await?;
        let command = if shutdown { "shutdown" } else { "no shutdown" };
        session.write_with_response(command).await?;
        session.to_config().await
    }

    fn context_command(&self) -> String {
        format!("interface {}", self.name)
    }

    fn removal_command(&self) -> String {
        if self.is_physical() {
            format!("default interface {}", self.name)
        } else {
            format!("no interface {}", self.name)
        }
    }

    fn record(&mut self, setting: InterfaceSetting) {
        match setting {
            InterfaceSetting::Vrf(vrf) => self.vrf = vrf.map(|name| normalize_name(&name)),
            InterfaceSetting::Ipv4(prefix) => self.ipv4 = prefix,
            InterfaceSetting::Ipv6(address) => self.ipv6 = address,
            InterfaceSetting::Description(text) => self.description = text,
            InterfaceSetting::Mpls(enabled) => self.mpls = Some(enabled),
            InterfaceSetting::VlanId(id) => self.vlan_id = id,
        }
    }

    /// Commands that change one setting from the current state.
    fn setting_commands(&self, setting: &InterfaceSetting) -> Vec<String> {
        match setting {
            // Changing the forwarding VRF wipes the addresses; restore them.
            InterfaceSetting::Vrf(vrf) => {
                let mut commands = vec!["no ip address".to_string(), "no ipv6 address".to_string()];
                commands.push(vrf_command(vrf.as_deref()));
                commands.extend(self.address_commands());
                commands
            }
            InterfaceSetting::Ipv4(Some(prefix)) => vec![ipv4_command(prefix)],
            InterfaceSetting::Ipv4(None) => vec!["no ip address".to_string()],
            InterfaceSetting::Ipv6(Some(address)) => ipv6_commands(address),
            InterfaceSetting::Ipv6(None) => {
                vec!["no ipv6 address".to_string(), "no ipv6 enable".to_string()]
            }
            InterfaceSetting::Description(Some(text)) => vec![format!("description \"{}\"", text)],
            InterfaceSetting::Description(None) => vec!["no description".to_string()],
            InterfaceSetting::Mpls(_) | InterfaceSetting::VlanId(_) if self.is_loopback() => vec![],
            InterfaceSetting::Mpls(true) => vec!["mpls ip".to_string()],
            InterfaceSetting::Mpls(false) => vec!["no mpls ip".to_string()],
            InterfaceSetting::VlanId(Some(id)) => vec![format!("vlan-id dot1q {}", id)],
            InterfaceSetting::VlanId(None) => vec!["no vlan-id dot1q".to_string()],
        }
    }

    fn address_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self.ipv4.iter().map(ipv4_command).collect();
        if let Some(address) = &self.ipv6 {
            commands.extend(ipv6_commands(address));
        }
        commands
    }

    /// Commands that recreate every recorded setting on a fresh interface.
    fn replay_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self.vrf.iter().map(|vrf| vrf_command(Some(vrf))).collect();
        commands.extend(self.address_commands());
        if let Some(text) = &self.description {
            commands.extend(self.setting_commands(&InterfaceSetting::Description(Some(text.clone()))));
        }
        if let Some(enabled) = self.mpls {
            commands.extend(self.setting_commands(&InterfaceSetting::Mpls(enabled)));
        }
        if let Some(id) = self.vlan_id {
            commands.extend(self.setting_commands(&InterfaceSetting::VlanId(Some(id))));
        }
        commands
    }
}

fn vrf_command(vrf: Option<&str>) -> String {
    match vrf {
        Some(name) => format!("ip vrf forwarding {}", name),
        None => "no ip vrf forwarding".to_string(),
    }
}

fn ipv4_command(prefix: &Ipv4Prefix) -> String {
    format!("ip address {} {}", prefix.address(), prefix.mask())
}

fn ipv6_commands(address: &str) -> Vec<String> {
    vec!["ipv6 enable".to_string(), format!("ipv6 address {}", address)]
}

impl ConfigNode for Interface {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::Interface, self.name.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        session.write_with_response(&self.context_command()).await?;
        write_all(session, &self.replay_commands()).await?;
        exit_level(session).await?;
        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        session.write_with_response(&self.removal_command()).await?;
        self.attachment = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::inventory::tests::IP_INTERFACE_BRIEF;
    use crate::transport::mock::{MockRouter, started};

    fn prefix(s: &str) -> Ipv4Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_prefix() {
        let p = prefix("10.1.2.3/24");
        assert_eq!(p.address(), Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(p.mask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(p.to_string(), "10.1.2.3/24");
        assert_eq!(prefix("0.0.0.0/0").mask(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(prefix("10.0.0.1/32").mask(), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(prefix("10.0.0.1/17").mask(), Ipv4Addr::new(255, 255, 128, 0));

        assert!("10.0.0.1/33".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0.1".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0/8".parse::<Ipv4Prefix>().is_err());
    }

    #[test]
    fn test_name_classification() {
        let lo = Interface::new(" Loopback0 ");
        assert_eq!(lo.name(), "loopback0");
        assert!(lo.is_loopback());
        assert!(!lo.is_subinterface());

        assert!(Interface::new("GigabitEthernet0/1.100").is_subinterface());

        let phy = Interface::new("GigabitEthernet0/1");
        assert!(!phy.is_loopback());
        assert!(!phy.is_subinterface());
    }

    #[tokio::test]
    async fn test_create_physical_resets_then_replays() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut interface = Interface::new("GigabitEthernet0/1")
            .with(InterfaceSetting::Ipv4(Some(prefix("10.0.0.1/24"))))
            .with(InterfaceSetting::Description(Some("uplink".into())))
            .with(InterfaceSetting::Mpls(true));

        interface.create(&mut session).await.unwrap();

        assert!(interface.is_attached());
        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "default interface gigabitethernet0/1",
                "interface gigabitethernet0/1",
                "ip address 10.0.0.1 255.255.255.0",
                "description \"uplink\"",
                "mpls ip",
                "exit",
            ]
        );
        assert_eq!(session.mode(), crate::session::Mode::Config);
    }

    #[tokio::test]
    async fn test_create_loopback_skips_mpls() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut lo = Interface::new("Loopback0")
            .with(InterfaceSetting::Ipv4(Some(prefix("10.255.0.1/32"))))
            .with(InterfaceSetting::Mpls(true));

        lo.create(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "interface loopback0",
                "ip address 10.255.0.1 255.255.255.255",
                "exit"
            ]
        );
    }

    #[tokio::test]
    async fn test_vrf_change_restores_addresses() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut lo = Interface::new("Loopback0").with(InterfaceSetting::Ipv4(Some(prefix("10.255.0.1/32"))));
        lo.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        lo.modify(&mut session, [InterfaceSetting::Vrf(Some("RED".into()))])
            .await
            .unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "interface loopback0",
                "no ip address",
                "no ipv6 address",
                "ip vrf forwarding RED",
                "ip address 10.255.0.1 255.255.255.255",
                "exit",
            ]
        );
        assert_eq!(lo.vrf(), Some("RED"));
    }

    #[tokio::test]
    async fn test_modify_unattached_only_records() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut lo = Interface::new("Loopback1");

        lo.modify(&mut session, [InterfaceSetting::Ipv6(Some("2001:db8::1/128".into()))])
            .await
            .unwrap();

        assert!(session.transport().sends().is_empty());
        assert_eq!(lo.ipv6(), Some("2001:db8::1/128"));
    }

    #[tokio::test]
    async fn test_up_requires_attachment() {
        let mut session = started(MockRouter::new("R1")).await;
        let err = Interface::new("Loopback0").up(&mut session).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotAttached { .. })));
        assert!(session.transport().sends().is_empty());
    }

    #[tokio::test]
    async fn test_delete_logical_and_physical() {
        let mut session = started(MockRouter::new("R1")).await;

        let mut lo = Interface::new("Loopback0");
        lo.delete(&mut session).await.unwrap();
        let mut phy = Interface::new("GigabitEthernet2");
        phy.delete(&mut session).await.unwrap();

        assert!(!lo.is_attached());
        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "no interface loopback0",
                "default interface gigabitethernet2"
            ]
        );
    }

    #[tokio::test]
    async fn test_attach_existing_then_shutdown() {
        let router = MockRouter::new("R1").with_output("show ip interface brief", IP_INTERFACE_BRIEF);
        let mut session = started(router).await;

        assert!(!Interface::new("Loopback9").attach(&mut session).await.unwrap());

        let mut lo = Interface::new("Loopback0");
        assert!(lo.attach(&mut session).await.unwrap());
        session.transport_mut().clear_log();
        lo.down(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec!["config term", "interface loopback0", "shutdown", "exit"]
        );
    }

    #[tokio::test]
    async fn test_foreign_session_refused() {
        let mut first = started(MockRouter::new("R1")).await;
        let mut second = started(MockRouter::new("R2")).await;
        let mut lo = Interface::new("Loopback0");
        lo.create(&mut first).await.unwrap();

        let err = lo.up(&mut second).await.unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::ForeignSession { .. })));
        assert!(second.transport().sends().is_empty());
    }
}
