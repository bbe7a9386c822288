//! BGP process configuration.
//!
//! ```text
//! Bgp                           router bgp AS
//! └── BgpVrf                    "default" or a VRF name
//!     ├── BgpNeighbor           neighbor A remote-as AS
//!     │   └── BgpNeighborAddressFamily   neighbor A activate
//!     └── BgpAddressFamily      address-family ... [vrf N]
//! ```
//!
//! Every node below [`Bgp`] lives inside the `router bgp` context; address
//! families of a non-default VRF carry the `vrf N` suffix on their
//! headline.

use indexmap::IndexSet;
use log::info;

use super::feature::{FeatureChange, FeatureSet};
use super::{
    ConfigNode, NodeKind, NodeRef, Scope, attached_scope, check_session, exit_level, normalize_name,
    top_level_scope, write_all,
};
use crate::error::{ConfigError, Result};
use crate::session::{Session, SessionId};
use crate::transport::Transport;

/// Name of the global routing table instance.
pub const DEFAULT_VRF: &str = "default";

const EXIT_ADDRESS_FAMILY: &str = "exit-address-family";

/// BGP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4Unicast,
    Ipv6Unicast,
    Vpnv4,
    /// Not supported on this platform; rejected on apply.
    L2vpnEvpn,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4Unicast => "ipv4 unicast",
            AddressFamily::Ipv6Unicast => "ipv6 unicast",
            AddressFamily::Vpnv4 => "vpnv4",
            AddressFamily::L2vpnEvpn => "l2vpn evpn",
        }
    }

    fn command(&self) -> Result<&'static str> {
        match self {
            AddressFamily::Ipv4Unicast => Ok("address-family ipv4 unicast"),
            AddressFamily::Ipv6Unicast => Ok("address-family ipv6 unicast"),
            AddressFamily::Vpnv4 => Ok("address-family vpnv4"),
            AddressFamily::L2vpnEvpn => Err(ConfigError::Unsupported {
                what: format!("{} address-family under bgp", self.as_str()),
            }
            .into()),
        }
    }

    /// Context-entry line of this family under `scope`.
    fn headline(&self, scope: &Scope) -> Result<String> {
        let command = self.command()?;
        Ok(match vrf_of(scope) {
            Some(vrf) => format!("{} vrf {}", command, vrf),
            None => command.to_string(),
        })
    }
}

/// The non-default VRF that `scope` lies in, if any.
fn vrf_of(scope: &Scope) -> Option<&str> {
    scope
        .ancestor(NodeKind::BgpVrf)
        .map(|vrf| vrf.name.as_str())
        .filter(|name| *name != DEFAULT_VRF)
}

/// The BGP process.
#[derive(Debug, Clone)]
pub struct Bgp {
    asn: u32,
    vrfs: Vec<BgpVrf>,
    attachment: Option<Scope>,
}

impl Bgp {
    pub fn new(asn: u32) -> Self {
        Self {
            asn,
            vrfs: vec![],
            attachment: None,
        }
    }

    pub fn with_vrf(mut self, vrf: BgpVrf) -> Self {
        self.add_vrf(vrf);
        self
    }

    pub fn asn(&self) -> u32 {
        self.asn
    }

    pub fn vrfs(&self) -> &[BgpVrf] {
        &self.vrfs
    }

    pub fn vrf_mut(&mut self, name: &str) -> Option<&mut BgpVrf> {
        let name = normalize_name(name);
        self.vrfs.iter_mut().find(|vrf| vrf.name == name)
    }

    pub fn add_vrf(&mut self, vrf: BgpVrf) {
        self.vrfs.push(vrf);
    }

    /// Add a VRF instance, applying it immediately when attached.
    pub async fn push_vrf<T: Transport>(&mut self, session: &mut Session<T>, mut vrf: BgpVrf) -> Result<()> {
        if self.attachment.is_some() {
            let children = self.children_scope(session.id())?;
            children.reenter(session).await?;
            vrf.apply(session, &children).await?;
            session.to_config().await?;
        }
        self.vrfs.push(vrf);
        Ok(())
    }

    pub async fn create<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        self.apply(session, &scope).await?;
        session.to_config().await?;
        info!("{} created on {}", self.context_command(), session.name());
        Ok(())
    }

    pub async fn delete<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = Some(scope);
        self.detach(session).await?;
        session.to_config().await?;
        info!("{} deleted on {}", self.context_command(), session.name());
        Ok(())
    }

    fn context_command(&self) -> String {
        format!("router bgp {}", self.asn)
    }

    fn children_scope(&self, session: SessionId) -> Result<Scope> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session)?;
        Ok(scope.child_in(self.node_ref(), self.context_command()))
    }
}

impl ConfigNode for Bgp {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::Bgp, self.asn.to_string())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let context = self.context_command();
        session.write_with_response(&context).await?;

        let children = scope.child_in(self.node_ref(), context);
        for vrf in &mut self.vrfs {
            vrf.apply(session, &children).await?;
        }
        exit_level(session).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        for vrf in self.vrfs.iter_mut().filter(|vrf| vrf.is_attached()) {
            vrf.detach(session).await?;
        }
        scope.reenter(session).await?;
        session
            .write_with_response(&format!("no router bgp {}", self.asn))
            .await?;
        self.attachment = None;
        Ok(())
    }
}

/// A BGP instance: the global table (`default`) or a VRF.
#[derive(Debug, Clone)]
pub struct BgpVrf {
    name: String,
    neighbors: Vec<BgpNeighbor>,
    families: Vec<BgpAddressFamily>,
    attachment: Option<Scope>,
}

impl BgpVrf {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            neighbors: vec![],
            families: vec![],
            attachment: None,
        }
    }

    pub fn default_vrf() -> Self {
        Self::new(DEFAULT_VRF)
    }

    pub fn with_neighbor(mut self, neighbor: BgpNeighbor) -> Self {
        self.add_neighbor(neighbor);
        self
    }

    pub fn with_family(mut self, family: BgpAddressFamily) -> Self {
        self.add_family(family);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_VRF
    }

    pub fn neighbors(&self) -> &[BgpNeighbor] {
        &self.neighbors
    }

    pub fn families(&self) -> &[BgpAddressFamily] {
        &self.families
    }

    pub fn neighbor_mut(&mut self, address: &str) -> Option<&mut BgpNeighbor> {
        let address = normalize_name(address);
        self.neighbors.iter_mut().find(|neighbor| neighbor.address == address)
    }

    pub fn family_mut(&mut self, family: AddressFamily) -> Option<&mut BgpAddressFamily> {
        self.families.iter_mut().find(|af| af.family == family)
    }

    pub fn add_neighbor(&mut self, neighbor: BgpNeighbor) {
        self.neighbors.push(neighbor);
    }

    pub fn add_family(&mut self, family: BgpAddressFamily) {
        self.families.push(family);
    }

    /// Add a neighbor, applying it immediately when attached.
    pub async fn push_neighbor<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut neighbor: BgpNeighbor,
    ) -> Result<()> {
        if let Some(children) = self.enter_children(session).await? {
            neighbor.apply(session, &children).await?;
            session.to_config().await?;
        }
        self.neighbors.push(neighbor);
        Ok(())
    }

    /// Add an address family, applying it immediately when attached.
    pub async fn push_family<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut family: BgpAddressFamily,
    ) -> Result<()> {
        if let Some(children) = self.enter_children(session).await? {
            family.apply(session, &children).await?;
            session.to_config().await?;
        }
        self.families.push(family);
        Ok(())
    }

    /// Enter the CLI context of this instance's children, if attached.
    async fn enter_children<T: Transport>(&self, session: &mut Session<T>) -> Result<Option<Scope>> {
        if self.attachment.is_none() {
            return Ok(None);
        }
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        children.reenter(session).await?;
        Ok(Some(children))
    }
}

impl ConfigNode for BgpVrf {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::BgpVrf, self.name.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        for neighbor in &mut self.neighbors {
            neighbor.apply(session, &children).await?;
        }
        for family in &mut self.families {
            family.apply(session, &children).await?;
        }
        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        for family in self.families.iter_mut().filter(|af| af.is_attached()) {
            family.detach(session).await?;
        }
        for neighbor in self.neighbors.iter_mut().filter(|neighbor| neighbor.is_attached()) {
            neighbor.detach(session).await?;
        }
        self.attachment = None;
        Ok(())
    }
}

/// Address family of a BGP instance with its feature lines
/// (`redistribute connected`, ...).
#[derive(Debug, Clone)]
pub struct BgpAddressFamily {
    family: AddressFamily,
    features: FeatureSet,
    attachment: Option<Scope>,
}

impl BgpAddressFamily {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            features: FeatureSet::new(),
            attachment: None,
        }
    }

    pub fn with_feature(mut self, line: &str) -> Result<Self> {
        self.add_feature(line)?;
        Ok(self)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Change the local feature set only.
    pub fn add_feature(&mut self, line: &str) -> Result<FeatureChange> {
        self.features.apply(line)
    }

    /// Change one feature, pushing the line to the device when attached.
    pub async fn modify_feature<T: Transport>(&mut self, session: &mut Session<T>, line: &str) -> Result<()> {
        if self.attachment.is_none() {
            self.features.apply(line)?;
            return Ok(());
        }
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let headline = self.family.headline(&scope)?;
        let change = self.features.apply(line)?;

        scope.reenter(session).await?;
        session.write_with_response(&headline).await?;
        session.write_with_response(&change.to_string()).await?;
        session.write_with_response(EXIT_ADDRESS_FAMILY).await?;
        session.to_config().await
    }
}

impl ConfigNode for BgpAddressFamily {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::BgpAddressFamily, self.family.as_str())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let headline = self.family.headline(scope)?;
        let features: Vec<String> = self.features.iter().map(str::to_string).collect();

        session.write_with_response(&headline).await?;
        write_all(session, &features).await?;
        session.write_with_response(EXIT_ADDRESS_FAMILY).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    /// Removed together with the process; nothing to send.
    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = None;
        Ok(())
    }
}

/// A BGP peer.
#[derive(Debug, Clone)]
pub struct BgpNeighbor {
    address: String,
    remote_as: u32,
    update_source: Option<String>,
    families: Vec<BgpNeighborAddressFamily>,
    attachment: Option<Scope>,
}

impl BgpNeighbor {
    pub fn new(address: &str, remote_as: u32) -> Self {
        Self {
            address: normalize_name(address),
            remote_as,
            update_source: None,
            families: vec![],
            attachment: None,
        }
    }

    /// Source the session from `interface` (usually a loopback).
    pub fn with_update_source(mut self, interface: &str) -> Self {
        self.update_source = Some(normalize_name(interface));
        self
    }

    pub fn with_family(mut self, family: BgpNeighborAddressFamily) -> Self {
        self.add_family(family);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn remote_as(&self) -> u32 {
        self.remote_as
    }

    pub fn update_source(&self) -> Option<&str> {
        self.update_source.as_deref()
    }

    pub fn families(&self) -> &[BgpNeighborAddressFamily] {
        &self.families
    }

    pub fn family_mut(&mut self, family: AddressFamily) -> Option<&mut BgpNeighborAddressFamily> {
        self.families.iter_mut().find(|af| af.family == family)
    }

    pub fn add_family(&mut self, family: BgpNeighborAddressFamily) {
        self.families.push(family);
    }

    /// Add an address family, activating the neighbor in it immediately
    /// when attached.
    pub async fn push_family<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut family: BgpNeighborAddressFamily,
    ) -> Result<()> {
        if self.attachment.is_some() {
            let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
            let children = scope.child(self.node_ref());
            children.reenter(session).await?;
            family.apply(session, &children).await?;
            session.to_config().await?;
        }
        self.families.push(family);
        Ok(())
    }

    fn param_commands(&self) -> Vec<String> {
        let mut commands = vec![format!("neighbor {} remote-as {}", self.address, self.remote_as)];
        if let Some(source) = &self.update_source {
            commands.push(format!("neighbor {} update-source {}", self.address, source));
        }
        commands
    }
}

impl ConfigNode for BgpNeighbor {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::BgpNeighbor, self.address.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    /// The peer definition is only sent the first time; later applies
    /// resync the address families.
    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        if let Some(vrf) = vrf_of(scope) {
            if self.families.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "neighbor address family",
                    value: format!("{} in vrf {} has none", self.address, vrf),
                }
                .into());
            }
        }
        let params = if self.attachment.is_none() {
            self.param_commands()
        } else {
            vec![]
        };
        let children = scope.child(self.node_ref());

        if vrf_of(scope).is_some() {
            // VRF peers are defined inside each address family.
            for family in &mut self.families {
                if !params.is_empty() {
                    session
                        .write_with_response(&family.family.headline(&children)?)
                        .await?;
                    write_all(session, &params).await?;
                }
                family.apply(session, &children).await?;
            }
        } else {
            write_all(session, &params).await?;
            for family in &mut self.families {
                family.apply(session, &children).await?;
            }
        }

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        let headline = match vrf_of(&scope) {
            Some(_) => {
                let family = self
                    .families
                    .first()
                    .map_or(AddressFamily::Ipv4Unicast, |af| af.family);
                Some(family.headline(&children)?)
            }
            None => None,
        };

        for family in self.families.iter_mut().filter(|af| af.is_attached()) {
            family.detach(session).await?;
        }

        scope.reenter(session).await?;
        if let Some(headline) = &headline {
            session.write_with_response(headline).await?;
        }
        session
            .write_with_response(&format!("no neighbor {}", self.address))
            .await?;
        if headline.is_some() {
            session.write_with_response(EXIT_ADDRESS_FAMILY).await?;
        }

        self.attachment = None;
        Ok(())
    }
}

/// Address family of one neighbor, with per-neighbor feature lines
/// (`send-community both`, `route-reflector-client`, ...).
#[derive(Debug, Clone)]
pub struct BgpNeighborAddressFamily {
    family: AddressFamily,
    features: FeatureSet,
    activated_for: IndexSet<String>,
    attachment: Option<Scope>,
}

impl BgpNeighborAddressFamily {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            features: FeatureSet::new(),
            activated_for: IndexSet::new(),
            attachment: None,
        }
    }

    pub fn with_feature(mut self, line: &str) -> Result<Self> {
        self.add_feature(line)?;
        Ok(self)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Change the local feature set only.
    pub fn add_feature(&mut self, line: &str) -> Result<FeatureChange> {
        self.features.apply(line)
    }

    /// Change one feature, pushing `[no] neighbor A <feature>` when
    /// attached.
    pub async fn modify_feature<T: Transport>(&mut self, session: &mut Session<T>, line: &str) -> Result<()> {
        if self.attachment.is_none() {
            self.features.apply(line)?;
            return Ok(());
        }
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let neighbor = scope.require(NodeKind::BgpNeighbor, &self.node_ref())?.to_string();
        let headline = self.family.headline(&scope)?;
        let change = self.features.apply(line)?;
        let command = match change {
            FeatureChange::Add(feature) => format!("neighbor {} {}", neighbor, feature),
            FeatureChange::Remove(feature) => format!("no neighbor {} {}", neighbor, feature),
        };

        scope.reenter(session).await?;
        session.write_with_response(&headline).await?;
        session.write_with_response(&command).await?;
        session.write_with_response(EXIT_ADDRESS_FAMILY).await?;
        session.to_config().await
    }
}

impl ConfigNode for BgpNeighborAddressFamily {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::BgpNeighborAddressFamily, self.family.as_str())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    /// `activate` is issued once per neighbor and features only on the
    /// first apply.
    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let neighbor = scope.require(NodeKind::BgpNeighbor, &self.node_ref())?.to_string();
        let headline = self.family.headline(scope)?;

        let mut commands = vec![headline];
        if self.activated_for.insert(neighbor.clone()) {
            commands.push(format!("neighbor {} activate", neighbor));
        }
        if self.attachment.is_none() {
            commands.extend(
                self.features
                    .iter()
                    .map(|feature| format!("neighbor {} {}", neighbor, feature)),
            );
        }
        commands.push(EXIT_ADDRESS_FAMILY.to_string());
        write_all(session, &commands).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.activated_for.clear();
        self.attachment = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::session::Mode;
    use crate::transport::mock::{MockRouter, started};

    fn ibgp() -> Bgp {
        let neighbor = BgpNeighbor::new("10.0.0.2", 65000)
            .with_update_source("Loopback0")
            .with_family(
                BgpNeighborAddressFamily::new(AddressFamily::Ipv4Unicast)
                    .with_feature("send-community both")
                    .unwrap(),
            );
        let family = BgpAddressFamily::new(AddressFamily::Ipv4Unicast)
            .with_feature("redistribute connected")
            .unwrap();
        Bgp::new(65000).with_vrf(BgpVrf::default_vrf().with_neighbor(neighbor).with_family(family))
    }

    #[test]
    fn test_headline_vrf_suffix() {
        let root = Scope::root(SessionId::next()).child_in(NodeRef::new(NodeKind::Bgp, "65000"), "router bgp 65000");
        let global = root.child(NodeRef::new(NodeKind::BgpVrf, DEFAULT_VRF));
        let red = root.child(NodeRef::new(NodeKind::BgpVrf, "RED"));

        assert_eq!(
            AddressFamily::Ipv4Unicast.headline(&global).unwrap(),
            "address-family ipv4 unicast"
        );
        assert_eq!(
            AddressFamily::Ipv6Unicast.headline(&red).unwrap(),
            "address-family ipv6 unicast vrf RED"
        );
        assert!(matches!(
            AddressFamily::L2vpnEvpn.headline(&global),
            Err(Error::Config(ConfigError::Unsupported { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_emits_tree_in_order() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();

        bgp.create(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "router bgp 65000",
                "neighbor 10.0.0.2 remote-as 65000",
                "neighbor 10.0.0.2 update-source Loopback0",
                "address-family ipv4 unicast",
                "neighbor 10.0.0.2 activate",
                "neighbor 10.0.0.2 send-community both",
                "exit-address-family",
                "address-family ipv4 unicast",
                "redistribute connected",
                "exit-address-family",
                "exit",
            ]
        );
        assert_eq!(session.mode(), Mode::Config);
        assert!(bgp.vrfs()[0].neighbors()[0].families()[0].is_attached());
    }

    #[tokio::test]
    async fn test_reapply_skips_creation_commands() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        bgp.create(&mut session).await.unwrap();

        let issued = session.transport().issued();
        assert_eq!(issued.first(), Some(&"router bgp 65000"));
        assert!(!issued.iter().any(|c| c.contains("remote-as")));
        assert!(!issued.iter().any(|c| c.contains("update-source")));
        assert!(!issued.iter().any(|c| c.contains("activate")));
        assert!(!issued.iter().any(|c| c.contains("send-community")));
    }

    #[tokio::test]
    async fn test_vrf_families_entered_in_order() {
        let mut session = started(MockRouter::new("R1")).await;
        let vrf = BgpVrf::new("RED")
            .with_family(BgpAddressFamily::new(AddressFamily::Ipv4Unicast))
            .with_family(BgpAddressFamily::new(AddressFamily::Ipv6Unicast));
        let mut bgp = Bgp::new(65000).with_vrf(vrf);

        bgp.create(&mut session).await.unwrap();

        let issued = session.transport().issued();
        assert_eq!(
            issued,
            vec![
                "config term",
                "router bgp 65000",
                "address-family ipv4 unicast vrf RED",
                "exit-address-family",
                "address-family ipv6 unicast vrf RED",
                "exit-address-family",
                "exit",
            ]
        );
        assert_eq!(issued.iter().filter(|c| **c == EXIT_ADDRESS_FAMILY).count(), 2);
    }

    #[tokio::test]
    async fn test_vrf_neighbor_defined_inside_family() {
        let mut session = started(MockRouter::new("R1")).await;
        let neighbor = BgpNeighbor::new("10.1.0.2", 65001)
            .with_family(BgpNeighborAddressFamily::new(AddressFamily::Ipv4Unicast));
        let mut bgp = Bgp::new(65000).with_vrf(BgpVrf::new("RED").with_neighbor(neighbor));

        bgp.create(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "router bgp 65000",
                "address-family ipv4 unicast vrf RED",
                "neighbor 10.1.0.2 remote-as 65001",
                "address-family ipv4 unicast vrf RED",
                "neighbor 10.1.0.2 activate",
                "exit-address-family",
                "exit",
            ]
        );
    }

    #[tokio::test]
    async fn test_vrf_neighbor_without_family_is_rejected() {
        let mut session = started(MockRouter::new("R1")).await;
        let neighbor = BgpNeighbor::new("10.1.0.2", 65001);
        let mut bgp = Bgp::new(65000).with_vrf(BgpVrf::new("RED").with_neighbor(neighbor));

        let err = bgp.create(&mut session).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "neighbor address family",
                ..
            })
        ));
        assert_eq!(session.transport().issued(), vec!["config term", "router bgp 65000"]);
        assert!(!bgp.vrfs()[0].neighbors()[0].is_attached());
    }

    #[tokio::test]
    async fn test_vrf_neighbor_removed_inside_family() {
        let mut session = started(MockRouter::new("R1")).await;
        let neighbor = BgpNeighbor::new("10.1.0.2", 65001)
            .with_family(BgpNeighborAddressFamily::new(AddressFamily::Ipv4Unicast));
        let mut bgp = Bgp::new(65000).with_vrf(BgpVrf::new("RED").with_neighbor(neighbor));
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        bgp.delete(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "router bgp 65000",
                "address-family ipv4 unicast vrf RED",
                "no neighbor 10.1.0.2",
                "exit-address-family",
                "exit",
                "no router bgp 65000",
            ]
        );
        assert!(!bgp.vrfs()[0].neighbors()[0].is_attached());
    }

    #[tokio::test]
    async fn test_modify_feature_reenters_context() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        let vrf = bgp.vrf_mut(DEFAULT_VRF).unwrap();
        vrf.family_mut(AddressFamily::Ipv4Unicast)
            .unwrap()
            .modify_feature(&mut session, "no redistribute connected")
            .await
            .unwrap();
        vrf.neighbor_mut("10.0.0.2")
            .unwrap()
            .family_mut(AddressFamily::Ipv4Unicast)
            .unwrap()
            .modify_feature(&mut session, "route-reflector-client")
            .await
            .unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "router bgp 65000",
                "address-family ipv4 unicast",
                "no redistribute connected",
                "exit-address-family",
                "exit",
                "router bgp 65000",
                "address-family ipv4 unicast",
                "neighbor 10.0.0.2 route-reflector-client",
                "exit-address-family",
                "exit",
            ]
        );
        assert!(vrf.families()[0].features().is_empty());
    }

    #[tokio::test]
    async fn test_modify_absent_feature_sends_nothing() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        let err = bgp
            .vrf_mut(DEFAULT_VRF)
            .unwrap()
            .family_mut(AddressFamily::Ipv4Unicast)
            .unwrap()
            .modify_feature(&mut session, "no maximum-paths 4")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::FeatureNotPresent { .. })));
        assert!(session.transport().sends().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_children_first() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        bgp.delete(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "router bgp 65000",
                "no neighbor 10.0.0.2",
                "exit",
                "no router bgp 65000"
            ]
        );
        assert!(!bgp.is_attached());
        assert!(!bgp.vrfs()[0].is_attached());
        assert!(!bgp.vrfs()[0].neighbors()[0].is_attached());
    }

    #[tokio::test]
    async fn test_push_neighbor_when_attached() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut bgp = ibgp();
        bgp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        bgp.vrf_mut(DEFAULT_VRF)
            .unwrap()
            .push_neighbor(&mut session, BgpNeighbor::new("10.0.0.3", 65000))
            .await
            .unwrap();

        assert_eq!(
            session.transport().issued(),
            vec!["router bgp 65000", "neighbor 10.0.0.3 remote-as 65000", "exit"]
        );
        assert_eq!(bgp.vrfs()[0].neighbors().len(), 2);
    }

    #[tokio::test]
    async fn test_tree_consistency_errors() {
        let mut first = started(MockRouter::new("R1")).await;
        let mut second = started(MockRouter::new("R2")).await;

        let err = BgpNeighbor::new("10.0.0.9", 1).detach(&mut first).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotAttached { .. })));

        let mut bgp = ibgp();
        bgp.create(&mut first).await.unwrap();
        let err = bgp
            .vrf_mut(DEFAULT_VRF)
            .unwrap()
            .family_mut(AddressFamily::Ipv4Unicast)
            .unwrap()
            .modify_feature(&mut second, "maximum-paths 4")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ForeignSession { .. })));
        assert!(second.transport().sends().is_empty());
    }
}
