//! VRF definitions (`ip vrf`).

use log::info;

use super::inventory::list_vrfs;
use super::{
    ConfigNode, NodeKind, NodeRef, Scope, attached_scope, check_session, exit_level, normalize_name,
    top_level_scope,
};
use crate::error::{ConfigError, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Address family of a VRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VrfAddressFamilyKind {
    Ipv4Unicast,
    /// Not supported by `ip vrf` definitions; rejected on apply.
    Ipv6Unicast,
}

impl VrfAddressFamilyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VrfAddressFamilyKind::Ipv4Unicast => "ipv4 unicast",
            VrfAddressFamilyKind::Ipv6Unicast => "ipv6 unicast",
        }
    }
}

/// Route targets of one VRF address family.
///
/// The VRF name and route distinguisher are taken from the owning [`Vrf`]
/// when the family is added to it.
#[derive(Debug, Clone)]
pub struct VrfAddressFamily {
    kind: VrfAddressFamilyKind,
    vrf: String,
    rd: String,
    import_targets: Vec<String>,
    export_targets: Vec<String>,
    attachment: Option<Scope>,
}

impl VrfAddressFamily {
    pub fn new(kind: VrfAddressFamilyKind) -> Self {
        Self {
            kind,
            vrf: String::new(),
            rd: String::new(),
            import_targets: vec![],
            export_targets: vec![],
            attachment: None,
        }
    }

    pub fn with_import_target(mut self, target: &str) -> Self {
        self.add_import_target(target);
        self
    }

    pub fn with_export_target(mut self, target: &str) -> Self {
        self.add_export_target(target);
        self
    }

    pub fn kind(&self) -> VrfAddressFamilyKind {
        self.kind
    }

    pub fn import_targets(&self) -> &[String] {
        &self.import_targets
    }

    pub fn export_targets(&self) -> &[String] {
        &self.export_targets
    }

    pub fn add_import_target(&mut self, target: &str) {
        self.import_targets.push(normalize_name(target));
    }

    pub fn add_export_target(&mut self, target: &str) {
        self.export_targets.push(normalize_name(target));
    }

    /// Add an import route target, pushing it immediately when attached.
    pub async fn push_import_target<T: Transport>(&mut self, session: &mut Session<T>, target: &str) -> Result<()> {
        let target = normalize_name(target);
        self.push_target(session, &format!("route-target import {}", target))
            .await?;
        self.import_targets.push(target);
        Ok(())
    }

    /// Add an export route target, pushing it immediately when attached.
    pub async fn push_export_target<T: Transport>(&mut self, session: &mut Session<T>, target: &str) -> Result<()> {
        let target = normalize_name(target);
        self.push_target(session, &format!("route-target export {}", target))
            .await?;
        self.export_targets.push(target);
        Ok(())
    }

    async fn push_target<T: Transport>(&self, session: &mut Session<T>, command: &str) -> Result<()> {
        if self.attachment.is_none() {
            return Ok(());
        }
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        session.write_with_response(&self.context_command()).await?;
        session.write_with_response(command).await?;
        session.to_config().await
    }

    fn bind(&mut self, vrf: &str, rd: &str) {
        self.vrf = vrf.to_string();
        self.rd = rd.to_string();
    }

    fn context_command(&self) -> String {
        format!("ip vrf {}", self.vrf)
    }
}

impl ConfigNode for VrfAddressFamily {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::VrfAddressFamily, self.kind.as_str())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        if self.kind == VrfAddressFamilyKind::Ipv6Unicast {
            return Err(ConfigError::Unsupported {
                what: format!("{} address-family on vrf {}", self.kind.as_str(), self.vrf),
            }
            .into());
        }

        session.write_with_response(&self.context_command()).await?;
        session.write_with_response(&format!("rd {}", self.rd)).await?;
        for target in &self.import_targets {
            session
                .write_with_response(&format!("route-target import {}", target))
                .await?;
        }
        for target in &self.export_targets {
            session
                .write_with_response(&format!("route-target export {}", target))
                .await?;
        }
        exit_level(session).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        // The definition goes with its last family; a sibling may already
        // have removed it.
        session
            .write_allow_failure(&format!("no ip vrf {}", self.vrf))
            .await?;
        self.attachment = None;
        Ok(())
    }
}

/// A VRF with its route distinguisher.
#[derive(Debug, Clone)]
pub struct Vrf {
    name: String,
    rd: String,
    families: Vec<VrfAddressFamily>,
    attachment: Option<Scope>,
}

impl Vrf {
    /// A VRF named `name`. The route distinguisher is mandatory.
    pub fn new(name: &str, rd: &str) -> Result<Self> {
        let rd = normalize_name(rd);
        if rd.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "route distinguisher",
                value: rd,
            }
            .into());
        }
        Ok(Self {
            name: normalize_name(name),
            rd,
            families: vec![],
            attachment: None,
        })
    }

    pub fn with_family(mut self, family: VrfAddressFamily) -> Self {
        self.add_family(family);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rd(&self) -> &str {
        &self.rd
    }

    pub fn families(&self) -> &[VrfAddressFamily] {
        &self.families
    }

    pub fn family_mut(&mut self, kind: VrfAddressFamilyKind) -> Option<&mut VrfAddressFamily> {
        self.families.iter_mut().find(|family| family.kind == kind)
    }

    pub fn add_family(&mut self, mut family: VrfAddressFamily) {
        family.bind(&self.name, &self.rd);
        self.families.push(family);
    }

    /// Add a family, applying it immediately when the VRF is attached.
    pub async fn push_family<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut family: VrfAddressFamily,
    ) -> Result<()> {
        family.bind(&self.name, &self.rd);
        if self.attachment.is_some() {
            let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
            scope.reenter(session).await?;
            family.apply(session, &scope.child(self.node_ref())).await?;
            session.to_config().await?;
        }
        self.families.push(family);
        Ok(())
    }

    /// Whether the device already has a VRF of this name.
    pub async fn exists<T: Transport>(&self, session: &mut Session<T>) -> Result<bool> {
        Ok(list_vrfs(session).await?.contains(&self.name))
    }

    pub async fn create<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        self.apply(session, &scope).await?;
        session.to_config().await?;
        info!("{} rd {} created on {}", self.node_ref(), self.rd, session.name());
        Ok(())
    }

    /// Remove the VRF. Device errors are tolerated: the VRF may already
    /// be gone.
    pub async fn delete<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = Some(scope);
        self.detach(session).await?;
        session.to_config().await?;
        info!("{} deleted on {}", self.node_ref(), session.name());
        Ok(())
    }
}

impl ConfigNode for Vrf {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::Vrf, self.name.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        for family in &mut self.families {
            family.apply(session, &children).await?;
        }
        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let mut removed = false;
        for family in self.families.iter_mut().filter(|family| family.is_attached()) {
            family.detach(session).await?;
            removed = true;
        }
        if !removed {
            scope.reenter(session).await?;
            session
                .write_allow_failure(&format!("no ip vrf {}", self.name))
                .await?;
        }
        self.attachment = None;
        Ok(())
    }
}
