//! OSPF: process, areas and per-interface enablement.
//!
//! Interfaces join an area from the interface context (`ip ospf P area A`),
//! so areas have no CLI context of their own. The process context only
//! carries the passive-interface list, written after every area is
//! applied.

use std::fmt;

use log::info;

use super::interface::Interface;
use super::{
    ConfigNode, NodeKind, NodeRef, Scope, attached_scope, check_session, exit_level, normalize_name,
    top_level_scope,
};
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;

/// OSPF network type of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkType {
    #[default]
    PointToPoint,
    PointToMultipoint,
    Broadcast,
    NonBroadcast,
    PointToMultipointNonBroadcast,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::PointToPoint => "point-to-point",
            NetworkType::PointToMultipoint => "point-to-multipoint",
            NetworkType::Broadcast => "broadcast",
            NetworkType::NonBroadcast => "non-broadcast",
            NetworkType::PointToMultipointNonBroadcast => "point-to-multipoint non-broadcast",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An interface enabled for OSPF in an area.
#[derive(Debug, Clone)]
pub struct OspfInterface {
    name: String,
    network_type: NetworkType,
    passive: bool,
    attachment: Option<Scope>,
}

impl OspfInterface {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name).to_lowercase(),
            network_type: NetworkType::default(),
            passive: false,
            attachment: None,
        }
    }

    pub fn with_network_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = network_type;
        self
    }

    /// Advertise the interface without forming adjacencies on it.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    fn area_command(&self, scope: &Scope) -> Result<String> {
        let node = self.node_ref();
        let process = scope.require(NodeKind::Ospf, &node)?;
        let area = scope.require(NodeKind::OspfArea, &node)?;
        Ok(format!("ip ospf {} area {}", process, area))
    }
}

impl From<&Interface> for OspfInterface {
    fn from(interface: &Interface) -> Self {
        Self::new(interface.name())
    }
}

impl ConfigNode for OspfInterface {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::OspfInterface, self.name.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let area = self.area_command(scope)?;

        session
            .write_with_response(&format!("interface {}", self.name))
            .await?;
        session.write_with_response(&area).await?;
        if !self.passive {
            session
                .write_with_response(&format!("ip ospf network {}", self.network_type))
                .await?;
        }
        exit_level(session).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let area = self.area_command(&scope)?;

        scope.reenter(session).await?;
        session
            .write_with_response(&format!("interface {}", self.name))
            .await?;
        session.write_with_response(&format!("no {}", area)).await?;
        exit_level(session).await?;

        self.attachment = None;
        Ok(())
    }
}

/// An OSPF area and its member interfaces.
#[derive(Debug, Clone)]
pub struct OspfArea {
    id: String,
    interfaces: Vec<OspfInterface>,
    attachment: Option<Scope>,
}

impl OspfArea {
    /// Area `id`, either a number (`0`) or dotted (`0.0.0.1`).
    pub fn new(id: &str) -> Self {
        Self {
            id: normalize_name(id),
            interfaces: vec![],
            attachment: None,
        }
    }

    pub fn with_interface(mut self, interface: OspfInterface) -> Self {
        self.add_interface(interface);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interfaces(&self) -> &[OspfInterface] {
        &self.interfaces
    }

    pub fn add_interface(&mut self, interface: OspfInterface) {
        self.interfaces.push(interface);
    }

    /// Add an interface, enabling OSPF on it immediately when attached.
    pub async fn push_interface<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut interface: OspfInterface,
    ) -> Result<()> {
        if self.attachment.is_some() {
            let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
            let children = scope.child(self.node_ref());
            children.reenter(session).await?;
            interface.apply(session, &children).await?;
            if interface.passive {
                let process = scope.require(NodeKind::Ospf, &self.node_ref())?;
                session
                    .write_with_response(&format!("router ospf {}", process))
                    .await?;
                session
                    .write_with_response(&format!("passive-interface {}", interface.name))
                    .await?;
                exit_level(session).await?;
            }
            session.to_config().await?;
        }
        self.interfaces.push(interface);
        Ok(())
    }

    fn passive_interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces
            .iter()
            .filter(|interface| interface.passive)
            .map(|interface| interface.name.as_str())
    }
}

impl ConfigNode for OspfArea {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::OspfArea, self.id.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        for interface in &mut self.interfaces {
            interface.apply(session, &children).await?;
        }
        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        for interface in self.interfaces.iter_mut().filter(|interface| interface.is_attached()) {
            interface.detach(session).await?;
        }
        self.attachment = None;
        Ok(())
    }
}

/// An OSPF process.
#[derive(Debug, Clone)]
pub struct Ospf {
    process_id: u32,
    areas: Vec<OspfArea>,
    attachment: Option<Scope>,
}

impl Ospf {
    pub fn new(process_id: u32) -> Self {
        Self {
            process_id,
            areas: vec![],
            attachment: None,
        }
    }

    pub fn with_area(mut self, area: OspfArea) -> Self {
        self.add_area(area);
        self
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn areas(&self) -> &[OspfArea] {
        &self.areas
    }

    pub fn area_mut(&mut self, id: &str) -> Option<&mut OspfArea> {
        let id = normalize_name(id);
        self.areas.iter_mut().find(|area| area.id == id)
    }

    pub fn add_area(&mut self, area: OspfArea) {
        self.areas.push(area);
    }

    /// Add an area, applying it immediately when attached.
    pub async fn push_area<T: Transport>(&mut self, session: &mut Session<T>, mut area: OspfArea) -> Result<()> {
        if self.attachment.is_some() {
            let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
            let children = scope.child(self.node_ref());
            children.reenter(session).await?;
            area.apply(session, &children).await?;
            let passive: Vec<&str> = area.passive_interfaces().collect();
            self.write_passive(session, &passive).await?;
            session.to_config().await?;
        }
        self.areas.push(area);
        Ok(())
    }

    pub async fn create<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        self.apply(session, &scope).await?;
        session.to_config().await?;
        info!("router ospf {} created on {}", self.process_id, session.name());
        Ok(())
    }

    pub async fn delete<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = Some(scope);
        self.detach(session).await?;
        session.to_config().await?;
        info!("router ospf {} deleted on {}", self.process_id, session.name());
        Ok(())
    }

    async fn write_passive<T: Transport>(&self, session: &mut Session<T>, interfaces: &[&str]) -> Result<()> {
        session
            .write_with_response(&format!("router ospf {}", self.process_id))
            .await?;
        for interface in interfaces {
            session
                .write_with_response(&format!("passive-interface {}", interface))
                .await?;
        }
        exit_level(session).await
    }
}

impl ConfigNode for Ospf {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::Ospf, self.process_id.to_string())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        let children = scope.child(self.node_ref());
        for area in &mut self.areas {
            area.apply(session, &children).await?;
        }

        let passive: Vec<&str> = self.areas.iter().flat_map(|area| area.passive_interfaces()).collect();
        self.write_passive(session, &passive).await?;

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        for area in self.areas.iter_mut().filter(|area| area.is_attached()) {
            area.detach(session).await?;
        }
        scope.reenter(session).await?;
        session
            .write_with_response(&format!("no router ospf {}", self.process_id))
            .await?;
        self.attachment = None;
        Ok(())
    }
}
