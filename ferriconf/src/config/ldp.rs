//! MPLS LDP.

use log::info;

use super::interface::Interface;
use super::{
    ConfigNode, NodeKind, NodeRef, Scope, attached_scope, check_session, exit_level, normalize_name,
    top_level_scope,
};
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;

/// An interface with LDP label switching enabled (`mpls ip`).
#[derive(Debug, Clone)]
pub struct LdpInterface {
    name: String,
    attachment: Option<Scope>,
}

impl LdpInterface {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name).to_lowercase(),
            attachment: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn set_mpls<T: Transport>(&self, session: &mut Session<T>, enabled: bool) -> Result<()> {
        session
            .write_with_response(&format!("interface {}", self.name))
            .await?;
        let command = if enabled { "mpls ip" } else { "no mpls ip" };
        session.write_with_response(command).await?;
        exit_level(session).await
    }
}

impl From<&Interface> for LdpInterface {
    fn from(interface: &Interface) -> Self {
        Self::new(interface.name())
    }
}

impl ConfigNode for LdpInterface {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::LdpInterface, self.name.clone())
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.set_mpls(session, true).await?;
        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        self.set_mpls(session, false).await?;
        self.attachment = None;
        Ok(())
    }
}

/// Global LDP settings and the interfaces it runs on.
#[derive(Debug, Clone, Default)]
pub struct Ldp {
    router_id: Option<String>,
    interfaces: Vec<LdpInterface>,
    attachment: Option<Scope>,
}

impl Ldp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the LDP router id from `interface`.
    pub fn with_router_id(mut self, interface: &str) -> Self {
        self.router_id = Some(normalize_name(interface));
        self
    }

    pub fn with_interface(mut self, interface: LdpInterface) -> Self {
        self.add_interface(interface);
        self
    }

    pub fn router_id(&self) -> Option<&str> {
        self.router_id.as_deref()
    }

    pub fn interfaces(&self) -> &[LdpInterface] {
        &self.interfaces
    }

    pub fn add_interface(&mut self, interface: LdpInterface) {
        self.interfaces.push(interface);
    }

    /// Add an interface, enabling label switching on it immediately when
    /// attached.
    pub async fn push_interface<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        mut interface: LdpInterface,
    ) -> Result<()> {
        if self.attachment.is_some() {
            let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
            let children = scope.child(self.node_ref());
            children.reenter(session).await?;
            interface.apply(session, &children).await?;
            session.to_config().await?;
        }
        self.interfaces.push(interface);
        Ok(())
    }

    pub async fn create<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        scope.reenter(session).await?;
        self.apply(session, &scope).await?;
        session.to_config().await?;
        info!("mpls ldp created on {}", session.name());
        Ok(())
    }

    pub async fn delete<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = top_level_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        self.attachment = Some(scope);
        self.detach(session).await?;
        session.to_config().await?;
        info!("mpls ldp deleted on {}", session.name());
        Ok(())
    }
}

impl ConfigNode for Ldp {
    fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeKind::Ldp, "default")
    }

    fn attachment(&self) -> Option<&Scope> {
        self.attachment.as_ref()
    }

    async fn apply<T: Transport>(&mut self, session: &mut Session<T>, scope: &Scope) -> Result<()> {
        check_session(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        session.write_with_response("mpls label protocol ldp").await?;
        if let Some(router_id) = &self.router_id {
            session
                .write_with_response(&format!("mpls ldp router-id {}", router_id))
                .await?;
        }

        let children = scope.child(self.node_ref());
        for interface in &mut self.interfaces {
            interface.apply(session, &children).await?;
        }

        self.attachment = Some(scope.clone());
        Ok(())
    }

    async fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> Result<()> {
        let scope = attached_scope(&self.node_ref(), self.attachment.as_ref(), session.id())?;
        for interface in self.interfaces.iter_mut().filter(|interface| interface.is_attached()) {
            interface.detach(session).await?;
        }
        scope.reenter(session).await?;
        session.write_with_response("no mpls ldp router-id").await?;
        self.attachment = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockRouter, started};

    fn ldp() -> Ldp {
        Ldp::new()
            .with_router_id("Loopback0")
            .with_interface(LdpInterface::new("GigabitEthernet0/1"))
    }

    #[tokio::test]
    async fn test_create() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut ldp = ldp();

        ldp.create(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "config term",
                "mpls label protocol ldp",
                "mpls ldp router-id Loopback0",
                "interface gigabitethernet0/1",
                "mpls ip",
                "exit",
            ]
        );
        assert!(ldp.interfaces()[0].is_attached());
    }

    #[tokio::test]
    async fn test_delete_disables_interfaces_first() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut ldp = ldp();
        ldp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        ldp.delete(&mut session).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec![
                "interface gigabitethernet0/1",
                "no mpls ip",
                "exit",
                "no mpls ldp router-id"
            ]
        );
        assert!(!ldp.interfaces()[0].is_attached());
    }

    #[tokio::test]
    async fn test_push_interface() {
        let mut session = started(MockRouter::new("R1")).await;
        let mut ldp = Ldp::new();
        ldp.create(&mut session).await.unwrap();
        session.transport_mut().clear_log();

        let core = Interface::new("GigabitEthernet0/2");
        ldp.push_interface(&mut session, LdpInterface::from(&core)).await.unwrap();

        assert_eq!(
            session.transport().issued(),
            vec!["interface gigabitethernet0/2", "mpls ip", "exit"]
        );
    }
}
