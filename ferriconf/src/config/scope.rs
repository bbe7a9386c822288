//! Where a node lives in the tree, as seen from the device.
//!
//! A [`Scope`] is handed down by a parent while it applies its children.
//! A node keeps the scope it was applied under as its attachment: the
//! session it is materialized against, the lineage of its ancestors, and
//! the context-entry commands that lead from global configuration into its
//! parent's CLI context.

use std::fmt;

use crate::error::{ConfigError, Result};
use crate::session::{Session, SessionId};
use crate::transport::Transport;

/// Kind of a config node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Interface,
    Vrf,
    VrfAddressFamily,
    Bgp,
    BgpVrf,
    BgpAddressFamily,
    BgpNeighbor,
    BgpNeighborAddressFamily,
    Ospf,
    OspfArea,
    OspfInterface,
    Ldp,
    LdpInterface,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Interface => "interface",
            NodeKind::Vrf => "vrf",
            NodeKind::VrfAddressFamily => "vrf address-family",
            NodeKind::Bgp => "bgp",
            NodeKind::BgpVrf => "bgp vrf",
            NodeKind::BgpAddressFamily => "bgp address-family",
            NodeKind::BgpNeighbor => "bgp neighbor",
            NodeKind::BgpNeighborAddressFamily => "bgp neighbor address-family",
            NodeKind::Ospf => "ospf",
            NodeKind::OspfArea => "ospf area",
            NodeKind::OspfInterface => "ospf interface",
            NodeKind::Ldp => "ldp",
            NodeKind::LdpInterface => "ldp interface",
        }
    }
}

/// Non-owning identification of a node: its kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeRef {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.name)
    }
}

/// The parent context a node is applied under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    session: SessionId,
    lineage: Vec<NodeRef>,
    path: Vec<String>,
}

impl Scope {
    /// Device root: global configuration of `session`.
    pub fn root(session: SessionId) -> Self {
        Self {
            session,
            lineage: vec![],
            path: vec![],
        }
    }

    /// Scope for the children of `node`, in the same CLI context.
    pub fn child(&self, node: NodeRef) -> Self {
        let mut scope = self.clone();
        scope.lineage.push(node);
        scope
    }

    /// Scope for the children of `node`, which live inside the context
    /// entered by `command`.
    pub fn child_in(&self, node: NodeRef, command: impl Into<String>) -> Self {
        let mut scope = self.child(node);
        scope.path.push(command.into());
        scope
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Ancestors, outermost first.
    pub fn lineage(&self) -> &[NodeRef] {
        &self.lineage
    }

    /// The direct parent, `None` at the device root.
    pub fn parent(&self) -> Option<&NodeRef> {
        self.lineage.last()
    }

    /// Nearest ancestor of the given kind.
    pub fn ancestor(&self, kind: NodeKind) -> Option<&NodeRef> {
        self.lineage.iter().rev().find(|node| node.kind == kind)
    }

    /// Name of the nearest ancestor of `kind`, or a tree-consistency error
    /// naming `node` when the scope has no such ancestor.
    pub fn require(&self, kind: NodeKind, node: &NodeRef) -> Result<&str> {
        self.ancestor(kind)
            .map(|ancestor| ancestor.name.as_str())
            .ok_or_else(|| {
                ConfigError::NotAttached {
                    node: format!("{} (no {} ancestor)", node, kind.as_str()),
                }
                .into()
            })
    }

    /// Context-entry commands from global configuration, outermost first.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Move the session to global configuration and replay the path.
    pub async fn reenter<T: Transport>(&self, session: &mut Session<T>) -> Result<()> {
        session.to_config().await?;
        for command in &self.path {
            session.write_with_response(command).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_nesting() {
        let id = SessionId::next();
        let bgp = NodeRef::new(NodeKind::Bgp, "65000");
        let vrf = NodeRef::new(NodeKind::BgpVrf, "RED");

        let scope = Scope::root(id)
            .child_in(bgp.clone(), "router bgp 65000")
            .child(vrf.clone());

        assert_eq!(scope.session(), id);
        assert_eq!(scope.lineage(), &[bgp.clone(), vrf.clone()]);
        assert_eq!(scope.parent(), Some(&vrf));
        assert_eq!(scope.path(), &["router bgp 65000".to_string()]);
        assert_eq!(scope.ancestor(NodeKind::Bgp), Some(&bgp));
        assert!(scope.ancestor(NodeKind::Ospf).is_none());
    }

    #[test]
    fn test_require_missing_ancestor() {
        let scope = Scope::root(SessionId::next());
        let node = NodeRef::new(NodeKind::OspfInterface, "gi0/1");
        let err = scope.require(NodeKind::Ospf, &node).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config error: ospf interface gi0/1 (no ospf ancestor) is not attached to a device"
        );
    }
}
