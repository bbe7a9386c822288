//! Declarative configuration tree.
//!
//! Device configuration is modeled as a tree of nodes that render
//! themselves into CLI commands. A node is constructed detached and only
//! records its desired state; applying it materializes that state on a
//! device session, after which mutations are pushed immediately:
//!
//! ```text
//!            apply / create
//! Unattached ───────────────► Attached ──┐ mutations push commands
//!      ▲                         │  ▲    │
//!      └─────── detach ──────────┘  └────┘ apply again: resync
//! ```
//!
//! Parents own their children. A child refers back to its parent and to
//! its session only through the [`Scope`] it was applied under.
//!
//! ```rust,no_run
//! use ferriconf::config::{AddressFamily, Bgp, BgpAddressFamily, BgpNeighbor, BgpVrf};
//! use ferriconf::{SessionBuilder, TelnetConfig};
//!
//! # async fn example() -> Result<(), ferriconf::Error> {
//! let mut session = SessionBuilder::new().telnet(TelnetConfig::new("192.0.2.10"));
//! session.start().await?;
//!
//! let mut vrf = BgpVrf::default_vrf();
//! vrf.add_neighbor(BgpNeighbor::new("10.0.0.2", 65000).with_update_source("Loopback0"));
//! vrf.add_family(BgpAddressFamily::new(AddressFamily::Ipv4Unicast).with_feature("redistribute connected")?);
//!
//! let mut bgp = Bgp::new(65000);
//! bgp.add_vrf(vrf);
//! bgp.create(&mut session).await?;
//! # Ok(())
//! # }
//! ```

mod bgp;
mod feature;
mod interface;
mod inventory;
mod ldp;
mod ospf;
mod scope;
mod vrf;

pub use bgp::{AddressFamily, Bgp, BgpAddressFamily, BgpNeighbor, BgpNeighborAddressFamily, BgpVrf};
pub use feature::{FeatureChange, FeatureSet, normalize};
pub use interface::{Interface, InterfaceSetting, Ipv4Prefix};
pub use inventory::{list_interfaces, list_vrfs, local_bgp_as, parse_interfaces, parse_local_as, parse_vrfs};
pub use ldp::{Ldp, LdpInterface};
pub use ospf::{NetworkType, Ospf, OspfArea, OspfInterface};
pub use scope::{NodeKind, NodeRef, Scope};
pub use vrf::{Vrf, VrfAddressFamily, VrfAddressFamilyKind};

use std::future::Future;

use crate::error::{ConfigError, Result};
use crate::session::{Session, SessionId};
use crate::transport::Transport;

/// A node of the configuration tree.
pub trait ConfigNode: Send {
    /// Kind and normalized name of this node.
    fn node_ref(&self) -> NodeRef;

    /// The scope this node was applied under, if attached.
    fn attachment(&self) -> Option<&Scope>;

    /// Whether the node is materialized on a device.
    fn is_attached(&self) -> bool {
        self.attachment().is_some()
    }

    /// Materialize this node (and its children, in a fixed order) under
    /// `scope`. The session must already be in the parent's CLI context.
    ///
    /// Applying an attached node resynchronizes it without re-issuing the
    /// creation commands of children that are already attached.
    fn apply<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        scope: &Scope,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove this node from the device: children first, then the node's
    /// own removal command, then the attachment is cleared.
    fn detach<T: Transport>(&mut self, session: &mut Session<T>) -> impl Future<Output = Result<()>> + Send;
}

/// Trim and collapse internal whitespace of a node name.
pub(crate) fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The scope of a node that must be attached through `session`.
pub(crate) fn attached_scope(node: &NodeRef, attachment: Option<&Scope>, session: SessionId) -> Result<Scope> {
    match attachment {
        None => Err(ConfigError::NotAttached {
            node: node.to_string(),
        }
        .into()),
        Some(scope) if scope.session() != session => Err(ConfigError::ForeignSession {
            node: node.to_string(),
        }
        .into()),
        Some(scope) => Ok(scope.clone()),
    }
}

/// Refuse to touch a node that is materialized through another session.
pub(crate) fn check_session(node: &NodeRef, attachment: Option<&Scope>, session: SessionId) -> Result<()> {
    match attachment {
        Some(scope) if scope.session() != session => Err(ConfigError::ForeignSession {
            node: node.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// Scope of a top-level node: where it is attached, or the device root.
pub(crate) fn top_level_scope(node: &NodeRef, attachment: Option<&Scope>, session: SessionId) -> Result<Scope> {
    check_session(node, attachment, session)?;
    Ok(attachment.cloned().unwrap_or_else(|| Scope::root(session)))
}

/// Send each command in order, stopping at the first failure.
pub(crate) async fn write_all<T: Transport>(session: &mut Session<T>, commands: &[String]) -> Result<()> {
    for command in commands {
        session.write_with_response(command).await?;
    }
    Ok(())
}

/// Pop one CLI context level.
pub(crate) async fn exit_level<T: Transport>(session: &mut Session<T>) -> Result<()> {
    let exit = session.platform().exit_command.clone();
    session.write_with_response(&exit).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  GigabitEthernet0/1 \t"), "GigabitEthernet0/1");
        assert_eq!(normalize_name("my   vrf"), "my vrf");
    }

    #[test]
    fn test_attachment_checks() {
        let node = NodeRef::new(NodeKind::Vrf, "RED");
        let mine = SessionId::next();
        let other = SessionId::next();
        let scope = Scope::root(mine);

        assert!(attached_scope(&node, None, mine).is_err());
        assert_eq!(attached_scope(&node, Some(&scope), mine).unwrap(), scope);
        assert!(matches!(
            attached_scope(&node, Some(&scope), other),
            Err(crate::Error::Config(ConfigError::ForeignSession { .. }))
        ));
        assert!(check_session(&node, None, other).is_ok());
        assert_eq!(top_level_scope(&node, None, other).unwrap(), Scope::root(other));
    }
}
