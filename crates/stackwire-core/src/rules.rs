//! Security policy rules
//!
//! Rules are additive. Components declare the rules they need and the
//! composition root collects them into a [`SecurityRuleSet`], which has no
//! removal operation. A rule's provider id is derived from its fields, so the
//! same rule declared twice (by two components, or by two runs) is one
//! resource.

use serde::{Deserialize, Serialize};
use serde_json::json;
use stackwire_cloud::ResourceConfig;
use std::collections::BTreeSet;

/// Resource type under which rules are submitted
pub const SECURITY_RULE: &str = "security-rule";

/// Reference to a security policy group created by the network component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    /// Provider-generated group id
    pub id: String,
    /// Group name, unique within the stack
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    Group(SecurityGroupRef),
    Cidr(String),
}

impl Peer {
    pub fn any_ipv4() -> Self {
        Peer::Cidr("0.0.0.0/0".to_string())
    }

    fn slug(&self) -> String {
        match self {
            Peer::Group(group) => group.name.clone(),
            Peer::Cidr(cidr) => cidr.replace(['.', '/'], "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// A single traffic rule attached to `group`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub group: SecurityGroupRef,
    pub peer: Peer,
    pub protocol: Protocol,
    pub port: u16,
    pub direction: Direction,
}

impl SecurityRule {
    /// Let `peer` reach `group` on `port`.
    ///
    /// When the peer is itself a group, the matching egress rule on the peer
    /// is declared too.
    pub fn allow_from(group: &SecurityGroupRef, peer: Peer, port: u16) -> Vec<SecurityRule> {
        let mut rules = Vec::with_capacity(2);
        if let Peer::Group(source) = &peer {
            rules.push(SecurityRule {
                group: source.clone(),
                peer: Peer::Group(group.clone()),
                protocol: Protocol::Tcp,
                port,
                direction: Direction::Egress,
            });
        }
        rules.push(SecurityRule {
            group: group.clone(),
            peer,
            protocol: Protocol::Tcp,
            port,
            direction: Direction::Ingress,
        });
        rules
    }

    /// Let `group` reach `target` on `port` (egress on `group`, ingress on `target`)
    pub fn allow_to(
        group: &SecurityGroupRef,
        target: &SecurityGroupRef,
        port: u16,
    ) -> Vec<SecurityRule> {
        SecurityRule::allow_from(target, Peer::Group(group.clone()), port)
    }

    /// Deterministic provider id
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.group.name,
            self.direction,
            self.protocol,
            self.port,
            self.peer.slug()
        )
    }

    pub fn to_resource(&self) -> ResourceConfig {
        let peer = match &self.peer {
            Peer::Group(group) => json!({ "group_id": group.id }),
            Peer::Cidr(cidr) => json!({ "cidr": cidr }),
        };
        ResourceConfig::new(
            SECURITY_RULE,
            self.id(),
            json!({
                "group_id": self.group.id,
                "direction": self.direction,
                "protocol": self.protocol,
                "port": self.port,
                "peer": peer,
            }),
        )
    }
}

/// Accumulated rules of a deployment. Additive only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityRuleSet {
    rules: BTreeSet<SecurityRule>,
}

impl SecurityRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the rule was already present
    pub fn insert(&mut self, rule: SecurityRule) -> bool {
        self.rules.insert(rule)
    }

    pub fn contains(&self, rule: &SecurityRule) -> bool {
        self.rules.contains(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityRule> {
        self.rules.iter()
    }
}

impl Extend<SecurityRule> for SecurityRuleSet {
    fn extend<I: IntoIterator<Item = SecurityRule>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}
