use super::{Component, ComponentOutput};
use crate::context::ComponentContext;
use crate::error::{ComposeError, Result};
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{Handle, NetworkHandle};
use crate::rules::SecurityGroupRef;
use async_trait::async_trait;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};
use std::net::Ipv4Addr;

const VPC: &str = "vpc";
const SUBNET: &str = "subnet";
const SECURITY_GROUP: &str = "security-group";

/// VPC with public and private subnets in each availability zone, plus the
/// internal and external security groups
pub struct NetworkComponent;

#[async_trait]
impl Component for NetworkComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Network)
            .output("vpc")
            .output("subnets")
            .output("groups")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let network = &ctx.settings().network;
        let region = &ctx.settings().region;
        let zones = usize::from(network.max_azs);

        let cidrs = subnet_cidrs(&network.cidr, network.subnet_mask, zones * 2)
            .map_err(|message| ComposeError::definition(ctx.component(), message))?;

        let vpc_key = ctx.resource_id("vpc");
        let result = ctx
            .submit(ResourceSet::new().with(ResourceConfig::new(
                VPC,
                &vpc_key,
                json!({
                    "cidr": network.cidr,
                    "max_azs": network.max_azs,
                    "nat_gateways": 1,
                }),
            )))
            .await?;
        let vpc_id = ctx.attribute(&result, VPC, &vpc_key, "vpc_id")?;

        let mut resources = ResourceSet::new();
        let mut public = Vec::with_capacity(zones);
        let mut private = Vec::with_capacity(zones);
        for (index, cidr) in cidrs.iter().enumerate() {
            let zone = index % zones;
            let (tier, keys) = if index < zones {
                ("public", &mut public)
            } else {
                ("private", &mut private)
            };
            let key = ctx.resource_id(&format!("{tier}-{zone}"));
            resources.add(ResourceConfig::new(
                SUBNET,
                &key,
                json!({
                    "vpc_id": vpc_id,
                    "cidr": cidr,
                    "availability_zone": availability_zone(region, zone),
                    "tier": tier,
                }),
            ));
            keys.push(key);
        }

        let internal_key = ctx.resource_id("internal");
        let external_key = ctx.resource_id("external");
        resources.add(ResourceConfig::new(
            SECURITY_GROUP,
            &external_key,
            json!({
                "vpc_id": vpc_id,
                "description": "Service-facing traffic",
                "allow_all_outbound": true,
            }),
        ));
        resources.add(ResourceConfig::new(
            SECURITY_GROUP,
            &internal_key,
            json!({
                "vpc_id": vpc_id,
                "description": "Data tier traffic",
                "allow_all_outbound": false,
            }),
        ));

        let result = ctx.submit(resources).await?;

        let subnet_ids = |keys: &[String]| -> Result<Vec<String>> {
            keys.iter()
                .map(|key| ctx.attribute(&result, SUBNET, key, "subnet_id"))
                .collect()
        };
        let group = |key: &str| -> Result<SecurityGroupRef> {
            Ok(SecurityGroupRef {
                id: ctx.attribute(&result, SECURITY_GROUP, key, "group_id")?,
                name: key.to_string(),
            })
        };

        let handle = NetworkHandle {
            vpc_id,
            cidr: network.cidr.clone(),
            public_subnet_ids: subnet_ids(&public)?,
            private_subnet_ids: subnet_ids(&private)?,
            internal: group(&internal_key)?,
            external: group(&external_key)?,
        };

        tracing::info!(
            vpc = %handle.vpc_id,
            subnets = handle.public_subnet_ids.len() + handle.private_subnet_ids.len(),
            "network ready"
        );
        Ok(ComponentOutput::new(Handle::Network(handle)))
    }
}

fn availability_zone(region: &str, zone: usize) -> String {
    let suffix = (b'a' + (zone % 26) as u8) as char;
    format!("{region}{suffix}")
}

/// Split `cidr` into `count` consecutive blocks of size `/mask`
fn subnet_cidrs(cidr: &str, mask: u8, count: usize) -> std::result::Result<Vec<String>, String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("invalid CIDR block '{cidr}'"))?;
    let address: Ipv4Addr = address
        .parse()
        .map_err(|_| format!("invalid CIDR block '{cidr}'"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("invalid CIDR block '{cidr}'"))?;

    if prefix > 32 || mask > 32 || mask < prefix {
        return Err(format!("cannot split '{cidr}' into /{mask} subnets"));
    }

    let available = 1u64 << (mask - prefix);
    if count as u64 > available {
        return Err(format!(
            "'{cidr}' holds {available} /{mask} subnets, {count} requested"
        ));
    }

    let network_mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let base = u32::from(address) & network_mask;
    let step = 1u64 << (32 - mask);

    Ok((0..count as u64)
        .map(|i| {
            let start = (u64::from(base) + i * step) as u32;
            format!("{}/{}", Ipv4Addr::from(start), mask)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::Fixture;
    use crate::profile::Profile;

    #[test]
    fn test_subnet_cidrs() {
        assert_eq!(
            subnet_cidrs("10.0.0.0/16", 24, 4).unwrap(),
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]
        );
        assert_eq!(
            subnet_cidrs("172.16.4.0/22", 24, 2).unwrap(),
            vec!["172.16.4.0/24", "172.16.5.0/24"]
        );
    }

    #[test]
    fn test_subnet_cidrs_rejects_overflow() {
        assert!(subnet_cidrs("10.0.0.0/24", 24, 2).is_err());
        assert!(subnet_cidrs("10.0.0.0/24", 16, 1).is_err());
        assert!(subnet_cidrs("not-a-cidr", 24, 1).is_err());
    }

    #[test]
    fn test_availability_zone() {
        assert_eq!(availability_zone("us-east-1", 0), "us-east-1a");
        assert_eq!(availability_zone("us-east-1", 1), "us-east-1b");
    }

    #[tokio::test]
    async fn test_network_handle() {
        let fixture = Fixture::new(Profile::Staging);
        let descriptor = NetworkComponent.descriptor();

        let output = NetworkComponent
            .instantiate(&fixture.context(&descriptor))
            .await
            .unwrap();

        let Handle::Network(network) = output.handle else {
            panic!("expected a network handle");
        };
        assert_eq!(network.cidr, "10.0.0.0/16");
        assert_eq!(network.public_subnet_ids.len(), 2);
        assert_eq!(network.private_subnet_ids.len(), 2);
        assert_ne!(network.internal.id, network.external.id);
        assert_eq!(network.internal.name, "InfraStack-internal");
        assert!(output.rules.is_empty());
    }
}
