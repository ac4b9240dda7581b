use super::{Component, ComponentOutput};
use crate::context::ComponentContext;
use crate::error::Result;
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{CacheHandle, Handle};
use crate::rules::{Peer, SecurityRule};
use async_trait::async_trait;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};

pub const REDIS_PORT: u16 = 6379;

const ENGINE_VERSION: &str = "7.0";
const CACHE_MODE: &str = "cluster";

const CACHE_SUBNET_GROUP: &str = "cache-subnet-group";
const CACHE_CLUSTER: &str = "cache-cluster";

/// Redis replication group in the private subnets
pub struct CacheComponent;

#[async_trait]
impl Component for CacheComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Cache)
            .input(ComponentId::Network, "vpc")
            .input(ComponentId::Network, "subnets")
            .input(ComponentId::Network, "groups")
            .output("endpoint")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let network = ctx.network()?;
        let capacity = ctx.capacity();

        let subnet_group = ctx.resource_id("cache-subnets");
        let cluster = ctx.resource_id("cache");

        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                CACHE_SUBNET_GROUP,
                &subnet_group,
                json!({
                    "description": "Private subnets for the cache",
                    "subnet_ids": network.private_subnet_ids,
                }),
            ))
            .with(ResourceConfig::new(
                CACHE_CLUSTER,
                &cluster,
                json!({
                    "engine": "redis",
                    "engine_version": ENGINE_VERSION,
                    "node_type": capacity.cache_node_type.as_str(),
                    "num_nodes": capacity.cache_nodes,
                    "cluster_mode": true,
                    "port": REDIS_PORT,
                    "subnet_group": subnet_group,
                    "security_group_ids": [network.internal.id],
                }),
            ));

        let result = ctx.submit(resources).await?;
        let endpoint = ctx.attribute(&result, CACHE_CLUSTER, &cluster, "endpoint")?;

        let mut rules = SecurityRule::allow_from(
            &network.internal,
            Peer::Group(network.external.clone()),
            REDIS_PORT,
        );
        rules.extend(SecurityRule::allow_to(
            &network.internal,
            &network.external,
            REDIS_PORT,
        ));
        rules.extend(SecurityRule::allow_from(
            &network.internal,
            Peer::Cidr(network.cidr.clone()),
            REDIS_PORT,
        ));

        tracing::info!(%endpoint, nodes = capacity.cache_nodes, "cache ready");
        Ok(ComponentOutput::new(Handle::Cache(CacheHandle {
            endpoint,
            port: REDIS_PORT,
            mode: CACHE_MODE.to_string(),
        }))
        .with_rules(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::NetworkComponent;
    use crate::components::testing::Fixture;
    use crate::profile::Profile;
    use crate::rules::Direction;

    #[tokio::test]
    async fn test_cache_rules_and_handle() {
        let mut fixture = Fixture::new(Profile::Staging);
        let network = NetworkComponent.descriptor();
        let output = NetworkComponent
            .instantiate(&fixture.context(&network))
            .await
            .unwrap();
        fixture.provide(output.handle);

        let descriptor = CacheComponent.descriptor();
        let output = CacheComponent
            .instantiate(&fixture.context(&descriptor))
            .await
            .unwrap();

        let Handle::Cache(cache) = &output.handle else {
            panic!("expected a cache handle");
        };
        assert_eq!(cache.port, 6379);
        assert_eq!(cache.mode, "cluster");
        assert!(!cache.endpoint.is_empty());

        assert!(output.rules.iter().all(|r| r.port == REDIS_PORT));
        let cidr_ingress = output
            .rules
            .iter()
            .filter(|r| r.direction == Direction::Ingress && r.peer == Peer::Cidr("10.0.0.0/16".into()))
            .count();
        assert_eq!(cidr_ingress, 1);
    }

    #[tokio::test]
    async fn test_cache_requires_network() {
        let fixture = Fixture::new(Profile::Staging);
        let descriptor = CacheComponent.descriptor();

        let err = CacheComponent
            .instantiate(&fixture.context(&descriptor))
            .await
            .unwrap_err();
        assert!(err.is_graph_error());
    }
}
