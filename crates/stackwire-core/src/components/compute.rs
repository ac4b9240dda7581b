use super::{Component, ComponentOutput, POSTGRES_PORT, REDIS_PORT};
use crate::context::ComponentContext;
use crate::error::Result;
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{ComputeHandle, Handle};
use crate::rules::{Peer, SecurityRule};
use crate::runtime::REQUIRED_KEYS;
use crate::scaling::ScalingPolicy;
use async_trait::async_trait;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};

/// Port the container and the load balancer listener serve on
pub const CONTAINER_PORT: u16 = 80;

const API_STAGE: &str = "prod";
const API_RESOURCE: &str = "v1";

const CONTAINER_CLUSTER: &str = "container-cluster";
const LOAD_BALANCER: &str = "load-balancer";
const CONTAINER_SERVICE: &str = "container-service";
const SECRET_GRANT: &str = "secret-grant";
const ROLE_POLICY: &str = "role-policy";
const SCALING_POLICY: &str = "scaling-policy";
const VPC_LINK: &str = "vpc-link";
const REST_API: &str = "rest-api";
const GATEWAY_ROUTE: &str = "gateway-route";

/// Load-balanced container service behind a REST gateway
pub struct ComputeComponent;

#[async_trait]
impl Component for ComputeComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Compute)
            .input(ComponentId::Network, "vpc")
            .input(ComponentId::Network, "subnets")
            .input(ComponentId::Network, "groups")
            .input(ComponentId::Cache, "endpoint")
            .input(ComponentId::Database, "endpoint")
            .input(ComponentId::Database, "secret")
            .input(ComponentId::Identity, "pool_id")
            .input(ComponentId::Identity, "client_id")
            .input(ComponentId::Identity, "authorizer")
            .input(ComponentId::Identity, "management_policy")
            .input(ComponentId::Edge, "domain")
            .output("service_url")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let runtime = ctx.runtime();
        runtime.require_all(ctx.component(), &REQUIRED_KEYS)?;

        let network = ctx.network()?;
        let database = ctx.database()?;
        let identity = ctx.identity()?;
        let edge = ctx.edge()?;
        let capacity = ctx.capacity();
        let deployment = ctx.deployment();
        let scaling = ScalingPolicy::for_capacity(capacity);

        // Service and everything attached to it
        let cluster_key = ctx.resource_id("cluster");
        let lb_key = ctx.resource_id("service-lb");
        let service_key = ctx.resource_id("service");
        let image = format!(
            "{}:{}",
            deployment.settings.registry.repository, deployment.version
        );

        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                CONTAINER_CLUSTER,
                &cluster_key,
                json!({ "vpc_id": network.vpc_id }),
            ))
            .with(ResourceConfig::new(
                LOAD_BALANCER,
                &lb_key,
                json!({
                    "type": "network",
                    "internal": true,
                    "listener_port": CONTAINER_PORT,
                    "subnet_ids": network.private_subnet_ids,
                }),
            ))
            .with(ResourceConfig::new(
                CONTAINER_SERVICE,
                &service_key,
                json!({
                    "cluster": cluster_key,
                    "load_balancer": lb_key,
                    "image": image,
                    "container_name": ctx.resource_id("services"),
                    "container_port": CONTAINER_PORT,
                    "desired_count": capacity.service_desired_count,
                    "cpu": capacity.service_cpu,
                    "memory_mib": capacity.service_memory_mib,
                    "runtime_platform": { "os": "linux", "architecture": "arm64" },
                    "assign_public_ip": false,
                    "circuit_breaker": { "rollback": true },
                    "enable_execute_command": true,
                    "enable_logging": true,
                    "environment": runtime.as_map(),
                    "secrets": {
                        "DB_PASSWORD": { "secret_arn": database.secret.arn, "field": "password" },
                    },
                    "subnet_ids": network.private_subnet_ids,
                    "security_group_ids": [network.external.id],
                }),
            ))
            .with(ResourceConfig::new(
                SECRET_GRANT,
                ctx.resource_id("service-db-secret-read"),
                json!({
                    "secret_arn": database.secret.arn,
                    "grantee": service_key,
                    "access": "read",
                }),
            ))
            .with(ResourceConfig::new(
                ROLE_POLICY,
                ctx.resource_id("service-identity-admin"),
                json!({
                    "role": service_key,
                    "statement": identity.management_policy,
                }),
            ))
            .with(ResourceConfig::new(
                SCALING_POLICY,
                ctx.resource_id("service-cpu-scaling"),
                json!({
                    "service": service_key,
                    "policy": scaling.to_config(),
                }),
            ));

        let result = ctx.submit(resources).await?;
        let cluster_name = ctx.attribute(&result, CONTAINER_CLUSTER, &cluster_key, "cluster_name")?;
        let service_name = ctx.attribute(&result, CONTAINER_SERVICE, &service_key, "service_name")?;
        let load_balancer_dns = ctx.attribute(&result, LOAD_BALANCER, &lb_key, "dns_name")?;
        let load_balancer_arn = ctx.attribute(&result, LOAD_BALANCER, &lb_key, "arn")?;

        // Private link from the gateway to the load balancer
        let link_key = ctx.resource_id("vpc-link");
        let result = ctx
            .submit(ResourceSet::new().with(ResourceConfig::new(
                VPC_LINK,
                &link_key,
                json!({ "target_arns": [load_balancer_arn] }),
            )))
            .await?;
        let vpc_link_id = ctx.attribute(&result, VPC_LINK, &link_key, "vpc_link_id")?;

        // Gateway with a single authorized catch-all route
        let api_key = ctx.resource_id("rest-api");
        let route_key = ctx.resource_id("v1-proxy");
        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                REST_API,
                &api_key,
                json!({
                    "stage": API_STAGE,
                    "api_key_source": "header",
                    "cors": {
                        "allow_origins": [edge.url()],
                        "allow_headers": ["*"],
                        "allow_methods": ["*"],
                    },
                }),
            ))
            .with(ResourceConfig::new(
                GATEWAY_ROUTE,
                &route_key,
                json!({
                    "rest_api": api_key,
                    "resource": API_RESOURCE,
                    "method": "ANY",
                    "path": format!("/{API_RESOURCE}/{{proxy+}}"),
                    "integration": {
                        "type": "http_proxy",
                        "uri": format!("http://{load_balancer_dns}/{{proxy}}"),
                        "connection_type": "vpc_link",
                        "vpc_link_id": vpc_link_id,
                        "request_parameters": {
                            "integration.request.path.proxy": "method.request.path.proxy",
                        },
                    },
                    "authorization": {
                        "type": "cognito",
                        "authorizer_id": identity.authorizer.id,
                    },
                }),
            ));

        let result = ctx.submit(resources).await?;
        let service_url = ctx.attribute(&result, REST_API, &api_key, "url")?;

        let mut rules = SecurityRule::allow_from(&network.external, Peer::any_ipv4(), CONTAINER_PORT);
        for port in [REDIS_PORT, POSTGRES_PORT] {
            rules.extend(SecurityRule::allow_to(&network.external, &network.internal, port));
        }

        tracing::info!(%service_url, %image, replicas = capacity.service_desired_count, "compute ready");
        Ok(ComponentOutput::new(Handle::Compute(ComputeHandle {
            service_url,
            cluster_name,
            service_name,
            load_balancer_dns,
            scaling,
        }))
        .with_rules(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::Fixture;
    use crate::error::ComposeError;
    use crate::profile::Profile;
    use crate::runtime::keys;
    use stackwire_cloud::CloudProvider;

    #[tokio::test]
    async fn test_missing_configuration_submits_nothing() {
        let fixture = Fixture::new(Profile::Staging);
        let descriptor = ComputeComponent.descriptor();

        let err = ComputeComponent
            .instantiate(&fixture.context(&descriptor))
            .await
            .unwrap_err();

        match err {
            ComposeError::Configuration { component, missing } => {
                assert_eq!(component, ComponentId::Compute);
                assert!(missing.contains(&keys::DB_HOST.to_string()));
                assert!(missing.contains(&keys::CORS_ORIGIN.to_string()));
                assert!(!missing.contains(&keys::PROFILE.to_string()));
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }

        assert!(fixture.provider.get_state().await.unwrap().is_empty());
    }

    #[test]
    fn test_descriptor_declares_runtime_sources() {
        let descriptor = ComputeComponent.descriptor();
        for producer in [
            ComponentId::Network,
            ComponentId::Cache,
            ComponentId::Database,
            ComponentId::Identity,
            ComponentId::Edge,
        ] {
            assert!(descriptor.declares_input_from(producer), "{producer}");
        }
    }
}
