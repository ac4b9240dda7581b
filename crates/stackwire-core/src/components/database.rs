use super::{Component, ComponentOutput};
use crate::context::ComponentContext;
use crate::error::Result;
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{DatabaseHandle, Handle, SecretRef};
use crate::rules::{Peer, SecurityRule};
use async_trait::async_trait;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};

pub const POSTGRES_PORT: u16 = 5432;

const ENGINE: &str = "aurora-postgresql";
const ENGINE_VERSION: &str = "14.6";
const BACKUP_RETENTION_DAYS: u32 = 14;
const PASSWORD_LENGTH: u32 = 30;
/// Characters the generated password must not contain
const EXCLUDED_CHARACTERS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

const SECRET: &str = "secret";
const DB_SUBNET_GROUP: &str = "db-subnet-group";
const DATABASE_CLUSTER: &str = "database-cluster";

/// Serverless Postgres cluster with a writer and one reader, and the
/// credential secret it is created with
pub struct DatabaseComponent;

#[async_trait]
impl Component for DatabaseComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Database)
            .input(ComponentId::Network, "subnets")
            .input(ComponentId::Network, "groups")
            .output("endpoint")
            .output("secret")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let network = ctx.network()?;
        let settings = &ctx.settings().database;
        let capacity = ctx.capacity();

        // The secret is generated by the provider on first creation only;
        // later runs plan a no-op and get the same version back.
        let secret_key = ctx.resource_id("db-secret");
        let result = ctx
            .submit(ResourceSet::new().with(ResourceConfig::new(
                SECRET,
                &secret_key,
                json!({
                    "description": "Database credentials",
                    "generate": {
                        "username": settings.username,
                        "password_length": PASSWORD_LENGTH,
                        "exclude_characters": EXCLUDED_CHARACTERS,
                    },
                }),
            )))
            .await?;
        let secret = SecretRef {
            name: ctx.attribute(&result, SECRET, &secret_key, "name")?,
            arn: ctx.attribute(&result, SECRET, &secret_key, "arn")?,
            version_id: ctx.attribute(&result, SECRET, &secret_key, "version_id")?,
        };

        let subnet_group = ctx.resource_id("db-subnets");
        let cluster = ctx.resource_id("db");
        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                DB_SUBNET_GROUP,
                &subnet_group,
                json!({
                    "description": "Private subnets for the database",
                    "subnet_ids": network.private_subnet_ids,
                }),
            ))
            .with(ResourceConfig::new(
                DATABASE_CLUSTER,
                &cluster,
                json!({
                    "engine": ENGINE,
                    "engine_version": ENGINE_VERSION,
                    "serverless_v2": {
                        "min_capacity": capacity.database_min_capacity,
                        "max_capacity": capacity.database_max_capacity,
                    },
                    "writer": { "instance": "serverless" },
                    "readers": [{ "instance": "serverless", "scale_with_writer": true }],
                    "default_database_name": settings.name,
                    "port": POSTGRES_PORT,
                    "credentials_secret": secret.arn,
                    "backup_retention_days": BACKUP_RETENTION_DAYS,
                    "storage_encrypted": true,
                    "subnet_group": subnet_group,
                    "security_group_ids": [network.internal.id],
                }),
            ));

        let result = ctx.submit(resources).await?;
        let endpoint = ctx.attribute(&result, DATABASE_CLUSTER, &cluster, "endpoint")?;
        let read_endpoint = ctx.attribute(&result, DATABASE_CLUSTER, &cluster, "read_endpoint")?;

        let mut rules = SecurityRule::allow_from(
            &network.internal,
            Peer::Group(network.external.clone()),
            POSTGRES_PORT,
        );
        rules.extend(SecurityRule::allow_to(
            &network.internal,
            &network.external,
            POSTGRES_PORT,
        ));
        rules.extend(SecurityRule::allow_from(
            &network.internal,
            Peer::Cidr(settings.operator_cidr.clone()),
            POSTGRES_PORT,
        ));

        tracing::info!(%endpoint, secret_version = %secret.version_id, "database ready");
        Ok(ComponentOutput::new(Handle::Database(DatabaseHandle {
            endpoint,
            read_endpoint,
            port: POSTGRES_PORT,
            username: settings.username.clone(),
            database_name: settings.name.clone(),
            secret,
        }))
        .with_rules(rules))
    }
}
