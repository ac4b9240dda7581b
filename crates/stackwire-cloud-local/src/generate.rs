//! Attribute generation for simulated resources

use rand::Rng;
use serde_json::{Value, json};
use stackwire_cloud::{CloudError, ResourceConfig, ResourceState, ResourceStatus, Result};

/// Account id used in generated ARNs
const ACCOUNT: &str = "000000000000";

const HEX: &[u8] = b"0123456789abcdef";
const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MIXED_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const DEFAULT_PASSWORD_LENGTH: usize = 32;

/// Attribute holding a secret's value; never leaves the provider state
pub(crate) const SECRET_STRING: &str = "secret_string";

/// Resource types the local provider knows how to create
pub const SUPPORTED_TYPES: &[&str] = &[
    "vpc",
    "subnet",
    "security-group",
    "security-rule",
    "cache-subnet-group",
    "cache-cluster",
    "secret",
    "db-subnet-group",
    "database-cluster",
    "user-pool",
    "user-pool-client",
    "authorizer",
    "bucket",
    "distribution",
    "container-cluster",
    "load-balancer",
    "container-service",
    "secret-grant",
    "role-policy",
    "scaling-policy",
    "vpc-link",
    "rest-api",
    "gateway-route",
];

fn token(len: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

fn arn(service: &str, region: &str, resource: &str) -> String {
    format!("arn:local:{service}:{region}:{ACCOUNT}:{resource}")
}

fn config_str<'a>(resource: &'a ResourceConfig, key: &str) -> Option<&'a str> {
    resource.config.get(key).and_then(Value::as_str)
}

/// Generate a password from printable ASCII minus `exclude`
fn password(length: usize, exclude: &str) -> Result<String> {
    let charset: Vec<u8> = (b'!'..=b'~')
        .filter(|c| !exclude.contains(*c as char))
        .collect();
    if charset.is_empty() {
        return Err(CloudError::InvalidRequest(
            "password generation excludes every character".to_string(),
        ));
    }
    Ok(token(length, &charset))
}

fn secret_string(resource: &ResourceConfig) -> Result<Value> {
    let generate = resource.config.get("generate").ok_or_else(|| {
        CloudError::InvalidRequest(format!("{} has no generate section", resource.key()))
    })?;
    let username = generate
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let length = generate
        .get("password_length")
        .and_then(Value::as_u64)
        .map_or(DEFAULT_PASSWORD_LENGTH, |l| l as usize);
    let exclude = generate
        .get("exclude_characters")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(json!({
        "username": username,
        "password": password(length, exclude)?,
    }))
}

/// Build the state of a newly created resource
pub fn create(resource: &ResourceConfig, region: &str) -> Result<ResourceState> {
    let id = resource.id.as_str();
    let lower = id.to_lowercase();
    let state = ResourceState::new(id, &resource.resource_type).with_status(ResourceStatus::Available);

    let state = match resource.resource_type.as_str() {
        "vpc" => state
            .with_attribute("vpc_id", json!(format!("vpc-{}", token(17, HEX))))
            .with_attribute("cidr", json!(config_str(resource, "cidr"))),
        "subnet" => state
            .with_attribute("subnet_id", json!(format!("subnet-{}", token(17, HEX))))
            .with_attribute("cidr", json!(config_str(resource, "cidr")))
            .with_attribute(
                "availability_zone",
                json!(config_str(resource, "availability_zone")),
            ),
        "security-group" => {
            state.with_attribute("group_id", json!(format!("sg-{}", token(17, HEX))))
        }
        "security-rule" => {
            state.with_attribute("rule_id", json!(format!("sgr-{}", token(17, HEX))))
        }
        "cache-subnet-group" | "db-subnet-group" => state.with_attribute("name", json!(lower)),
        "cache-cluster" => state
            .with_attribute(
                "endpoint",
                json!(format!(
                    "clustercfg.{lower}.{}.{region}.cache.local",
                    token(6, LOWER_ALNUM)
                )),
            )
            .with_attribute("port", resource.config.get("port").cloned().unwrap_or(Value::Null)),
        "secret" => {
            let suffix = token(6, MIXED_ALNUM);
            state
                .with_attribute("name", json!(id))
                .with_attribute(
                    "arn",
                    json!(arn("secretsmanager", region, &format!("secret:{id}-{suffix}"))),
                )
                .with_attribute("version_id", json!(token(32, HEX)))
                .with_attribute(SECRET_STRING, secret_string(resource)?)
        }
        "database-cluster" => {
            let cluster = token(12, LOWER_ALNUM);
            state
                .with_attribute(
                    "endpoint",
                    json!(format!("{lower}.cluster-{cluster}.{region}.rds.local")),
                )
                .with_attribute(
                    "read_endpoint",
                    json!(format!("{lower}.cluster-ro-{cluster}.{region}.rds.local")),
                )
                .with_attribute("port", resource.config.get("port").cloned().unwrap_or(Value::Null))
        }
        "user-pool" => {
            let pool_id = format!("{region}_{}", token(9, MIXED_ALNUM));
            state
                .with_attribute("arn", json!(arn("cognito-idp", region, &format!("userpool/{pool_id}"))))
                .with_attribute("pool_id", json!(pool_id))
        }
        "user-pool-client" => state.with_attribute("client_id", json!(token(26, LOWER_ALNUM))),
        "authorizer" => state.with_attribute("authorizer_id", json!(token(6, LOWER_ALNUM))),
        "bucket" => state.with_attribute("bucket_name", json!(lower)),
        "distribution" => state
            .with_attribute("domain_name", json!(format!("d{}.cdn.local", token(13, LOWER_ALNUM))))
            .with_attribute("distribution_id", json!(format!("E{}", token(13, UPPER_ALNUM)))),
        "container-cluster" => state
            .with_attribute("cluster_name", json!(id))
            .with_attribute("arn", json!(arn("ecs", region, &format!("cluster/{id}")))),
        "load-balancer" => state
            .with_attribute(
                "dns_name",
                json!(format!("{lower}-{}.elb.{region}.local", token(16, HEX))),
            )
            .with_attribute(
                "arn",
                json!(arn(
                    "elasticloadbalancing",
                    region,
                    &format!("loadbalancer/net/{id}/{}", token(16, HEX))
                )),
            ),
        "container-service" => state
            .with_attribute("service_name", json!(id))
            .with_attribute("image", json!(config_str(resource, "image").unwrap_or_default()))
            .with_attribute("arn", json!(arn("ecs", region, &format!("service/{id}")))),
        "vpc-link" => state.with_attribute("vpc_link_id", json!(token(6, LOWER_ALNUM))),
        "rest-api" => {
            let api_id = token(10, LOWER_ALNUM);
            let stage = config_str(resource, "stage").unwrap_or("prod");
            state
                .with_attribute(
                    "url",
                    json!(format!("https://{api_id}.execute-api.{region}.local/{stage}/")),
                )
                .with_attribute("api_id", json!(api_id))
        }
        "secret-grant" | "role-policy" | "scaling-policy" | "gateway-route" => state,
        other => {
            return Err(CloudError::InvalidRequest(format!(
                "unsupported resource type '{other}'"
            )));
        }
    };

    Ok(state)
}

/// Copy of `state` safe to hand back to callers
pub fn redact(state: &ResourceState) -> ResourceState {
    let mut redacted = state.clone();
    redacted.attributes.remove(SECRET_STRING);
    redacted
}
