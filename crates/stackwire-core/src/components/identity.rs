use super::{Component, ComponentOutput};
use crate::context::ComponentContext;
use crate::error::{ComposeError, Result};
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{Authorizer, Handle, IdentityHandle, PolicyStatement};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};

/// Administrative actions the service may perform on its own pool
pub const MANAGEMENT_ACTIONS: [&str; 5] = [
    "cognito-idp:AdminCreateUser",
    "cognito-idp:AdminUpdateUserAttributes",
    "cognito-idp:AdminGetUser",
    "cognito-idp:AdminDisableUser",
    "cognito-idp:AdminEnableUser",
];

const AUTHORIZATION_HEADER: &str = "method.request.header.Authorization";

const USER_POOL: &str = "user-pool";
const USER_POOL_CLIENT: &str = "user-pool-client";
const AUTHORIZER: &str = "authorizer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordPolicy {
    pub min_length: u32,
    pub require_digits: bool,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digits: true,
            require_uppercase: true,
            require_lowercase: true,
            require_symbols: true,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password against the policy
    pub fn accepts(&self, password: &str) -> bool {
        password.chars().count() >= self.min_length as usize
            && (!self.require_digits || password.chars().any(|c| c.is_ascii_digit()))
            && (!self.require_uppercase || password.chars().any(|c| c.is_uppercase()))
            && (!self.require_lowercase || password.chars().any(|c| c.is_lowercase()))
            && (!self.require_symbols || password.chars().any(|c| c.is_ascii_punctuation()))
    }
}

/// Token lifetimes, in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenValidity {
    pub access_days: u32,
    pub id_days: u32,
    pub refresh_days: u32,
}

impl Default for TokenValidity {
    fn default() -> Self {
        Self {
            access_days: 7,
            id_days: 3,
            refresh_days: 30,
        }
    }
}

/// User pool, app client and request authorizer
pub struct IdentityComponent;

#[async_trait]
impl Component for IdentityComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Identity)
            .output("pool_id")
            .output("client_id")
            .output("authorizer")
            .output("management_policy")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let pool_key = ctx.resource_id("user-pool");
        let result = ctx
            .submit(ResourceSet::new().with(ResourceConfig::new(
                USER_POOL,
                &pool_key,
                json!({
                    "standard_attributes": {
                        "email": { "required": true, "mutable": true },
                        "phone_number": { "required": false, "mutable": true },
                    },
                    "password_policy": PasswordPolicy::default(),
                    "self_sign_up": true,
                    "sign_in_aliases": ["username", "email"],
                }),
            )))
            .await?;
        let pool_id = ctx.attribute(&result, USER_POOL, &pool_key, "pool_id")?;
        let pool_arn = ctx.attribute(&result, USER_POOL, &pool_key, "arn")?;

        let client_key = ctx.resource_id("pool-client");
        let authorizer_key = ctx.resource_id("authorizer");
        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                USER_POOL_CLIENT,
                &client_key,
                json!({
                    "user_pool_id": pool_id,
                    "token_validity": TokenValidity::default(),
                    "enable_token_revocation": true,
                }),
            ))
            .with(ResourceConfig::new(
                AUTHORIZER,
                &authorizer_key,
                json!({
                    "type": "user_pools",
                    "provider_arns": [pool_arn],
                    "identity_source": AUTHORIZATION_HEADER,
                }),
            ));

        let result = ctx.submit(resources).await?;
        let client_id = ctx.attribute(&result, USER_POOL_CLIENT, &client_key, "client_id")?;
        let authorizer = Authorizer {
            id: ctx.attribute(&result, AUTHORIZER, &authorizer_key, "authorizer_id")?,
            name: authorizer_key,
            identity_source: AUTHORIZATION_HEADER.to_string(),
        };

        let management_policy = PolicyStatement::new(MANAGEMENT_ACTIONS, [pool_arn.clone()])
            .map_err(|e| ComposeError::definition(ctx.component(), e.to_string()))?;

        tracing::info!(%pool_id, %client_id, "identity ready");
        Ok(ComponentOutput::new(Handle::Identity(IdentityHandle {
            pool_id,
            pool_arn,
            client_id,
            authorizer,
            management_policy,
        })))
    }
}
