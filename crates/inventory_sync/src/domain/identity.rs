use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

/// Header carrying the tenant identity on every outbound inventory call
pub const IDENTITY_HEADER: &str = "x-rh-identity";

#[derive(Serialize)]
struct IdentityEnvelope<'a> {
    identity: AccountIdentity<'a>,
}

#[derive(Serialize)]
struct AccountIdentity<'a> {
    account_number: &'a str,
}

/// Opaque per-tenant credential: base64 of `{"identity":{"account_number":..}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn encode(tenant_account: &str) -> Self {
        let envelope = IdentityEnvelope {
            identity: AccountIdentity {
                account_number: tenant_account,
            },
        };
        // Serializing two borrowed-str structs cannot fail
        let json = serde_json::to_vec(&envelope).unwrap_or_default();
        Self(STANDARD.encode(json))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
