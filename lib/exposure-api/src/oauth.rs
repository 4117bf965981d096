use serde::{Deserialize, Serialize};

/// OAuth2 access token response returned by the registry's token endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenRsp {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
