//! Provider endpoint layout derived from the configured base URL and realm

use crate::client::error::ClientError;
use stride_core::IdentityConfig;
use url::Url;

/// OpenID Connect endpoints of one realm
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub issuer: Url,
    pub authorization: Url,
    pub token: Url,
    pub end_session: Url,
}

impl ProviderEndpoints {
    /// `{url}/realms/{realm}/protocol/openid-connect/{auth,token,logout}`
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ClientError> {
        if config.realm.is_empty() {
            return Err(ClientError::Configuration("realm is required".into()));
        }
        if config.client_id.is_empty() {
            return Err(ClientError::Configuration("client_id is required".into()));
        }

        let base = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| ClientError::Configuration(format!("invalid provider url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!(
                "provider url cannot be a base: {base}"
            )));
        }

        let issuer = join(&base, &["realms", &config.realm])?;
        let protocol = |endpoint: &str| {
            join(
                &base,
                &["realms", &config.realm, "protocol", "openid-connect", endpoint],
            )
        };

        Ok(Self {
            issuer,
            authorization: protocol("auth")?,
            token: protocol("token")?,
            end_session: protocol("logout")?,
        })
    }
}

fn join(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ClientError::Configuration(format!("provider url cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
