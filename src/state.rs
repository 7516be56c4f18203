use crate::{
    config::AppConfig,
    services::{
        identity_gate::{AllowList, IdentityProviderConfig},
        photo_gateway::PhotoGateway,
    },
};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: PhotoGateway,
    pub allow_list: Arc<AllowList>,
    pub identity: Arc<IdentityProviderConfig>,
}

impl AppState {
    pub fn new(
        gateway: PhotoGateway,
        allow_list: AllowList,
        identity: IdentityProviderConfig,
    ) -> Self {
        Self {
            gateway,
            allow_list: Arc::new(allow_list),
            identity: Arc::new(identity),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            PhotoGateway::from_config(&cfg.storage),
            cfg.allowed_emails.clone(),
            cfg.identity.clone(),
        )
    }
}
