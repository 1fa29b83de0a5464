//! Start settings handed to `OpampClient::new`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;

use opamp_core::protocol::{AgentCapabilities, AgentDescription, RemoteConfigStatus};

use crate::callbacks::{Callbacks, NoopCallbacks, PackagesStateProvider};
use crate::sender::backoff::ExponentialBackoff;

/// Default polling interval when nothing is queued.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);

/// TLS parameters for the HTTP connection.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// Extra root certificate (PEM) to trust.
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Skip certificate verification. Test setups only.
    pub accept_invalid_certs: bool,
}

#[derive(Clone)]
pub struct StartSettings {
    /// Server URL. Must be http or https.
    pub server_url: String,
    /// Extra headers for every request. `content-type` is always overridden.
    pub header: HeaderMap,
    pub tls: Option<TlsSettings>,

    /// Empty means "generate one and ask the server for a proper uid".
    pub instance_uid: String,
    pub agent_description: Option<AgentDescription>,
    pub capabilities: AgentCapabilities,
    pub callbacks: Arc<dyn Callbacks>,

    // Previously saved state, reported right after start.
    /// `None` forces the server to send a remote config. The hash is
    /// recomputed from the other fields.
    pub remote_config_status: Option<RemoteConfigStatus>,
    pub last_connection_settings_hash: Vec<u8>,

    /// `None` disables ACCEPTS_PACKAGES and REPORTS_PACKAGE_STATUSES.
    pub packages_state_provider: Option<Arc<dyn PackagesStateProvider>>,

    pub polling_interval: Duration,
    pub backoff: ExponentialBackoff,
}

impl StartSettings {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            header: HeaderMap::new(),
            tls: None,
            instance_uid: String::new(),
            agent_description: None,
            capabilities: AgentCapabilities::REPORTS_STATUS,
            callbacks: Arc::new(NoopCallbacks),
            remote_config_status: None,
            last_connection_settings_hash: Vec::new(),
            packages_state_provider: None,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            backoff: ExponentialBackoff::default(),
        }
    }

    #[must_use]
    pub fn with_callbacks(mut self, callbacks: Arc<dyn Callbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    #[must_use]
    pub fn with_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.instance_uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_packages_state_provider(mut self, provider: Arc<dyn PackagesStateProvider>) -> Self {
        self.packages_state_provider = Some(provider);
        self
    }

    /// Capabilities actually announced: package bits need a provider.
    pub fn effective_capabilities(&self) -> AgentCapabilities {
        let mut caps = self.capabilities;
        if self.packages_state_provider.is_none() {
            caps.remove(AgentCapabilities::ACCEPTS_PACKAGES);
            caps.remove(AgentCapabilities::REPORTS_PACKAGE_STATUSES);
        }
        caps
    }
}
