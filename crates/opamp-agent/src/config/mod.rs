//! Agent config loader (strict parsing).

pub mod schema;

use std::fs;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::{AgentDescription, KeyValue};

use crate::callbacks::Callbacks;
use crate::settings::{StartSettings, TlsSettings};

pub use schema::{AgentFileConfig, AgentSection, BackoffSection, CapabilityName, ServerSection, TlsSection};

pub fn load_from_file(path: &str) -> Result<AgentFileConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| OpampError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<AgentFileConfig> {
    let cfg: AgentFileConfig = serde_yaml::from_str(s)
        .map_err(|e| OpampError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

impl AgentFileConfig {
    /// Build start settings. Reads the CA file, if any.
    pub fn into_start_settings(self, callbacks: Arc<dyn Callbacks>) -> Result<StartSettings> {
        let mut header = HeaderMap::new();
        for (name, value) in &self.server.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| OpampError::Config(format!("header {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| OpampError::Config(format!("header {name}: {e}")))?;
            header.insert(name, value);
        }

        let tls = match &self.server.tls {
            Some(t) => {
                let ca_cert_pem = match &t.ca_file {
                    Some(path) => Some(fs::read(path).map_err(|e| {
                        OpampError::Config(format!("read CA file {path} failed: {e}"))
                    })?),
                    None => None,
                };
                Some(TlsSettings {
                    ca_cert_pem,
                    accept_invalid_certs: t.accept_invalid_certs,
                })
            }
            None => None,
        };

        let description = AgentDescription {
            identifying_attributes: vec![
                KeyValue::string("service.name", self.agent.service_name.clone()),
                KeyValue::string("service.version", self.agent.service_version.clone()),
            ],
            non_identifying_attributes: vec![
                KeyValue::string("os.type", std::env::consts::OS),
                KeyValue::string("host.arch", std::env::consts::ARCH),
            ],
        };

        let mut settings = StartSettings::new(self.server.url.clone())
            .with_callbacks(callbacks)
            .with_instance_uid(self.agent.instance_uid.clone())
            .with_capabilities(self.agent.capability_bits())
            .with_polling_interval(self.server.polling_interval())
            .with_backoff(self.server.backoff.to_backoff());
        settings.header = header;
        settings.tls = tls;
        settings.agent_description = Some(description);
        Ok(settings)
    }
}
