//! Named client instances.
//!
//! A [`SyslogRegistry`] is created once by the application and passed to
//! whatever needs to look clients up by name. Protocol names map to
//! constructor functions registered up front; `udp` and `tcp` are
//! registered by [`SyslogRegistry::with_defaults`].

use std::{fmt, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};

use super::{ClientConfig, ClientError, SyslogClient, TcpConfig, TransportConfig};
use crate::error::ConfigError;

/// Produces the default configuration for a protocol.
pub type ProtocolFactory = fn() -> ClientConfig;

fn udp_config() -> ClientConfig { ClientConfig::default().transport(TransportConfig::Udp) }

fn tcp_config() -> ClientConfig { ClientConfig::default().transport(TransportConfig::Tcp(TcpConfig::default())) }

/// Registry of named [`SyslogClient`]s.
#[derive(Default)]
pub struct SyslogRegistry {
    instances: DashMap<String, Arc<SyslogClient>>,
    protocols: DashMap<String, ProtocolFactory>,
}

impl SyslogRegistry {
    /// An empty registry with no protocols.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// A registry knowing `udp` and `tcp`, with an instance of each
    /// registered under the protocol's name.
    ///
    /// # Errors
    ///
    /// Propagates failures building the default clients.
    pub fn with_defaults() -> Result<Self, ClientError> {
        let registry = Self::new();
        registry.register_protocol("udp", udp_config);
        registry.register_protocol("tcp", tcp_config);
        registry.create_protocol_instance("udp", "udp")?;
        registry.create_protocol_instance("tcp", "tcp")?;
        Ok(registry)
    }

    /// Map `name` to a configuration factory, replacing any previous one.
    pub fn register_protocol(&self, name: &str, factory: ProtocolFactory) {
        self.protocols.insert(name.trim().to_ascii_lowercase(), factory);
    }

    /// Default configuration for a registered protocol.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProtocol`] if nothing is registered
    /// under `protocol`.
    pub fn protocol_config(&self, protocol: &str) -> Result<ClientConfig, ConfigError> {
        self.protocols
            .get(&protocol.trim().to_ascii_lowercase())
            .map(|factory| (*factory)())
            .ok_or_else(|| ConfigError::UnknownProtocol(protocol.to_owned()))
    }

    /// Build and register a client under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyInstanceName`] for a blank name,
    /// [`ConfigError::DuplicateInstance`] if the name is taken, or the
    /// error from building the client.
    pub fn create_instance(&self, name: &str, config: ClientConfig) -> Result<Arc<SyslogClient>, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyInstanceName.into());
        }
        match self.instances.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateInstance(name.to_owned()).into()),
            Entry::Vacant(slot) => {
                let client = Arc::new(SyslogClient::new(config)?);
                slot.insert(Arc::clone(&client));
                tracing::debug!(instance = name, "registered syslog instance");
                Ok(client)
            }
        }
    }

    /// Register a client under `name` using a protocol's default
    /// configuration.
    ///
    /// # Errors
    ///
    /// As [`create_instance`](Self::create_instance), plus
    /// [`ConfigError::UnknownProtocol`].
    pub fn create_protocol_instance(&self, name: &str, protocol: &str) -> Result<Arc<SyslogClient>, ClientError> {
        let config = self.protocol_config(protocol)?;
        self.create_instance(name, config)
    }

    /// Look up a client by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownInstance`], listing the known names.
    pub fn instance(&self, name: &str) -> Result<Arc<SyslogClient>, ConfigError> {
        self.instances
            .get(name)
            .map(|client| Arc::clone(client.value()))
            .ok_or_else(|| ConfigError::UnknownInstance {
                name: name.to_owned(),
                known: self.names().join(" "),
            })
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool { self.instances.contains_key(name) }

    /// Registered instance names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Shut down and remove the client registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownInstance`] if no such client exists.
    pub async fn destroy_instance(&self, name: &str) -> Result<(), ConfigError> {
        let Some((_, client)) = self.instances.remove(name) else {
            return Err(ConfigError::UnknownInstance {
                name: name.to_owned(),
                known: self.names().join(" "),
            });
        };
        client.shutdown().await;
        Ok(())
    }

    /// Shut down and remove every client.
    pub async fn shutdown(&self) {
        for name in self.names() {
            if let Some((_, client)) = self.instances.remove(&name) {
                client.shutdown().await;
            }
        }
    }
}

impl fmt::Debug for SyslogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogRegistry")
            .field("instances", &self.names())
            .field("protocols", &self.protocols.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_udp_and_tcp() {
        let registry = SyslogRegistry::with_defaults().expect("defaults");
        assert_eq!(registry.names(), ["tcp", "udp"]);
        let tcp = registry.instance("tcp").expect("tcp instance");
        assert_eq!(tcp.config().transport.protocol(), "tcp");
    }

    #[test]
    fn duplicate_and_blank_names_are_rejected() {
        let registry = SyslogRegistry::new();
        registry
            .create_instance("audit", ClientConfig::default())
            .expect("first registration");
        assert!(matches!(
            registry.create_instance("audit", ClientConfig::default()),
            Err(ClientError::Config(ConfigError::DuplicateInstance(name))) if name == "audit"
        ));
        assert!(matches!(
            registry.create_instance("  ", ClientConfig::default()),
            Err(ClientError::Config(ConfigError::EmptyInstanceName))
        ));
    }

    #[test]
    fn unknown_names_list_known_instances() {
        let registry = SyslogRegistry::with_defaults().expect("defaults");
        assert_eq!(
            registry.instance("unix").map(|_| ()),
            Err(ConfigError::UnknownInstance {
                name: "unix".into(),
                known: "tcp udp".into(),
            })
        );
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let registry = SyslogRegistry::new();
        assert!(matches!(
            registry.create_protocol_instance("x", "unix_socket"),
            Err(ClientError::Config(ConfigError::UnknownProtocol(_)))
        ));
    }

    #[tokio::test]
    async fn destroyed_instances_are_shut_down_and_removed() {
        let registry = SyslogRegistry::with_defaults().expect("defaults");
        let udp = registry.instance("udp").expect("udp");
        registry.destroy_instance("udp").await.expect("destroy");
        assert!(!registry.exists("udp"));
        assert!(matches!(udp.info("late").await, Err(ClientError::ShutDown)));

        registry.shutdown().await;
        assert!(registry.names().is_empty());
    }
}
