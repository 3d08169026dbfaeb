use url::Url;

use crate::error::{BridgeError, Result};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8765";
pub const DEFAULT_THEME_KEY: &str = "theme";
pub const DEFAULT_THEME_ATTRIBUTE: &str = "data-theme";
pub const DEFAULT_COMPONENT_ATTRIBUTE: &str = "data-component-id";

/// Settings shared by every bridge host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Backend socket to connect to
    pub endpoint: Url,
    /// Storage key the active theme is persisted under
    pub theme_storage_key: String,
    /// Attribute set on the document root when the theme changes
    pub theme_attribute: String,
    /// Attribute that marks an element as a backend component
    pub component_attribute: String,
    /// Line logged once the socket opens
    pub connected_message: String,
}

impl BridgeConfig {
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn with_theme_storage_key(mut self, key: impl Into<String>) -> Self {
        self.theme_storage_key = key.into();
        self
    }

    pub fn with_theme_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.theme_attribute = attribute.into();
        self
    }

    pub fn with_component_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.component_attribute = attribute.into();
        self
    }

    pub fn with_connected_message(mut self, message: impl Into<String>) -> Self {
        self.connected_message = message.into();
        self
    }

    /// Build a config from `TAUPY_BRIDGE_*` environment variables.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`BridgeConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let mut config = Self::default();
        if let Some(endpoint) = var("TAUPY_BRIDGE_ENDPOINT") {
            config = config.with_endpoint(&endpoint)?;
        }
        if let Some(key) = var("TAUPY_BRIDGE_THEME_KEY") {
            config = config.with_theme_storage_key(key);
        }
        if let Some(attribute) = var("TAUPY_BRIDGE_THEME_ATTRIBUTE") {
            config = config.with_theme_attribute(attribute);
        }
        if let Some(attribute) = var("TAUPY_BRIDGE_COMPONENT_ATTRIBUTE") {
            config = config.with_component_attribute(attribute);
        }
        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // Constant input; covered by `test_default_endpoint_is_a_socket_url`.
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            theme_storage_key: DEFAULT_THEME_KEY.to_string(),
            theme_attribute: DEFAULT_THEME_ATTRIBUTE.to_string(),
            component_attribute: DEFAULT_COMPONENT_ATTRIBUTE.to_string(),
            connected_message: "Connected to TauPy backend".to_string(),
        }
    }
}

/// Parse a socket endpoint, accepting only `ws` and `wss` URLs.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|source| BridgeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(BridgeError::UnsupportedScheme(scheme.to_string())),
    }
}
