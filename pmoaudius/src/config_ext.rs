//! Extension pour intégrer Audius dans pmoconfig
//!
//! Ce module fournit le trait `AudiusConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages de la source Audius (clés sous
//! `sources.audius`), ainsi que [`ClientBuilder::from_config`].
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoaudius::{AudiusConfigExt, ClientBuilder};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = get_config();
//!
//! if !config.get_audius_enabled()? {
//!     println!("Audius is disabled");
//!     return Ok(());
//! }
//!
//! let client = ClientBuilder::from_config(&config)?.build().await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientBuilder, DEFAULT_APP_NAME};
use crate::coordinator::{DEFAULT_COOLDOWN_MS, DEFAULT_THROTTLE_MS};
use crate::directory::{DEFAULT_DISCOVERY_URL, DEFAULT_FALLBACK_NODES, DEFAULT_NODE_CACHE_TTL_SECS};
use crate::search::DEFAULT_SEARCH_CACHE_TTL_SECS;
use crate::stream::DEFAULT_STREAM_MAX_RETRIES;
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use std::time::Duration;

const SECTION: [&str; 2] = ["sources", "audius"];

fn key(name: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], name]
}

/// Trait d'extension pour gérer la configuration Audius dans pmoconfig
///
/// Les getters persistent automatiquement la valeur par défaut dans la
/// configuration si la clé est absente ou invalide.
pub trait AudiusConfigExt {
    /// Vérifie si Audius est activé (défaut : `true`)
    fn get_audius_enabled(&self) -> Result<bool>;
    fn set_audius_enabled(&self, enabled: bool) -> Result<()>;

    /// Nom d'application envoyé en `app_name`
    fn get_audius_app_name(&self) -> Result<String>;
    fn set_audius_app_name(&self, app_name: &str) -> Result<()>;

    /// URL du registre racine des noeuds
    fn get_audius_discovery_url(&self) -> Result<String>;
    fn set_audius_discovery_url(&self, url: &str) -> Result<()>;

    /// Noeuds statiques de secours, dans l'ordre
    fn get_audius_fallback_nodes(&self) -> Result<Vec<String>>;
    fn set_audius_fallback_nodes(&self, nodes: &[String]) -> Result<()>;

    /// Durée de validité du noeud résolu (secondes)
    fn get_audius_node_cache_ttl(&self) -> Result<u64>;
    fn set_audius_node_cache_ttl(&self, ttl_secs: u64) -> Result<()>;

    /// Durée de validité des résultats de recherche (secondes)
    fn get_audius_search_cache_ttl(&self) -> Result<u64>;
    fn set_audius_search_cache_ttl(&self, ttl_secs: u64) -> Result<()>;

    /// Nombre de tentatives de résolution de flux
    fn get_audius_stream_max_retries(&self) -> Result<u32>;
    fn set_audius_stream_max_retries(&self, retries: u32) -> Result<()>;

    /// Intervalle minimal entre deux changements de piste (ms)
    fn get_audius_throttle_ms(&self) -> Result<u64>;
    fn set_audius_throttle_ms(&self, ms: u64) -> Result<()>;

    /// Délai de refroidissement après un changement de piste (ms)
    fn get_audius_cooldown_ms(&self) -> Result<u64>;
    fn set_audius_cooldown_ms(&self, ms: u64) -> Result<()>;
}

fn get_u64(config: &Config, name: &str, default: u64) -> Result<u64> {
    if let Ok(Value::Number(n)) = config.get_value(&key(name)) {
        if let Some(value) = n.as_u64() {
            return Ok(value);
        }
    }

    set_u64(config, name, default)?;
    Ok(default)
}

fn set_u64(config: &Config, name: &str, value: u64) -> Result<()> {
    config.set_value(&key(name), Value::Number(Number::from(value)))
}

fn get_string(config: &Config, name: &str, default: &str) -> Result<String> {
    match config.get_value(&key(name)) {
        Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        _ => {
            set_string(config, name, default)?;
            Ok(default.to_string())
        }
    }
}

fn set_string(config: &Config, name: &str, value: &str) -> Result<()> {
    config.set_value(&key(name), Value::String(value.to_string()))
}

impl AudiusConfigExt for Config {
    fn get_audius_enabled(&self) -> Result<bool> {
        match self.get_value(&key("enabled")) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                self.set_audius_enabled(true)?;
                Ok(true)
            }
        }
    }

    fn set_audius_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(&key("enabled"), Value::Bool(enabled))
    }

    fn get_audius_app_name(&self) -> Result<String> {
        get_string(self, "app_name", DEFAULT_APP_NAME)
    }

    fn set_audius_app_name(&self, app_name: &str) -> Result<()> {
        set_string(self, "app_name", app_name)
    }

    fn get_audius_discovery_url(&self) -> Result<String> {
        get_string(self, "discovery_url", DEFAULT_DISCOVERY_URL)
    }

    fn set_audius_discovery_url(&self, url: &str) -> Result<()> {
        set_string(self, "discovery_url", url)
    }

    fn get_audius_fallback_nodes(&self) -> Result<Vec<String>> {
        let nodes = match self.get_value(&key("fallback_nodes")) {
            Ok(value @ Value::Sequence(_)) => serde_yaml::from_value::<Vec<String>>(value).ok(),
            _ => None,
        };

        match nodes {
            Some(nodes) if !nodes.is_empty() => Ok(nodes),
            _ => {
                let defaults: Vec<String> =
                    DEFAULT_FALLBACK_NODES.iter().map(|n| n.to_string()).collect();
                self.set_audius_fallback_nodes(&defaults)?;
                Ok(defaults)
            }
        }
    }

    fn set_audius_fallback_nodes(&self, nodes: &[String]) -> Result<()> {
        let value = serde_yaml::to_value(nodes)?;
        self.set_value(&key("fallback_nodes"), value)
    }

    fn get_audius_node_cache_ttl(&self) -> Result<u64> {
        get_u64(self, "node_cache_ttl_secs", DEFAULT_NODE_CACHE_TTL_SECS)
    }

    fn set_audius_node_cache_ttl(&self, ttl_secs: u64) -> Result<()> {
        set_u64(self, "node_cache_ttl_secs", ttl_secs)
    }

    fn get_audius_search_cache_ttl(&self) -> Result<u64> {
        get_u64(self, "search_cache_ttl_secs", DEFAULT_SEARCH_CACHE_TTL_SECS)
    }

    fn set_audius_search_cache_ttl(&self, ttl_secs: u64) -> Result<()> {
        set_u64(self, "search_cache_ttl_secs", ttl_secs)
    }

    fn get_audius_stream_max_retries(&self) -> Result<u32> {
        let retries = get_u64(
            self,
            "stream_max_retries",
            u64::from(DEFAULT_STREAM_MAX_RETRIES),
        )?;
        Ok(u32::try_from(retries).unwrap_or(DEFAULT_STREAM_MAX_RETRIES))
    }

    fn set_audius_stream_max_retries(&self, retries: u32) -> Result<()> {
        set_u64(self, "stream_max_retries", u64::from(retries))
    }

    fn get_audius_throttle_ms(&self) -> Result<u64> {
        get_u64(self, "throttle_ms", DEFAULT_THROTTLE_MS)
    }

    fn set_audius_throttle_ms(&self, ms: u64) -> Result<()> {
        set_u64(self, "throttle_ms", ms)
    }

    fn get_audius_cooldown_ms(&self) -> Result<u64> {
        get_u64(self, "cooldown_ms", DEFAULT_COOLDOWN_MS)
    }

    fn set_audius_cooldown_ms(&self, ms: u64) -> Result<()> {
        set_u64(self, "cooldown_ms", ms)
    }
}

impl ClientBuilder {
    /// Builder pre-filled from the `sources.audius` configuration section
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new()
            .app_name(config.get_audius_app_name()?)
            .discovery_url(config.get_audius_discovery_url()?)
            .fallback_nodes(config.get_audius_fallback_nodes()?)
            .node_cache_ttl(Duration::from_secs(config.get_audius_node_cache_ttl()?))
            .search_cache_ttl(Duration::from_secs(config.get_audius_search_cache_ttl()?))
            .stream_max_retries(config.get_audius_stream_max_retries()?)
            .throttle(Duration::from_millis(config.get_audius_throttle_ms()?))
            .cooldown(Duration::from_millis(config.get_audius_cooldown_ms()?)))
    }
}
