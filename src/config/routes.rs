//! Static service-key → base-URL table.

use std::collections::HashMap;

/// Environment prefix for backend base URLs, e.g. `APP_REAL_HOST_ALPHA`.
pub const REAL_HOST_PREFIX: &str = "APP_REAL_HOST_";

/// Case-insensitive map from service key to backend base URL.
///
/// Built once at startup; lookups never fail, an unknown key is simply
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct ServiceRoutes {
    routes: HashMap<String, String>,
}

impl ServiceRoutes {
    /// Collect every `APP_REAL_HOST_*` pair from an environment-style
    /// iterator. Empty base URLs are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let routes = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let service = key.as_ref().strip_prefix(REAL_HOST_PREFIX)?;
                let base_url = value.into();
                if service.is_empty() || base_url.trim().is_empty() {
                    return None;
                }
                Some((service.to_uppercase(), base_url.trim().to_string()))
            })
            .collect();
        Self { routes }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    #[must_use]
    pub fn resolve(&self, service_key: &str) -> Option<&str> {
        self.routes
            .get(&service_key.to_uppercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
