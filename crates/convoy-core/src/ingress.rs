use crate::platform::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Route / RouteKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub host: String,
    pub path_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub unit: String,
    pub service_port: u16,
    pub endpoints: Vec<Endpoint>,
}

// ---------------------------------------------------------------------------
// IngressRouter
// ---------------------------------------------------------------------------

/// Routing table from external host + path-prefix to the currently-healthy
/// endpoint set of a unit. `set_route` swaps the whole endpoint set in a
/// single map insert, so a reader never sees stale endpoints alongside
/// fresh ones.
#[derive(Debug, Default)]
pub struct IngressRouter {
    routes: Mutex<HashMap<RouteKey, Route>>,
}

impl IngressRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the route for (host, path-prefix).
    pub fn set_route(
        &self,
        host: &str,
        path_prefix: &str,
        unit: &str,
        service_port: u16,
        endpoints: Vec<Endpoint>,
    ) {
        let key = RouteKey {
            host: host.to_string(),
            path_prefix: path_prefix.to_string(),
        };
        let route = Route {
            unit: unit.to_string(),
            service_port,
            endpoints,
        };
        self.routes
            .lock()
            .expect("ingress lock poisoned")
            .insert(key, route);
    }

    /// Drop every route owned by `unit`.
    pub fn clear_unit(&self, unit: &str) {
        self.routes
            .lock()
            .expect("ingress lock poisoned")
            .retain(|_, r| r.unit != unit);
    }

    /// Longest-prefix match over routes for `host`.
    pub fn resolve(&self, host: &str, request_path: &str) -> Option<Route> {
        let routes = self.routes.lock().expect("ingress lock poisoned");
        routes
            .iter()
            .filter(|(k, _)| k.host == host && request_path.starts_with(k.path_prefix.as_str()))
            .max_by_key(|(k, _)| k.path_prefix.len())
            .map(|(_, r)| r.clone())
    }

    pub fn routes(&self) -> Vec<(RouteKey, Route)> {
        let routes = self.routes.lock().expect("ingress lock poisoned");
        let mut all: Vec<_> = routes.iter().map(|(k, r)| (k.clone(), r.clone())).collect();
        all.sort_by(|(a, _), (b, _)| (&a.host, &a.path_prefix).cmp(&(&b.host, &b.path_prefix)));
        all
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> crate::error::Result<Self> {
        let path = crate::paths::ingress_path(root);
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(&path)?;
        let entries: Vec<(RouteKey, Route)> = serde_yaml::from_str(&data)?;
        Ok(Self {
            routes: Mutex::new(entries.into_iter().collect()),
        })
    }

    pub fn save(&self, root: &Path) -> crate::error::Result<()> {
        let data = serde_yaml::to_string(&self.routes())?;
        crate::io::atomic_write(&crate::paths::ingress_path(root), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
