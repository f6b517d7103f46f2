//! HTTP route sets carried in desired LRP routing info.
//!
//! The router reads the `cf-router` entry of a desired LRP's routing info,
//! an array of `{"hostnames": [...], "port": N}` documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LtcError, Result};
use crate::receptor::RoutingInfo;

/// Routing info key read by the HTTP router.
pub const APP_ROUTER: &str = "cf-router";

/// Message for a route that is not `host:port`.
pub const MALFORMED_ROUTE: &str = "Malformed route. Routes must be of the format route:port";

/// Message for a route whose port is not a valid TCP port.
pub const INVALID_PORT: &str =
    "Invalid port specified. Ports must be a positive integer less than 65536.";

/// Hostnames routed to one container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRoute {
    /// Fully-qualified hostnames.
    pub hostnames: Vec<String>,
    /// Container port.
    pub port: u16,
}

/// All HTTP routes of an app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppRoutes(pub Vec<AppRoute>);

impl AppRoutes {
    /// Wraps the routes under [`APP_ROUTER`].
    #[must_use]
    pub fn routing_info(&self) -> RoutingInfo {
        let mut info = RoutingInfo::new();
        info.insert(
            APP_ROUTER.to_string(),
            serde_json::to_value(&self.0).unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
        );
        info
    }

    /// Extracts the routes from routing info. Missing or undecodable
    /// entries yield no routes.
    #[must_use]
    pub fn from_routing_info(info: Option<&RoutingInfo>) -> Self {
        let Some(value) = info.and_then(|info| info.get(APP_ROUTER)) else {
            return Self::default();
        };
        match serde_json::from_value::<Vec<AppRoute>>(value.clone()) {
            Ok(routes) => Self(routes),
            Err(e) => {
                warn!(error = %e, "ignoring undecodable {APP_ROUTER} routing info");
                Self::default()
            }
        }
    }

    /// Hostnames keyed by port.
    #[must_use]
    pub fn hostnames_by_port(&self) -> BTreeMap<u16, Vec<String>> {
        self.0
            .iter()
            .map(|route| (route.port, route.hostnames.clone()))
            .collect()
    }

    /// First hostname of the first route.
    #[must_use]
    pub fn first_hostname(&self) -> Option<&str> {
        self.0
            .iter()
            .flat_map(|route| route.hostnames.iter())
            .map(String::as_str)
            .next()
    }

    /// Whether no hostname is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|route| route.hostnames.is_empty())
    }
}

/// Routes every exposed port as `<app>-<port>.<domain>`, and the primary
/// port additionally as `<app>.<domain>`.
#[must_use]
pub fn default_routes(app_name: &str, exposed: &[u16], primary_port: u16, domain: &str) -> AppRoutes {
    AppRoutes(
        exposed
            .iter()
            .map(|&port| {
                let mut hostnames = Vec::with_capacity(2);
                if port == primary_port {
                    hostnames.push(format!("{app_name}.{domain}"));
                }
                hostnames.push(format!("{app_name}-{port}.{domain}"));
                AppRoute { hostnames, port }
            })
            .collect(),
    )
}

/// The port an app is reached on: the monitored port if set, otherwise
/// the first exposed port.
#[must_use]
pub fn primary_port(monitored: u16, exposed: &[u16]) -> u16 {
    if monitored != 0 {
        monitored
    } else {
        exposed.first().copied().unwrap_or(0)
    }
}

/// One `host:port` route given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOverride {
    /// Hostname before the system domain.
    pub hostname_prefix: String,
    /// Container port.
    pub port: u16,
}

/// Parses `host:port[,host:port...]`.
///
/// # Errors
///
/// Fails with [`MALFORMED_ROUTE`] or [`INVALID_PORT`].
pub fn parse_route_overrides(spec: &str) -> Result<Vec<RouteOverride>> {
    spec.split(',')
        .filter(|route| !route.is_empty())
        .map(|route| {
            let (host, port) = route
                .split_once(':')
                .filter(|(host, port)| !host.is_empty() && !port.contains(':'))
                .ok_or_else(|| LtcError::InvalidUserInput(MALFORMED_ROUTE.into()))?;
            let port = port
                .parse::<u16>()
                .ok()
                .filter(|&port| port != 0)
                .ok_or_else(|| LtcError::InvalidUserInput(INVALID_PORT.into()))?;
            Ok(RouteOverride {
                hostname_prefix: host.to_string(),
                port,
            })
        })
        .collect()
}

/// Groups overrides by port, keeping the order in which ports first appear.
#[must_use]
pub fn routes_from_overrides(overrides: &[RouteOverride], domain: &str) -> AppRoutes {
    let mut routes: Vec<AppRoute> = Vec::new();
    for route in overrides {
        let hostname = format!("{}.{domain}", route.hostname_prefix);
        match routes.iter_mut().find(|r| r.port == route.port) {
            Some(existing) => existing.hostnames.push(hostname),
            None => routes.push(AppRoute {
                hostnames: vec![hostname],
                port: route.port,
            }),
        }
    }
    AppRoutes(routes)
}
