//! HTTP transport for game API calls
//!
//! A proxy is fixed when a reqwest client is built, so the transport keeps
//! one client per configured route and callers walk the routes in order.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::ClientOptions;
use crate::error::Result;

/// Install the ring provider for rustls. Safe to call repeatedly.
pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// One outbound path: a proxy, or a direct connection
#[derive(Debug, Clone)]
pub struct Route {
    proxy: Option<String>,
    client: Client,
}

impl Route {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Name used in logs
    pub fn label(&self) -> &str {
        self.proxy.as_deref().unwrap_or("direct")
    }
}

/// Ordered set of routes opened for one protocol client
#[derive(Debug, Clone)]
pub struct Transport {
    routes: Vec<Route>,
}

impl Transport {
    /// Build one client per proxy entry; no entries means a single direct route
    pub fn open(options: &ClientOptions) -> Result<Self> {
        ensure_crypto_provider();

        let proxies: Vec<Option<&str>> = if options.proxies.is_empty() {
            vec![None]
        } else {
            options
                .proxies
                .iter()
                .map(|p| Some(p.trim()).filter(|p| !p.is_empty()))
                .collect()
        };

        let routes = proxies
            .into_iter()
            .map(|proxy| {
                let client = build_client(options, proxy)?;
                Ok(Route {
                    proxy: proxy.map(str::to_string),
                    client,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

fn build_client(options: &ClientOptions, proxy: Option<&str>) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        .gzip(true)
        .brotli(true)
        .deflate(true);

    builder = match proxy {
        Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
        None => builder.no_proxy(),
    };

    builder.build().map_err(Into::into)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_no_proxies_means_direct() {
        let transport = Transport::open(&ClientOptions::default()).unwrap();
        assert_eq!(transport.routes().len(), 1);
        assert_eq!(transport.routes()[0].label(), "direct");
    }

    #[test]
    fn test_routes_keep_order() {
        let options = ClientOptions::default().with_proxies(vec![
            "http://127.0.0.1:7890".to_string(),
            String::new(),
            "http://127.0.0.1:8118".to_string(),
        ]);
        let transport = Transport::open(&options).unwrap();
        let labels: Vec<&str> = transport.routes().iter().map(Route::label).collect();
        assert_eq!(
            labels,
            vec!["http://127.0.0.1:7890", "direct", "http://127.0.0.1:8118"]
        );
    }
}
