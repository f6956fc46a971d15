use std::env;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_BASE_URL: &str = "proxy.detools.dev";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone, Debug)]
pub struct Config {
    /// Scheme used for upstream calls, `https` unless overridden.
    pub protocol: String,
    /// Upstream host (and optional port) the billing API lives on.
    pub base_url: String,
    pub listen_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            protocol: non_empty_var("PROTOCOL").unwrap_or_else(|| DEFAULT_PROTOCOL.into()),
            base_url: non_empty_var("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            listen_addr: non_empty_var("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into()),
        }
    }

    /// `{protocol}://{base_url}` without a trailing slash.
    pub fn upstream_origin(&self) -> String {
        format!(
            "{}://{}",
            self.protocol.trim_end_matches("://"),
            self.base_url.trim_end_matches('/')
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_origin() {
        let config = Config {
            protocol: "https".into(),
            base_url: "proxy.detools.dev/".into(),
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
        };
        assert_eq!(config.upstream_origin(), "https://proxy.detools.dev");

        let config = Config {
            protocol: "http://".into(),
            base_url: "127.0.0.1:9000".into(),
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
        };
        assert_eq!(config.upstream_origin(), "http://127.0.0.1:9000");
    }
}
