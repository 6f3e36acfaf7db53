//! Device endpoint handling.
//!
//! The portal serves everything from one host: the provisioning API over
//! HTTP and the serial log over a WebSocket at `/serial_ws`. The WebSocket
//! scheme follows the HTTP one, `https` pairing with `wss`.

pub const SERIAL_WS_PATH: &str = "/serial_ws";

/// Factory-default address of the captive portal AP.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";

pub const DEFAULT_BAUD_RATE: u32 = 115200;

#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    /// `http://host[:port]` or `https://host[:port]`, no trailing path.
    base: String,
}

impl DeviceEndpoint {
    /// Builds an endpoint from a user-supplied address. A bare `host[:port]`
    /// is taken as plain HTTP; any path component is dropped.
    pub fn new(addr: &str) -> anyhow::Result<Self> {
        let addr = addr.trim().trim_end_matches('/');
        anyhow::ensure!(!addr.is_empty(), "empty device address");

        let (scheme, rest) = match addr.split_once("://") {
            Some(("http", rest)) => ("http", rest),
            Some(("https", rest)) => ("https", rest),
            Some((other, _)) => anyhow::bail!("unsupported scheme: {other}"),
            None => ("http", addr),
        };

        let host_port = rest.split('/').next().unwrap_or_default();
        anyhow::ensure!(!host_port.is_empty(), "no host in device address: {addr}");

        Ok(Self {
            base: format!("{scheme}://{host_port}"),
        })
    }

    pub fn http_url(&self) -> &str {
        &self.base
    }

    /// WebSocket URL of the serial log stream, secure variant matching the
    /// HTTP one.
    pub fn serial_ws_url(&self) -> String {
        let ws = if self.base.starts_with("https://") {
            self.base.replacen("https://", "wss://", 1)
        } else {
            self.base.replacen("http://", "ws://", 1)
        };
        format!("{ws}{SERIAL_WS_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceEndpoint;

    #[test]
    fn test_bare_host_defaults_to_http() {
        let ep = DeviceEndpoint::new("192.168.4.1").unwrap();
        assert_eq!(ep.http_url(), "http://192.168.4.1");
        assert_eq!(ep.serial_ws_url(), "ws://192.168.4.1/serial_ws");
    }

    #[test]
    fn test_https_maps_to_wss() {
        let ep = DeviceEndpoint::new("https://device.local:8443").unwrap();
        assert_eq!(ep.http_url(), "https://device.local:8443");
        assert_eq!(ep.serial_ws_url(), "wss://device.local:8443/serial_ws");
    }

    #[test]
    fn test_path_and_trailing_slash_dropped() {
        let ep = DeviceEndpoint::new("http://10.0.0.2/index.html").unwrap();
        assert_eq!(ep.http_url(), "http://10.0.0.2");

        let ep = DeviceEndpoint::new("http://10.0.0.2/").unwrap();
        assert_eq!(ep.http_url(), "http://10.0.0.2");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(DeviceEndpoint::new("").is_err());
        assert!(DeviceEndpoint::new("ftp://10.0.0.2").is_err());
        assert!(DeviceEndpoint::new("http://").is_err());
    }
}
