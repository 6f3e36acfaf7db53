//! HTTP client for the portal's provisioning API.

use std::time::Duration;

use crate::config::DeviceEndpoint;
use crate::protocol::{ActionResult, ConnectRequest, DeviceStatus, Network, PortalParam};

pub struct DeviceClient {
    http: reqwest::Client,
    endpoint: DeviceEndpoint,
}

impl DeviceClient {
    pub fn new(endpoint: DeviceEndpoint) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, endpoint })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.http_url(), path)
    }

    pub async fn status(&self) -> anyhow::Result<DeviceStatus> {
        let resp = self
            .http
            .get(self.url("/status_json"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Scans for nearby networks, strongest first.
    pub async fn scan(&self) -> anyhow::Result<Vec<Network>> {
        let resp = self
            .http
            .get(self.url("/scan"))
            .send()
            .await?
            .error_for_status()?;
        let mut networks: Vec<Network> = resp.json().await?;
        networks.sort_by_key(|n| std::cmp::Reverse(n.rssi));
        Ok(networks)
    }

    /// Submits credentials. The firmware answers HTTP 500 with a result
    /// body when the join fails, so the discriminator is read either way.
    pub async fn connect(&self, req: &ConnectRequest) -> anyhow::Result<ActionResult> {
        let resp = self.http.post(self.url("/connect")).json(req).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn reset(&self) -> anyhow::Result<ActionResult> {
        let resp = self
            .http
            .get(self.url("/reset"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn params(&self) -> anyhow::Result<Vec<PortalParam>> {
        let resp = self
            .http
            .get(self.url("/params_json"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn client_for(server: &mockito::ServerGuard) -> DeviceClient {
        DeviceClient::new(DeviceEndpoint::new(&server.url()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status_json")
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"Connected","ip":"192.168.1.40","lastResult":3,"params":[]}"#)
            .create_async()
            .await;

        let status = client_for(&server).await.status().await.unwrap();
        assert!(status.is_connected());
        assert_eq!(status.ip, "192.168.1.40");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_scan_sorts_by_signal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/scan")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"ssid":"far","rssi":-88,"encryptionType":3},
                    {"ssid":"near","rssi":-48,"encryptionType":3}]"#,
            )
            .create_async()
            .await;

        let networks = client_for(&server).await.scan().await.unwrap();
        assert_eq!(networks[0].ssid, "near");
        assert_eq!(networks[1].ssid, "far");
    }

    #[tokio::test]
    async fn test_connect_failure_reads_result_from_500() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/connect")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"Connection Failed"}"#)
            .create_async()
            .await;

        let req = ConnectRequest {
            ssid: "lab".into(),
            password: "nope".into(),
            extra: Default::default(),
        };
        let result = client_for(&server).await.connect(&req).await.unwrap();
        assert!(!result.connected());
        assert_eq!(result.result, "Connection Failed");
    }

    #[tokio::test]
    async fn test_params_tolerates_missing_value() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/params_json")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":"mqtt_host","label":"MQTT host","value":"10.0.0.2"},
                    {"id":"mqtt_port","label":"MQTT port"}]"#,
            )
            .create_async()
            .await;

        let params = client_for(&server).await.params().await.unwrap();
        assert_eq!(params[0].value, "10.0.0.2");
        assert_eq!(params[1].label, "MQTT port");
        assert_eq!(params[1].value, "");
        mock.assert_async().await;
    }
}
