//! Authenticated account endpoints. Results are not cached.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::GeneralResponse;
use crate::error::Result;
use crate::http::ApiClient;
use crate::types::{DashboardItem, Profile, ReadingDetail};

#[derive(Debug, Serialize)]
struct ClaimRequest<'a> {
    mac_address: &'a str,
    device_id_str: &'a str,
}

#[derive(Debug, Serialize)]
struct UnclaimRequest<'a> {
    device_id_str: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddCorrelativeRequest<'a> {
    scanned_code: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveCorrelativeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    patient_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    monitor_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    #[serde(default)]
    data: Vec<DashboardItem>,
}

/// Device pairing, correlatives, dashboard, profile and reading detail.
///
/// Payloads from device pairing and code scanning flow through here like any
/// other authenticated call.
#[derive(Debug, Clone)]
pub struct AccountApi {
    api: ApiClient,
}

impl AccountApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn claim_device(&self, mac_address: &str, device_id: &str) -> Result<String> {
        let body = ClaimRequest {
            mac_address,
            device_id_str: device_id,
        };
        self.acknowledge(Method::POST, "claim-device", &body).await
    }

    pub async fn unclaim_device(&self, device_id: &str) -> Result<String> {
        let body = UnclaimRequest {
            device_id_str: device_id,
        };
        self.acknowledge(Method::POST, "unclaim-device", &body).await
    }

    /// Link a correlative from a scanned invitation code.
    pub async fn add_correlative(&self, scanned_code: &str) -> Result<String> {
        let body = AddCorrelativeRequest { scanned_code };
        self.acknowledge(Method::POST, "correlatives/add", &body).await
    }

    /// Stop monitoring a patient.
    pub async fn remove_patient(&self, patient_id: &str) -> Result<String> {
        let body = RemoveCorrelativeRequest {
            patient_id: Some(patient_id),
            ..Default::default()
        };
        self.acknowledge(Method::DELETE, "correlatives/remove", &body)
            .await
    }

    /// Revoke a monitor's access to the signed-in user's readings.
    pub async fn remove_monitor(&self, monitor_id: &str) -> Result<String> {
        let body = RemoveCorrelativeRequest {
            monitor_id: Some(monitor_id),
            ..Default::default()
        };
        self.acknowledge(Method::DELETE, "correlatives/remove", &body)
            .await
    }

    pub async fn dashboard(&self) -> Result<Vec<DashboardItem>> {
        let response: DashboardResponse = self.api.get_json("dashboard", &[]).await?;
        Ok(response.data)
    }

    pub async fn profile(&self) -> Result<Profile> {
        self.api.get_json("profile", &[]).await
    }

    pub async fn reading_detail(&self, reading_id: i64) -> Result<ReadingDetail> {
        self.api
            .get_json(&format!("reading/{reading_id}"), &[])
            .await
    }

    async fn acknowledge<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<String> {
        let response: GeneralResponse = self.api.send_json(method, path, body).await?;
        tracing::info!(path, "account request acknowledged");
        Ok(response.into_message())
    }
}
