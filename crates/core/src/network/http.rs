use std::time::Duration;

use reqwest::{Client, Url};
use ridewatch_transit::{
    RoutePath, Stop, SystemIdentifier, TransitSystem, TripRequest, TripResponse, Vehicle,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{LiveError, Result, error_detail};
use crate::network::{ApiFuture, TransitApi};

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// [`TransitApi`] over HTTP + JSON.
#[derive(Clone, Debug)]
pub struct HttpTransitApi {
    client: Client,
    base_url: Url,
}

impl HttpTransitApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| LiveError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LiveError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get_json(self.endpoint("health", &[])?).await
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LiveError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(path);

        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(url)
    }

    fn system_endpoint(&self, path: &str, system: &SystemIdentifier) -> Result<Url> {
        self.endpoint(path, &[("system_id", system.to_string())])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {url}");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(LiveError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl TransitApi for HttpTransitApi {
    fn stops<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Stop>> {
        Box::pin(async move { self.get_json(self.system_endpoint("stops", system)?).await })
    }

    fn vehicles<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<Vehicle>> {
        Box::pin(async move { self.get_json(self.system_endpoint("vehicles", system)?).await })
    }

    fn route_paths<'a>(&'a self, system: &'a SystemIdentifier) -> ApiFuture<'a, Vec<RoutePath>> {
        Box::pin(async move { self.get_json(self.system_endpoint("route_paths", system)?).await })
    }

    fn plan_trip<'a>(&'a self, request: &'a TripRequest) -> ApiFuture<'a, TripResponse> {
        Box::pin(async move {
            let url = self.endpoint(
                "trip",
                &[
                    ("lat", request.origin.lat.to_string()),
                    ("lng", request.origin.lng.to_string()),
                    ("lat2", request.destination.lat.to_string()),
                    ("lng2", request.destination.lng.to_string()),
                    ("system_id", request.system.to_string()),
                ],
            )?;
            self.get_json(url).await
        })
    }

    fn systems<'a>(&'a self) -> ApiFuture<'a, Vec<TransitSystem>> {
        Box::pin(async move { self.get_json(self.endpoint("systems", &[])?).await })
    }
}
