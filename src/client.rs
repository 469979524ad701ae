//! HTTP client for talking to an authority, as a node or as an operator.
//!
//! Any reply that is not a success shape comes back as
//! `TrafficSyncError::Rejected`; nodes should resend the same batch later.
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::admin::{AppliedChange, TrafficChange};
use crate::api::paths;
use crate::error::{Result, TrafficSyncError};
use crate::events::{Event, EventBody};
use crate::nodes::NodeStatus;
use crate::sync::{SyncRequest, SyncResponse};

#[derive(Clone, Debug)]
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    admin_token: Option<String>,
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: None,
        })
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.admin_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn health(&self) -> Result<bool> {
        let response = self.http.get(self.url(paths::base::HEALTH)).send().await?;
        Ok(response.status().is_success())
    }

    /// Report usage and collect the events this node has not seen yet
    pub async fn sync(&self, key: &str, reports: &[EventBody]) -> Result<Vec<Event>> {
        let events = reports
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        let request = SyncRequest {
            key: key.to_string(),
            events: Some(events),
        };
        let response = self
            .http
            .post(self.url(paths::SYNC))
            .json(&request)
            .send()
            .await?;

        let reply: SyncResponse = decode(response).await?;
        if reply.err != 0 {
            return Err(TrafficSyncError::Rejected {
                status: 200,
                body: reply.msg,
            });
        }
        Ok(reply.events)
    }

    pub async fn set_traffic(&self, change: &TrafficChange) -> Result<AppliedChange> {
        let response = self
            .admin_request(self.http.post(self.url(paths::admin::TRAFFIC)))
            .json(change)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn nodes(&self) -> Result<Vec<NodeStatus>> {
        let response = self
            .admin_request(self.http.get(self.url(paths::admin::NODES)))
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TrafficSyncError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    // a non-JSON body on 200 is still a rejection
    let parsed: std::result::Result<T, _> = serde_json::from_str(&body);
    parsed.map_err(|_| TrafficSyncError::Rejected {
        status: status.as_u16(),
        body,
    })
}
