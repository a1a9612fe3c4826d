use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use queue_balancer_core::{
    MessageRef, MessageTransfer, MoveOperation, ProviderError, QueueStatus, TelemetryProvider,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{SempConfig, SempEndpoints};
use crate::error::Result;
use crate::types::{
    error_from_body, QueueMsg, QueueMsgsResponse, QueueResponse, QUEUE_MSG_SELECT,
    QUEUE_STATUS_SELECT, UNDELIVERED_FILTER,
};

type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CopyMsgFromQueueRequest<'a> {
    replication_group_msg_id: &'a str,
    source_queue_name: &'a str,
}

#[derive(Serialize)]
struct EmptyRequest {}

/// SEMPv2 client bound to one message VPN.
///
/// Cheap to clone, the underlying connection pool is shared.
#[derive(Clone)]
pub struct SempClient {
    http: Client,
    endpoints: SempEndpoints,
    message_vpn: String,
    username: String,
    password: String,
    scan_depth: u32,
    allow_delivered_fallback: bool,
}

impl SempClient {
    pub fn new(config: SempConfig) -> Result<Self> {
        let endpoints = SempEndpoints::from_base(&config.semp_base)?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        debug!(
            monitor = %endpoints.monitor,
            action = %endpoints.action,
            vpn = %config.message_vpn,
            "SEMP client configured"
        );

        Ok(Self {
            http,
            endpoints,
            message_vpn: config.message_vpn,
            username: config.username,
            password: config.password,
            scan_depth: config.scan_depth.max(1),
            allow_delivered_fallback: config.allow_delivered_fallback,
        })
    }

    pub fn endpoints(&self) -> &SempEndpoints {
        &self.endpoints
    }

    /// `{root}/msgVpns/{vpn}/queues/{queue}/{tail..}` with every segment percent-encoded.
    fn queue_url(&self, root: &Url, queue: &str, tail: &[&str]) -> ProviderResult<Url> {
        let mut url = root.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport(format!("{root} cannot carry a path")))?
            .pop_if_empty()
            .extend(["msgVpns", self.message_vpn.as_str(), "queues", queue])
            .extend(tail);
        Ok(url)
    }

    /// Sends the request with credentials and returns the body of a successful response.
    async fn execute(&self, request: RequestBuilder) -> ProviderResult<String> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            trace!(status = status.as_u16(), body = %body, "SEMP request rejected");
            Err(error_from_body(status.as_u16(), &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        trace!(url = %url, "SEMP GET");
        let body = self.execute(self.http.get(url).query(query)).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn put_action<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> ProviderResult<()> {
        trace!(url = %url, "SEMP PUT");
        self.execute(self.http.put(url).json(body)).await.map(|_| ())
    }

    async fn list_msgs(
        &self,
        queue: &str,
        count: u32,
        filter: Option<&str>,
    ) -> ProviderResult<Vec<QueueMsg>> {
        let url = self.queue_url(&self.endpoints.monitor, queue, &["msgs"])?;
        let mut query = vec![
            ("count", count.to_string()),
            ("select", QUEUE_MSG_SELECT.to_string()),
        ];
        if let Some(filter) = filter {
            query.push(("where", filter.to_string()));
        }
        let response: QueueMsgsResponse = self.get_json(url, &query).await?;
        Ok(response.data)
    }
}

impl fmt::Debug for SempClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SempClient")
            .field("endpoints", &self.endpoints)
            .field("message_vpn", &self.message_vpn)
            .field("username", &self.username)
            .field("scan_depth", &self.scan_depth)
            .field("allow_delivered_fallback", &self.allow_delivered_fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TelemetryProvider for SempClient {
    async fn queue_status(&self, queue: &str) -> ProviderResult<QueueStatus> {
        let url = self.queue_url(&self.endpoints.monitor, queue, &[])?;
        let response: QueueResponse = self
            .get_json(url, &[("select", QUEUE_STATUS_SELECT.to_string())])
            .await?;
        Ok(response.into_status())
    }
}

#[async_trait]
impl MessageTransfer for SempClient {
    async fn select_message(
        &self,
        queue: &str,
        prefer_undelivered: bool,
    ) -> ProviderResult<Option<MessageRef>> {
        if prefer_undelivered {
            // the where filter is applied after the count, so scan several messages deep
            let candidates = self
                .list_msgs(queue, self.scan_depth, Some(UNDELIVERED_FILTER))
                .await?;
            if let Some(msg) = candidates.into_iter().next() {
                return Ok(Some(msg.into()));
            }
            if !self.allow_delivered_fallback {
                debug!(queue = %queue, "no undelivered message within scan depth");
                return Ok(None);
            }
            debug!(queue = %queue, "no undelivered message within scan depth, taking the oldest");
        }

        let oldest = self.list_msgs(queue, 1, None).await?;
        Ok(oldest.into_iter().next().map(MessageRef::from))
    }

    async fn move_message(&self, operation: &MoveOperation) -> ProviderResult<()> {
        let copy_url = self.queue_url(
            &self.endpoints.action,
            &operation.target_queue,
            &["copyMsgFromQueue"],
        )?;
        self.put_action(
            copy_url,
            &CopyMsgFromQueueRequest {
                replication_group_msg_id: &operation.transfer_id,
                source_queue_name: &operation.source_queue,
            },
        )
        .await?;

        let delete_url = self.queue_url(
            &self.endpoints.action,
            &operation.source_queue,
            &["msgs", operation.delete_id.as_str(), "delete"],
        )?;
        self.put_action(delete_url, &EmptyRequest {}).await?;

        trace!(
            source = %operation.source_queue,
            target = %operation.target_queue,
            rmid = %operation.transfer_id,
            "message moved"
        );
        Ok(())
    }
}
