use queue_balancer_core::{MessageRef, ProviderError, QueueStatus};
use serde::Deserialize;

/// Fields requested when reading a queue from the monitor API.
pub(crate) const QUEUE_STATUS_SELECT: &str = "queueName,msgs.count,txFlows";
/// Fields requested when listing spooled messages of a queue.
pub(crate) const QUEUE_MSG_SELECT: &str = "replicationGroupMsgId,msgId,undelivered";
pub(crate) const UNDELIVERED_FILTER: &str = "undelivered==true";

const STATUS_NOT_FOUND: &str = "NOT_FOUND";
const STATUS_UNAUTHORIZED: &str = "UNAUTHORIZED";

/// `GET /msgVpns/{vpn}/queues/{queue}` on the monitor API.
#[derive(Debug, Deserialize)]
pub(crate) struct QueueResponse {
    collections: QueueCollections,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueCollections {
    #[serde(default)]
    msgs: CollectionCount,
    /// Absent on brokers that predate flow reporting
    #[serde(default)]
    tx_flows: CollectionCount,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionCount {
    count: Option<u64>,
}

impl QueueResponse {
    pub(crate) fn into_status(self) -> QueueStatus {
        QueueStatus {
            depth: self.collections.msgs.count.unwrap_or(0),
            bound_clients: self.collections.tx_flows.count,
        }
    }
}

/// `GET /msgVpns/{vpn}/queues/{queue}/msgs` on the monitor API.
#[derive(Debug, Deserialize)]
pub(crate) struct QueueMsgsResponse {
    #[serde(default)]
    pub(crate) data: Vec<QueueMsg>,
}

/// One spooled message as listed by the monitor API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMsg {
    pub msg_id: u64,
    pub replication_group_msg_id: String,
    #[serde(default)]
    pub undelivered: Option<bool>,
}

impl From<QueueMsg> for MessageRef {
    fn from(msg: QueueMsg) -> Self {
        MessageRef {
            transfer_id: msg.replication_group_msg_id,
            delete_id: msg.msg_id.to_string(),
            undelivered: msg.undelivered,
        }
    }
}

/// Error envelope carried by every failed SEMP response.
#[derive(Debug, Deserialize)]
pub(crate) struct SempMetaOnlyResponse {
    meta: SempMeta,
}

#[derive(Debug, Deserialize)]
struct SempMeta {
    #[serde(default)]
    error: Option<SempErrorInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SempErrorInfo {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

impl SempErrorInfo {
    pub(crate) fn into_provider_error(self, http_status: u16) -> ProviderError {
        if self.status == STATUS_UNAUTHORIZED || http_status == 401 {
            return ProviderError::Unauthorized {
                description: self.description,
            };
        }
        if self.status == STATUS_NOT_FOUND {
            return ProviderError::NotFound {
                code: self.code,
                description: self.description,
            };
        }
        ProviderError::Other {
            status: self.status,
            code: self.code,
            description: self.description,
        }
    }
}

/// Maps a non-success response body onto the provider error model.
pub(crate) fn error_from_body(http_status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<SempMetaOnlyResponse>(body)
        .ok()
        .and_then(|response| response.meta.error);

    match parsed {
        Some(info) => info.into_provider_error(http_status),
        None if http_status == 401 => ProviderError::Unauthorized {
            description: format!("HTTP {http_status}"),
        },
        None => ProviderError::Other {
            status: format!("HTTP {http_status}"),
            code: None,
            description: if body.trim().is_empty() {
                "empty error response".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_status_from_collections() {
        let response: QueueResponse = serde_json::from_str(
            r#"{"collections":{"msgs":{"count":42},"txFlows":{"count":0}},"data":{"queueName":"q1"},"meta":{"responseCode":200}}"#,
        )
        .unwrap();
        let status = response.into_status();
        assert_eq!(status.depth, 42);
        assert_eq!(status.bound_clients, Some(0));
        assert!(!status.clients_bound());
    }

    #[test]
    fn test_missing_flow_count_counts_as_bound() {
        let response: QueueResponse =
            serde_json::from_str(r#"{"collections":{"msgs":{"count":7}},"meta":{"responseCode":200}}"#)
                .unwrap();
        let status = response.into_status();
        assert_eq!(status.bound_clients, None);
        assert!(status.clients_bound());
    }

    #[test]
    fn test_queue_msg_into_message_ref() {
        let msgs: QueueMsgsResponse = serde_json::from_str(
            r#"{"data":[{"msgId":1234,"replicationGroupMsgId":"rmid1:0d77c-b0b2e66aece-00000000-00000001","undelivered":true}],"meta":{"count":1}}"#,
        )
        .unwrap();
        let message: MessageRef = msgs.data[0].clone().into();
        assert_eq!(message.delete_id, "1234");
        assert_eq!(message.transfer_id, "rmid1:0d77c-b0b2e66aece-00000000-00000001");
        assert_eq!(message.undelivered, Some(true));
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = error_from_body(
            400,
            r#"{"meta":{"error":{"code":6,"description":"Could not find match for queue","status":"NOT_FOUND"},"responseCode":400}}"#,
        );
        assert_eq!(
            not_found,
            ProviderError::NotFound {
                code: Some(6),
                description: "Could not find match for queue".to_string()
            }
        );

        let unauthorized = error_from_body(
            401,
            r#"{"meta":{"error":{"code":8,"description":"Unauthorized","status":"UNAUTHORIZED"}}}"#,
        );
        assert!(matches!(unauthorized, ProviderError::Unauthorized { .. }));

        let other = error_from_body(
            400,
            r#"{"meta":{"error":{"code":11,"description":"Invalid attribute","status":"INVALID_PARAMETER"}}}"#,
        );
        assert_eq!(other.code(), Some(11));
        assert!(matches!(other, ProviderError::Other { ref status, .. } if status == "INVALID_PARAMETER"));
    }

    #[test]
    fn test_unreadable_error_body() {
        assert!(matches!(
            error_from_body(401, "<html>denied</html>"),
            ProviderError::Unauthorized { .. }
        ));
        let err = error_from_body(503, "");
        assert!(
            matches!(err, ProviderError::Other { ref status, ref description, .. }
                if status == "HTTP 503" && description == "empty error response")
        );
    }
}
