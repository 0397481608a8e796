use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{NamingError, Result};
use crate::naming::bus::EventSink;
use crate::naming::events::NamingEvent;
use crate::naming::pattern::FuzzyPattern;
use crate::naming::types::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuzzyRequestType {
    Subscribe,
    Cancel,
}

impl FuzzyRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "SUBSCRIBE",
            Self::Cancel => "CANCEL",
        }
    }
}

impl FromStr for FuzzyRequestType {
    type Err = NamingError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "CANCEL" => Ok(Self::Cancel),
            other => Err(NamingError::invalid_param(format!("Unsupported request type {}", other))),
        }
    }
}

impl fmt::Display for FuzzyRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fuzzy subscribe/cancel request as sent by a client.
/// `request_type` stays a string so unknown values reach the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzySubscribeRequest {
    pub service_name_pattern: String,
    #[serde(default)]
    pub group_name_pattern: String,
    #[serde(default)]
    pub namespace_id: String,
    pub request_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuzzySubscribeResponse {
    pub success: bool,
    pub request_type: FuzzyRequestType,
}

/// Caller details supplied by the connection layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub connection_id: ClientId,
    pub client_ip: String,
}

impl RequestMeta {
    pub fn new(connection_id: impl Into<ClientId>, client_ip: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            client_ip: client_ip.into(),
        }
    }
}

/// Turns fuzzy subscribe requests into client operation events
pub struct FuzzySubscribeRequestHandler {
    sink: Arc<dyn EventSink>,
    default_namespace: String,
    default_group: String,
}

impl FuzzySubscribeRequestHandler {
    pub fn new(sink: Arc<dyn EventSink>, default_namespace: impl Into<String>, default_group: impl Into<String>) -> Self {
        Self {
            sink,
            default_namespace: default_namespace.into(),
            default_group: default_group.into(),
        }
    }

    pub fn handle(&self, request: &FuzzySubscribeRequest, meta: &RequestMeta) -> Result<FuzzySubscribeResponse> {
        let request_type: FuzzyRequestType = request.request_type.parse()?;

        let namespace = if request.namespace_id.is_empty() {
            self.default_namespace.as_str()
        } else {
            request.namespace_id.as_str()
        };
        let group = if request.group_name_pattern.is_empty() {
            self.default_group.as_str()
        } else {
            request.group_name_pattern.as_str()
        };
        let pattern = FuzzyPattern::new(namespace, &request.service_name_pattern, group)?;
        debug!("{} request for {} from {} ({})", request_type, pattern, meta.connection_id, meta.client_ip);

        let pattern = pattern.completed();
        let client_id = meta.connection_id.clone();
        let event = match request_type {
            FuzzyRequestType::Subscribe => NamingEvent::ClientFuzzySubscribe { pattern, client_id },
            FuzzyRequestType::Cancel => NamingEvent::ClientCancelFuzzySubscribe { pattern, client_id },
        };
        self.sink.publish(event)?;
        info!("Accepted {} request from {}", request_type, meta.connection_id);

        Ok(FuzzySubscribeResponse {
            success: true,
            request_type,
        })
    }

    /// Decodes a JSON request body, then handles it
    pub fn handle_json(&self, body: &str, meta: &RequestMeta) -> Result<FuzzySubscribeResponse> {
        let request: FuzzySubscribeRequest = serde_json::from_str(body)?;
        self.handle(&request, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::error::ErrorCode;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<NamingEvent>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: NamingEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn handler() -> (FuzzySubscribeRequestHandler, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (FuzzySubscribeRequestHandler::new(sink.clone(), "public", "DEFAULT_GROUP"), sink)
    }

    fn request(service: &str, group: &str, namespace: &str, request_type: &str) -> FuzzySubscribeRequest {
        FuzzySubscribeRequest {
            service_name_pattern: service.to_string(),
            group_name_pattern: group.to_string(),
            namespace_id: namespace.to_string(),
            request_type: request_type.to_string(),
        }
    }

    #[test]
    fn subscribe_publishes_fuzzy_subscribe_for_connection() {
        let (handler, sink) = handler();
        let meta = RequestMeta::new("conn-1", "10.0.0.1");

        let response = handler.handle(&request("svc*", "G", "N", "SUBSCRIBE"), &meta).unwrap();
        assert_eq!(response, FuzzySubscribeResponse { success: true, request_type: FuzzyRequestType::Subscribe });

        let events = sink.events.lock().unwrap();
        assert!(matches!(&events[0], NamingEvent::ClientFuzzySubscribe { pattern, client_id }
            if pattern == "N##G@@svc*" && client_id == "conn-1"));
    }

    #[test]
    fn cancel_publishes_cancel_event() {
        let (handler, sink) = handler();
        let meta = RequestMeta::new("conn-1", "10.0.0.1");

        let response = handler.handle(&request("svc*", "G", "N", "CANCEL"), &meta).unwrap();
        assert_eq!(response.request_type, FuzzyRequestType::Cancel);
        assert!(matches!(&sink.events.lock().unwrap()[0], NamingEvent::ClientCancelFuzzySubscribe { .. }));
    }

    #[test]
    fn unsupported_type_is_an_invalid_param() {
        let (handler, sink) = handler();
        let err = handler
            .handle(&request("svc*", "G", "N", "LIST"), &RequestMeta::new("c", "ip"))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParam));
        assert!(err.message().contains("LIST"));
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn blanks_fall_back_to_defaults() {
        let (handler, sink) = handler();
        handler.handle(&request("svc*", "", "", "SUBSCRIBE"), &RequestMeta::new("c", "ip")).unwrap();
        assert!(matches!(&sink.events.lock().unwrap()[0], NamingEvent::ClientFuzzySubscribe { pattern, .. }
            if pattern == "public##DEFAULT_GROUP@@svc*"));
    }

    #[test]
    fn malformed_patterns_are_refused() {
        let (handler, _) = handler();
        let meta = RequestMeta::new("c", "ip");

        let empty = handler.handle(&request("", "G", "N", "SUBSCRIBE"), &meta).unwrap_err();
        assert_eq!(empty.code(), Some(ErrorCode::InvalidParam));

        let inner = handler.handle(&request("s*c", "G", "N", "SUBSCRIBE"), &meta).unwrap_err();
        assert_eq!(inner.code(), Some(ErrorCode::MalformedPattern));
        assert!(inner.code().unwrap().is_invalid_param());
        assert!(inner.message().contains("s*c"));
    }

    #[test]
    fn json_bodies_are_decoded() {
        let (handler, _) = handler();
        let meta = RequestMeta::new("c", "ip");
        let body = r#"{"serviceNamePattern":"svc*","groupNamePattern":"G","namespaceId":"N","requestType":"SUBSCRIBE"}"#;
        assert!(handler.handle_json(body, &meta).unwrap().success);

        let err = handler.handle_json("{not json", &meta).unwrap_err();
        assert!(matches!(err, NamingError::Serialization(_)));
    }
}
