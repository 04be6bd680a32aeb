use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// DAP request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: String,
    pub command: String,
    #[serde(default)]
    pub arguments: Value,
}

impl Request {
    pub fn from_value(message: Value) -> serde_json::Result<Self> {
        serde_json::from_value(message)
    }

    /// Adapter-native sub-request issued on behalf of an incoming request.
    /// Numbered right after its parent in the sequence space.
    pub fn forwarded(parent: &Request, command: &str, arguments: Value) -> Value {
        json!({
            "type": "request",
            "command": command,
            "seq": parent.seq + 1,
            "arguments": arguments,
        })
    }
}

/// DAP response envelope.
///
/// Note: the DAP specification allows responses with no `body` field at all.
/// Using a `serde_json::Value` keeps the envelope stable and avoids type
/// inference issues around `None` bodies.
#[derive(Debug, Serialize)]
pub struct Response {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub request_seq: i64,
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    pub fn success(request: &Request, body: Value) -> Self {
        Self {
            seq: request.seq,
            r#type: "response",
            request_seq: request.seq,
            success: true,
            command: request.command.clone(),
            message: None,
            body: Some(body),
        }
    }

    /// Successful acknowledgment without a body.
    pub fn ack(request: &Request) -> Self {
        Self {
            body: None,
            ..Self::success(request, Value::Null)
        }
    }

    /// Degraded reply: `success: false`, no body. Callers must not assume a
    /// body is always populated.
    pub fn failure(request: &Request) -> Self {
        Self {
            success: false,
            body: None,
            ..Self::success(request, Value::Null)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_arguments_default_to_null() {
        let request =
            Request::from_value(json!({"seq": 3, "type": "request", "command": "configurationDone"}))
                .unwrap();
        assert_eq!(request.seq, 3);
        assert!(request.arguments.is_null());
    }

    #[test]
    fn test_response_without_body_has_no_body_field() {
        let request =
            Request::from_value(json!({"seq": 7, "type": "request", "command": "configurationDone"}))
                .unwrap();
        let reply = serde_json::to_value(Response::ack(&request)).unwrap();
        assert_eq!(
            reply,
            json!({
                "seq": 7,
                "type": "response",
                "request_seq": 7,
                "success": true,
                "command": "configurationDone",
            })
        );
    }

    #[test]
    fn test_failure_has_no_body() {
        let request = Request::from_value(
            json!({"seq": 1, "type": "request", "command": "richInspectVariables"}),
        )
        .unwrap();
        let reply = serde_json::to_value(Response::failure(&request)).unwrap();
        assert_eq!(reply.get("success"), Some(&json!(false)));
        assert!(reply.get("body").is_none());
    }

    #[test]
    fn test_forwarded_request_is_numbered_after_parent() {
        let request = Request::from_value(
            json!({"seq": 10, "type": "request", "command": "richInspectVariables"}),
        )
        .unwrap();
        let forwarded = Request::forwarded(&request, "setExpression", json!({"frameId": 2}));
        assert_eq!(forwarded["seq"], json!(11));
        assert_eq!(forwarded["command"], json!("setExpression"));
        assert_eq!(forwarded["type"], json!("request"));
    }
}
