//! Open API JSON frame encoding and decoding.
//!
//! Every frame is an envelope `{"clientMsgId", "payloadType", "payload"}`.
//! Responses echo the `clientMsgId` of their request; push events carry
//! none.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Result;
use crate::error::FeedError;
use crate::models::{ErrorResponse, PayloadType, PushEvent, Request};
use crate::upstream::Response;

/// Wire envelope shared by all frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    pub payload_type: u32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A decoded inbound frame.
#[derive(Debug)]
pub enum Frame {
    /// Answer to the request sent with `client_msg_id`.
    Reply {
        client_msg_id: String,
        reply: std::result::Result<Response, ErrorResponse>,
    },
    Event(PushEvent),
    /// A payload type this crate does not consume.
    Unhandled {
        payload_type: u32,
        client_msg_id: Option<String>,
    },
}

/// Serializes `request` into a text frame tagged with `client_msg_id`.
///
/// # Errors
///
/// Returns [`FeedError::Json`] if the payload cannot be serialized.
pub fn encode_request(client_msg_id: &str, request: &Request) -> Result<String> {
    let envelope = Envelope {
        client_msg_id: Some(client_msg_id.to_string()),
        payload_type: request.payload_type().as_u32(),
        payload: request.payload()?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Serializes a client heartbeat.
pub fn encode_heartbeat() -> Result<String> {
    let envelope = Envelope {
        client_msg_id: None,
        payload_type: PayloadType::HeartbeatEvent.as_u32(),
        payload: serde_json::json!({}),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decodes one inbound text frame.
///
/// # Errors
///
/// Returns [`FeedError::MalformedMessage`] if the text is not an envelope or
/// a known payload does not match its type.
pub fn parse_frame(text: &str) -> Result<Frame> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| FeedError::MalformedMessage(format!("invalid envelope: {e}")))?;
    let Envelope {
        client_msg_id,
        payload_type,
        payload,
    } = envelope;

    let Some(kind) = PayloadType::from_u32(payload_type) else {
        trace!(payload_type, "Unknown payload type");
        return Ok(Frame::Unhandled {
            payload_type,
            client_msg_id,
        });
    };

    let event = match kind {
        PayloadType::HeartbeatEvent => Some(PushEvent::Heartbeat),
        PayloadType::SpotEvent => Some(PushEvent::Spot(decode(kind, payload.clone())?)),
        PayloadType::ClientDisconnectEvent => {
            Some(PushEvent::ClientDisconnect(decode(kind, payload.clone())?))
        }
        PayloadType::AccountDisconnectEvent => {
            Some(PushEvent::AccountDisconnect(decode(kind, payload.clone())?))
        }
        _ => None,
    };
    if let Some(event) = event {
        return Ok(Frame::Event(event));
    }

    let Some(client_msg_id) = client_msg_id else {
        return Ok(Frame::Unhandled {
            payload_type,
            client_msg_id: None,
        });
    };

    let reply = if kind.is_error() {
        Err(decode::<ErrorResponse>(kind, payload)?)
    } else {
        Ok(Response {
            payload_type: kind,
            payload,
        })
    };
    Ok(Frame::Reply {
        client_msg_id,
        reply,
    })
}

fn decode<T: serde::de::DeserializeOwned>(kind: PayloadType, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        FeedError::MalformedMessage(format!("payload type {}: {e}", kind.as_u32()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubscribeSpotsReq, TrendbarPeriod};

    #[test]
    fn encodes_request_envelope() {
        let request = Request::SubscribeSpots(SubscribeSpotsReq::new(42, 1));
        let text = encode_request("cm_7", &request).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["clientMsgId"], "cm_7");
        assert_eq!(value["payloadType"], 2127);
        assert_eq!(value["payload"]["ctidTraderAccountId"], 42);
        assert_eq!(value["payload"]["symbolId"], serde_json::json!([1]));
        assert_eq!(value["payload"]["subscribeToSpotTimestamp"], true);
    }

    #[test]
    fn encodes_heartbeat_without_id() {
        let text = encode_heartbeat().unwrap();
        assert_eq!(text, r#"{"payloadType":51,"payload":{}}"#);
    }

    #[test]
    fn parses_spot_event() {
        let text = r#"{
            "payloadType": 2131,
            "payload": {
                "ctidTraderAccountId": 42,
                "symbolId": 1,
                "bid": 110000,
                "ask": 110020,
                "timestamp": 1700000000000,
                "trendbar": [{
                    "volume": 12,
                    "period": 1,
                    "low": 109990,
                    "deltaOpen": 5,
                    "deltaHigh": 40,
                    "utcTimestampInMinutes": 28333333
                }]
            }
        }"#;

        let Frame::Event(PushEvent::Spot(spot)) = parse_frame(text).unwrap() else {
            panic!("expected a spot event");
        };
        assert_eq!(spot.symbol_id, 1);
        assert_eq!(spot.bid, Some(110_000));
        assert_eq!(spot.timestamp, Some(1_700_000_000_000));
        assert_eq!(spot.trendbar[0].period, Some(TrendbarPeriod::M1));
        assert_eq!(spot.trendbar[0].delta_high, Some(40));
    }

    #[test]
    fn parses_heartbeat_and_disconnects() {
        assert!(matches!(
            parse_frame(r#"{"payloadType":51}"#).unwrap(),
            Frame::Event(PushEvent::Heartbeat)
        ));

        let Frame::Event(PushEvent::ClientDisconnect(event)) =
            parse_frame(r#"{"payloadType":2148,"payload":{"reason":"maintenance"}}"#).unwrap()
        else {
            panic!("expected a client disconnect");
        };
        assert_eq!(event.reason.as_deref(), Some("maintenance"));

        let Frame::Event(PushEvent::AccountDisconnect(event)) =
            parse_frame(r#"{"payloadType":2164,"payload":{"ctidTraderAccountId":42}}"#).unwrap()
        else {
            panic!("expected an account disconnect");
        };
        assert_eq!(event.ctid_trader_account_id, 42);
    }

    #[test]
    fn parses_correlated_replies() {
        let Frame::Reply {
            client_msg_id,
            reply,
        } = parse_frame(r#"{"clientMsgId":"cm_1","payloadType":2101,"payload":{}}"#).unwrap()
        else {
            panic!("expected a reply");
        };
        assert_eq!(client_msg_id, "cm_1");
        assert_eq!(reply.unwrap().payload_type, PayloadType::ApplicationAuthRes);

        let text = r#"{
            "clientMsgId": "cm_2",
            "payloadType": 2142,
            "payload": {"errorCode": "ALREADY_SUBSCRIBED", "description": "Already subscribed"}
        }"#;
        let Frame::Reply { reply, .. } = parse_frame(text).unwrap() else {
            panic!("expected a reply");
        };
        let error = reply.unwrap_err();
        assert_eq!(error.error_code, "ALREADY_SUBSCRIBED");
        assert_eq!(error.description.as_deref(), Some("Already subscribed"));
    }

    #[test]
    fn unknown_or_uncorrelated_frames_are_unhandled() {
        assert!(matches!(
            parse_frame(r#"{"payloadType":2126,"payload":{}}"#).unwrap(),
            Frame::Unhandled {
                payload_type: 2126,
                ..
            }
        ));
        assert!(matches!(
            parse_frame(r#"{"payloadType":2128,"payload":{}}"#).unwrap(),
            Frame::Unhandled {
                client_msg_id: None,
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            parse_frame("not json"),
            Err(FeedError::MalformedMessage(_))
        ));
        assert!(matches!(
            parse_frame(r#"{"payloadType":2131,"payload":{"bid":1}}"#),
            Err(FeedError::MalformedMessage(_))
        ));
    }
}
