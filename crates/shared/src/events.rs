//! Events delivered on the push channel.
//!
//! Every text frame the server emits is one serialized [`Event`], tagged by a
//! `type` field:
//!
//! ```json
//! {"type":"new_order","order_number":"1042","customer_name":"Ada","total":129.5,"currency":"EUR"}
//! {"type":"new_call_request","customer_name":"Ada","phone":"+3312345678","product_name":null}
//! ```

use serde::{Deserialize, Serialize};

/// A new order was placed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_name: String,
    pub total: f64,
    pub currency: String,
}

/// A customer asked to be called back, optionally about a specific product.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewCallRequest {
    pub customer_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// Inbound event from the push channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NewOrder(NewOrder),
    NewCallRequest(NewCallRequest),
}

/// Discriminant of [`Event`], used to pick the counter an event feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewOrder,
    NewCallRequest,
}

impl Event {
    /// Parse a single text frame.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewOrder(_) => EventKind::NewOrder,
            Event::NewCallRequest(_) => EventKind::NewCallRequest,
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewOrder => "new_order",
            EventKind::NewCallRequest => "new_call_request",
        }
    }
}
