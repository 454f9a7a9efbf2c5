//! Wire types shared by every layer
//!
//! The JSON produced here is the public contract: it is returned by
//! `POST /orders`, carried on the `order_updates` topic and pushed verbatim
//! to every streaming subscriber.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 行情主题（外部行情源发布，原样透传）
pub const MARKET_TICKS_TOPIC: &str = "market_ticks";

/// 订单状态更新主题
pub const ORDER_UPDATES_TOPIC: &str = "order_updates";

/// Topics the fan-out hub relays to streaming clients.
pub const STREAM_TOPICS: [&str; 2] = [MARKET_TICKS_TOPIC, ORDER_UPDATES_TOPIC];

/// Globally unique order identifier, assigned at admission.
pub type OrderId = Uuid;

/// 买卖方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// 订单状态
///
/// `Pending` is the only non-terminal state. Allowed transitions live in
/// `domain::order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a textual enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Side {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("BUY") {
            Ok(Side::Buy)
        } else if s.eq_ignore_ascii_case("SELL") {
            Ok(Side::Sell)
        } else {
            Err(ParseEnumError { kind: "side", value: s.to_string() })
        }
    }
}

impl FromStr for OrderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("MARKET") {
            Ok(OrderType::Market)
        } else if s.eq_ignore_ascii_case("LIMIT") {
            Ok(OrderType::Limit)
        } else {
            Err(ParseEnumError { kind: "order type", value: s.to_string() })
        }
    }
}

/// 客户端下单请求
///
/// `side` and `type` stay textual and `quantity` signed so that bad values
/// are reported by the validator instead of failing JSON decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// 订单记录（同时也是 `order_updates` 的消息体）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// 行情快照（`market_ticks` 的消息体）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume: u64,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// A message carried on the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub topic: String,
    pub payload: Bytes,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parsing_ignores_case() {
        assert_eq!(Side::from_str("BUY").unwrap(), Side::Buy);
        assert_eq!(Side::from_str("sell").unwrap(), Side::Sell);
        assert_eq!(Side::from_str(" Buy ").unwrap(), Side::Buy);

        let err = Side::from_str("HOLD").unwrap_err();
        assert_eq!(err.kind, "side");
        assert_eq!(err.value, "HOLD");
    }

    #[test]
    fn test_order_type_parsing() {
        assert_eq!(OrderType::from_str("MARKET").unwrap(), OrderType::Market);
        assert_eq!(OrderType::from_str("limit").unwrap(), OrderType::Limit);
        assert!(OrderType::from_str("STOP").is_err());
    }

    #[test]
    fn test_request_decodes_from_client_json() {
        let json = r#"{"symbol":"TCS","side":"BUY","type":"MARKET","quantity":10,"price":0}"#;
        let request: OrderRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.symbol, "TCS");
        assert_eq!(request.side, "BUY");
        assert_eq!(request.order_type, "MARKET");
        assert_eq!(request.quantity, 10);
        assert_eq!(request.price, Decimal::ZERO);
    }

    #[test]
    fn test_request_keeps_negative_quantity_for_validation() {
        let json = r#"{"symbol":"TCS","side":"BUY","type":"LIMIT","quantity":-5,"price":2500.5}"#;
        let request: OrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.quantity, -5);
        assert_eq!(request.price, Decimal::new(25005, 1));
    }

    #[test]
    fn test_order_wire_format() {
        let order = Order {
            id: Uuid::nil(),
            symbol: "INFY".to_string(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity: 3,
            price: Decimal::new(15005, 1),
            status: OrderStatus::Pending,
            created_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let value: serde_json::Value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["side"], "SELL");
        assert_eq!(value["type"], "LIMIT");
        assert_eq!(value["quantity"], 3);
        assert_eq!(value["price"], 1500.5);
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["created_at"], "2026-01-02T03:04:05Z");
    }
}
