// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Price in integer ticks. No floating point anywhere in the core.
pub type Price = i64;
/// Order quantity. Strictly positive on new orders.
pub type Qty = i64;
/// Producer-assigned order identifier, unique across the session.
pub type OrderId = u64;
/// Nanoseconds since an arbitrary monotonic epoch.
pub type TimeNs = u64;
/// Batch identifier stamped by the batcher. Zero means "not yet batched".
pub type BatchId = u64;
/// Participant identifier.
pub type TraderId = u32;

/// Order side (buy or sell)
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// The side an incoming order matches against.
	pub fn opposite(self) -> Side {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
		}
	}
}

/// Event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
	New,
	Cancel,
}

/// Matching discipline, fixed per book instance
///
/// `NaivePriceTime` is the conventional exchange rule: price priority,
/// arrival time breaks ties. `LatencyFairBatched` ranks same-price orders
/// by order id instead, so arrival time confers no advantage inside a
/// batch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
	#[serde(alias = "naive")]
	NaivePriceTime,
	#[serde(alias = "fair")]
	LatencyFairBatched,
}

impl fmt::Display for MatchingMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MatchingMode::NaivePriceTime => write!(f, "naive_price_time"),
			MatchingMode::LatencyFairBatched => write!(f, "latency_fair_batched"),
		}
	}
}

impl FromStr for MatchingMode {
	type Err = EngineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"naive" | "naive_price_time" => Ok(MatchingMode::NaivePriceTime),
			"fair" | "latency_fair_batched" => Ok(MatchingMode::LatencyFairBatched),
			other => Err(EngineError::UnknownMode(other.to_string())),
		}
	}
}

/// Order event received from the driver
///
/// This is the already-deserialised input record: the driver stamps
/// `recv_time` (after any simulated participant latency) before handing
/// the event to the engine, which keeps a recorded trace replayable.
/// `batch_id` stays zero until the batcher stamps it and is immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
	/// Event type
	#[serde(rename = "type")]
	pub event_type: EventType,
	/// Producer-assigned order id, unique across the session
	pub order_id: OrderId,
	/// Instrument label (opaque, not interpreted by the core)
	pub instrument: String,
	/// Order side
	pub side: Side,
	/// Limit price in ticks
	pub price: Price,
	/// Quantity (strictly positive on new orders)
	pub qty: Qty,
	/// When the engine observed the event
	pub recv_time: TimeNs,
	/// Batch id assigned by the batcher (0 until stamped)
	pub batch_id: BatchId,
	/// Submitting participant
	pub trader_id: TraderId,
}

/// Resting-book representation of an accepted order
///
/// Owned exclusively by the book from insertion until fully consumed.
/// `remaining_qty` is decremented on partial fills and stays within
/// `0..=qty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	pub order_id: OrderId,
	pub price: Price,
	pub qty: Qty,
	pub remaining_qty: Qty,
	pub recv_time: TimeNs,
	pub batch_id: BatchId,
	pub trader_id: TraderId,
}

impl Order {
	/// Build the resting representation of a new-order event.
	///
	/// The event's own trader id wins; the fallback applies only when the
	/// producer left it zero.
	pub fn from_event(ev: &OrderEvent, fallback_trader_id: TraderId) -> Self {
		Self {
			order_id: ev.order_id,
			price: ev.price,
			qty: ev.qty,
			remaining_qty: ev.qty,
			recv_time: ev.recv_time,
			batch_id: ev.batch_id,
			trader_id: if ev.trader_id != 0 {
				ev.trader_id
			} else {
				fallback_trader_id
			},
		}
	}
}

/// Immutable execution record
///
/// The price is always the resting (maker) order's price at the moment of
/// the match; the quantity is min(taker remaining, maker remaining) and
/// is never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
	pub buy_order_id: OrderId,
	pub sell_order_id: OrderId,
	pub price: Price,
	pub qty: Qty,
	pub execution_time: TimeNs,
	pub buy_trader_id: TraderId,
	pub sell_trader_id: TraderId,
}

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("Invalid event: {0}")]
	InvalidEvent(String),
	#[error("Unknown matching mode: {0}")]
	UnknownMode(String),
	#[error("Batch window must be positive")]
	InvalidWindow,
}
