// Copyright 2025 chenjjiaa
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

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::types::{
	EventType, MatchingMode, Order, OrderEvent, OrderId, Price, Side, Trade, TraderId,
};

/// Priority rank of a resting order
///
/// One keyed heap per side replaces per-mode queue pairs: `price_rank`
/// orders both sides best-first (ask prices are negated) and the tie key
/// encodes the discipline, (recv_time, order_id) under price-time and
/// (order_id, order_id) under latency-fair. `BinaryHeap` pops the maximum,
/// so the tie component is reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PriorityKey {
	price_rank: Price,
	tie: Reverse<(u64, u64)>,
}

fn priority_key(mode: MatchingMode, side: Side, order: &Order) -> PriorityKey {
	let price_rank = match side {
		Side::Buy => order.price,
		Side::Sell => -order.price,
	};
	let tie = match mode {
		MatchingMode::NaivePriceTime => (order.recv_time, order.order_id),
		MatchingMode::LatencyFairBatched => (order.order_id, order.order_id),
	};
	PriorityKey {
		price_rank,
		tie: Reverse(tie),
	}
}

/// Batch sort rank: buys first, then best price, then the discipline tie.
fn batch_rank(mode: MatchingMode, ev: &OrderEvent) -> (u8, Price, u64, u64) {
	let (side_rank, price_rank) = match ev.side {
		Side::Buy => (0, -ev.price),
		Side::Sell => (1, ev.price),
	};
	let (tie_a, tie_b) = match mode {
		MatchingMode::NaivePriceTime => (ev.recv_time, ev.order_id),
		MatchingMode::LatencyFairBatched => (ev.order_id, ev.order_id),
	};
	(side_rank, price_rank, tie_a, tie_b)
}

#[derive(Debug, Clone)]
struct RankedOrder {
	key: PriorityKey,
	order: Order,
}

impl PartialEq for RankedOrder {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl Eq for RankedOrder {}

impl PartialOrd for RankedOrder {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for RankedOrder {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.key.cmp(&other.key)
	}
}

/// One side of the book: a keyed max-heap plus cancel bookkeeping
///
/// Cancelled ids are tombstoned rather than searched for in the heap.
/// `purge_top` drops tombstones the moment they surface, so the heap top
/// is always a live order and best-price reads stay O(1).
#[derive(Debug, Default)]
struct BookSide {
	heap: BinaryHeap<RankedOrder>,
	resting: HashSet<OrderId>,
	cancelled: HashSet<OrderId>,
}

impl BookSide {
	fn push(&mut self, key: PriorityKey, order: Order) {
		self.resting.insert(order.order_id);
		self.heap.push(RankedOrder { key, order });
	}

	fn peek(&self) -> Option<&Order> {
		self.heap.peek().map(|ranked| &ranked.order)
	}

	fn pop(&mut self) -> Option<Order> {
		let ranked = self.heap.pop()?;
		self.resting.remove(&ranked.order.order_id);
		self.purge_top();
		Some(ranked.order)
	}

	fn cancel(&mut self, order_id: OrderId) -> bool {
		if !self.resting.remove(&order_id) {
			return false;
		}
		self.cancelled.insert(order_id);
		self.purge_top();
		true
	}

	fn purge_top(&mut self) {
		while let Some(top) = self.heap.peek() {
			if self.cancelled.remove(&top.order.order_id) {
				self.heap.pop();
			} else {
				break;
			}
		}
	}

	fn depth(&self) -> usize {
		self.resting.len()
	}

	fn clear(&mut self) {
		self.heap.clear();
		self.resting.clear();
		self.cancelled.clear();
	}
}

/// Point-in-time view of the book's public surface
///
/// A zero best price means the side is empty; it is a sentinel, not a
/// legitimate tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
	pub best_bid: Price,
	pub best_ask: Price,
	pub buy_depth: usize,
	pub sell_depth: usize,
}

/// Two-sided limit order book with a pluggable priority discipline
///
/// The discipline is fixed at construction: price priority on both sides,
/// with arrival time breaking ties under `NaivePriceTime` and order id
/// under `LatencyFairBatched`. Resting orders rank incompatibly across
/// the two disciplines, so a mode change swaps the whole book.
#[derive(Debug)]
pub struct OrderBook {
	mode: MatchingMode,
	bids: BookSide,
	asks: BookSide,
}

impl OrderBook {
	pub fn new(mode: MatchingMode) -> Self {
		Self {
			mode,
			bids: BookSide::default(),
			asks: BookSide::default(),
		}
	}

	pub fn mode(&self) -> MatchingMode {
		self.mode
	}

	/// Best bid price, 0 when the bid side is empty.
	pub fn best_bid(&self) -> Price {
		self.bids.peek().map(|order| order.price).unwrap_or(0)
	}

	/// Best ask price, 0 when the ask side is empty.
	pub fn best_ask(&self) -> Price {
		self.asks.peek().map(|order| order.price).unwrap_or(0)
	}

	pub fn buy_depth(&self) -> usize {
		self.bids.depth()
	}

	pub fn sell_depth(&self) -> usize {
		self.asks.depth()
	}

	pub fn snapshot(&self) -> BookSnapshot {
		BookSnapshot {
			best_bid: self.best_bid(),
			best_ask: self.best_ask(),
			buy_depth: self.buy_depth(),
			sell_depth: self.sell_depth(),
		}
	}

	/// Empty both sides.
	pub fn clear(&mut self) {
		self.bids.clear();
		self.asks.clear();
	}

	/// Remove a resting order.
	///
	/// Returns false when the order is unknown or already consumed; the
	/// call is otherwise a no-op.
	pub fn cancel(&mut self, side: Side, order_id: OrderId) -> bool {
		match side {
			Side::Buy => self.bids.cancel(order_id),
			Side::Sell => self.asks.cancel(order_id),
		}
	}

	/// Match-then-rest for a single incoming event.
	///
	/// New orders walk the opposite side while prices cross, then rest
	/// with whatever quantity remains. Cancel events remove the referenced
	/// resting order and produce no trades.
	pub fn process_order(
		&mut self,
		ev: &OrderEvent,
		trader_id: TraderId,
		clock: &dyn Clock,
	) -> Vec<Trade> {
		if ev.event_type == EventType::Cancel {
			self.cancel(ev.side, ev.order_id);
			return Vec::new();
		}
		let order = Order::from_event(ev, trader_id);
		self.match_order(order, ev.side, clock)
	}

	/// Sort a batch by the active discipline, then match each event in
	/// turn against the evolving book state.
	///
	/// Cancels apply first, in submission order: they carry no price
	/// priority, so a new order must never jump ahead of a cancel that
	/// reached the batch before it. `trader_ids` is indexed alongside
	/// `batch`; it fills in the participant when an event carries trader
	/// id 0. Pre-sorting the input is harmless: the internal sort makes
	/// the outcome identical.
	pub fn process_batch(
		&mut self,
		batch: &[OrderEvent],
		trader_ids: &[TraderId],
		clock: &dyn Clock,
	) -> Vec<Trade> {
		for ev in batch {
			if ev.event_type == EventType::Cancel {
				self.cancel(ev.side, ev.order_id);
			}
		}

		let mode = self.mode;
		let mut entries: Vec<(&OrderEvent, TraderId)> = batch
			.iter()
			.zip(trader_ids.iter().copied())
			.filter(|(ev, _)| ev.event_type == EventType::New)
			.collect();
		entries.sort_by_key(|&(ev, _)| batch_rank(mode, ev));

		let mut all_trades = Vec::new();
		for (ev, trader_id) in entries {
			all_trades.extend(self.process_order(ev, trader_id, clock));
		}
		all_trades
	}

	/// Core matching loop.
	///
	/// The maker sets the price. A partially filled maker goes back on the
	/// book; a partially filled taker rests on its own side afterwards.
	fn match_order(&mut self, mut order: Order, side: Side, clock: &dyn Clock) -> Vec<Trade> {
		let mode = self.mode;
		let exec_time = clock.now_ns();
		let mut trades = Vec::new();

		let (own, opposite) = match side {
			Side::Buy => (&mut self.bids, &mut self.asks),
			Side::Sell => (&mut self.asks, &mut self.bids),
		};

		while order.remaining_qty > 0 {
			let maker_price = match opposite.peek() {
				Some(maker) => maker.price,
				None => break,
			};
			let crossed = match side {
				Side::Buy => maker_price <= order.price,
				Side::Sell => maker_price >= order.price,
			};
			if !crossed {
				break;
			}

			let Some(mut maker) = opposite.pop() else {
				break;
			};
			let trade_qty = order.remaining_qty.min(maker.remaining_qty);

			let trade = match side {
				Side::Buy => Trade {
					buy_order_id: order.order_id,
					sell_order_id: maker.order_id,
					price: maker.price,
					qty: trade_qty,
					execution_time: exec_time,
					buy_trader_id: order.trader_id,
					sell_trader_id: maker.trader_id,
				},
				Side::Sell => Trade {
					buy_order_id: maker.order_id,
					sell_order_id: order.order_id,
					price: maker.price,
					qty: trade_qty,
					execution_time: exec_time,
					buy_trader_id: maker.trader_id,
					sell_trader_id: order.trader_id,
				},
			};
			trades.push(trade);

			order.remaining_qty -= trade_qty;
			maker.remaining_qty -= trade_qty;

			if maker.remaining_qty > 0 {
				let key = priority_key(mode, side.opposite(), &maker);
				opposite.push(key, maker);
			}
		}

		if order.remaining_qty > 0 {
			let key = priority_key(mode, side, &order);
			own.push(key, order);
		}

		trades
	}
}
