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

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::batcher::MicroBatcher;
use crate::book::{BookSnapshot, OrderBook};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::metrics::FairnessMetrics;
use crate::types::{
	EngineError, EventType, MatchingMode, OrderEvent, OrderId, Price, Side, TimeNs, Trade,
	TraderId,
};

/// The matching core: batcher, book, metrics and clock behind one value
///
/// All calls are strictly synchronous and the engine assumes a single
/// logical driver: hold it behind a mutex or hand it to `EngineService`
/// for the single-actor form. Drivers instantiate and discard engines
/// freely; every piece of state dies with the value.
///
/// Events flow `submit` → batcher → (`try_flush`/`force_flush`) → book,
/// with trades and win/loss attribution landing in the metrics. The
/// naive per-event path (`process_immediate`) bypasses the batcher
/// entirely.
pub struct MatchingEngine {
	mode: MatchingMode,
	batcher: MicroBatcher,
	book: OrderBook,
	metrics: FairnessMetrics,
	clock: Box<dyn Clock + Send>,
	last_recv_time: TimeNs,
}

impl MatchingEngine {
	/// Create an engine stamped by the monotonic system clock.
	pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
		Self::with_clock(config, Box::new(SystemClock::new()))
	}

	/// Create an engine with an injected clock.
	///
	/// Injecting a manual clock pins execution times, which makes a
	/// recorded trace replay to byte-identical trades.
	pub fn with_clock(
		config: EngineConfig,
		clock: Box<dyn Clock + Send>,
	) -> Result<Self, EngineError> {
		config.validate()?;
		Ok(Self {
			mode: config.mode,
			batcher: MicroBatcher::new(config.window_ns),
			book: OrderBook::new(config.mode),
			metrics: FairnessMetrics::new(),
			clock,
			last_recv_time: 0,
		})
	}

	pub fn mode(&self) -> MatchingMode {
		self.mode
	}

	pub fn window_ns(&self) -> TimeNs {
		self.batcher.window_ns()
	}

	pub fn metrics(&self) -> &FairnessMetrics {
		&self.metrics
	}

	pub fn has_ready_batch(&self) -> bool {
		self.batcher.has_ready_batch()
	}

	/// Events buffered in the pending batch.
	pub fn pending_events(&self) -> usize {
		self.batcher.len()
	}

	pub fn best_bid(&self) -> Price {
		self.book.best_bid()
	}

	pub fn best_ask(&self) -> Price {
		self.book.best_ask()
	}

	pub fn buy_depth(&self) -> usize {
		self.book.buy_depth()
	}

	pub fn sell_depth(&self) -> usize {
		self.book.sell_depth()
	}

	pub fn snapshot(&self) -> BookSnapshot {
		self.book.snapshot()
	}

	/// Validate and buffer one event.
	///
	/// Rejected events never enter the buffer. New orders count as
	/// submissions the moment they are accepted.
	pub fn submit(&mut self, ev: OrderEvent) -> Result<(), EngineError> {
		self.validate(&ev)?;
		self.last_recv_time = ev.recv_time;

		if ev.event_type == EventType::New {
			self.metrics.record_order_submission(ev.trader_id);
		}
		self.batcher.submit(ev);
		Ok(())
	}

	fn validate(&self, ev: &OrderEvent) -> Result<(), EngineError> {
		if ev.order_id == 0 {
			return Err(EngineError::InvalidEvent("zero order id".to_string()));
		}
		if ev.event_type == EventType::New && ev.qty <= 0 {
			return Err(EngineError::InvalidEvent(format!(
				"non-positive qty {} on order {}",
				ev.qty, ev.order_id
			)));
		}
		if ev.recv_time < self.last_recv_time {
			return Err(EngineError::InvalidEvent(format!(
				"recv_time {} moves backwards (last seen {})",
				ev.recv_time, self.last_recv_time
			)));
		}
		Ok(())
	}

	/// Match the pending batch if its window has elapsed.
	pub fn try_flush(&mut self) -> Vec<Trade> {
		if !self.batcher.has_ready_batch() {
			return Vec::new();
		}
		self.flush_pending()
	}

	/// Match whatever the batcher holds, even below the window threshold.
	///
	/// This is the shutdown path and the way a driver drains stragglers.
	pub fn force_flush(&mut self) -> Vec<Trade> {
		if self.batcher.is_empty() {
			return Vec::new();
		}
		self.flush_pending()
	}

	fn flush_pending(&mut self) -> Vec<Trade> {
		let batch = self.batcher.pop_batch();
		self.process_batch(&batch)
	}

	/// Naive-mode direct path: match one event immediately.
	///
	/// Bypassing the batcher means same-window competitions are invisible
	/// here, so no win/loss attribution happens. Route events through
	/// `submit` when that telemetry matters.
	pub fn process_immediate(
		&mut self,
		ev: OrderEvent,
		trader_id: TraderId,
	) -> Result<Vec<Trade>, EngineError> {
		self.validate(&ev)?;
		self.last_recv_time = ev.recv_time;

		if ev.event_type == EventType::New {
			let submitter = if ev.trader_id != 0 {
				ev.trader_id
			} else {
				trader_id
			};
			self.metrics.record_order_submission(submitter);
		}

		let trades = self.book.process_order(&ev, trader_id, self.clock.as_ref());
		for trade in &trades {
			Self::log_trade(trade);
			self.metrics.record_trade(trade, false);
		}
		Ok(trades)
	}

	fn process_batch(&mut self, batch: &[OrderEvent]) -> Vec<Trade> {
		let trader_ids: Vec<TraderId> = batch.iter().map(|ev| ev.trader_id).collect();
		let trades = self
			.book
			.process_batch(batch, &trader_ids, self.clock.as_ref());

		// A trade is a collision when either participating order came out
		// of a contested (price, side) group of this batch.
		let groups = competition_groups(batch);
		let contested: HashSet<(Price, Side)> = groups
			.iter()
			.filter(|(_, members)| members.len() >= 2)
			.map(|(key, _)| *key)
			.collect();
		let origin: HashMap<OrderId, (Price, Side)> = batch
			.iter()
			.filter(|ev| ev.event_type == EventType::New)
			.map(|ev| (ev.order_id, (ev.price, ev.side)))
			.collect();

		for trade in &trades {
			let was_collision = [trade.buy_order_id, trade.sell_order_id]
				.iter()
				.any(|id| origin.get(id).is_some_and(|key| contested.contains(key)));
			Self::log_trade(trade);
			self.metrics.record_trade(trade, was_collision);
		}

		self.attribute_competition(&groups);
		trades
	}

	/// Credit one winner and charge the losers for every contested
	/// (price, side) group of the batch.
	///
	/// Under latency-fair batching the winner is the smallest order id;
	/// under price-time it is the earliest arrival, order id breaking
	/// exact ties.
	fn attribute_competition(&mut self, groups: &BTreeMap<(Price, Side), Vec<GroupEntry>>) {
		for ((price, side), members) in groups {
			if members.len() < 2 {
				continue;
			}
			let winner = match self.mode {
				MatchingMode::LatencyFairBatched => {
					members.iter().min_by_key(|entry| entry.order_id)
				}
				MatchingMode::NaivePriceTime => members
					.iter()
					.min_by_key(|entry| (entry.recv_time, entry.order_id)),
			};
			let Some(winner) = winner else {
				continue;
			};

			debug!(
				target: "engine",
				price = *price,
				side = ?side,
				contenders = members.len(),
				winner_order = winner.order_id,
				"competition resolved"
			);

			self.metrics.record_trade_win(winner.trader_id);
			for entry in members {
				if entry.order_id != winner.order_id {
					self.metrics.record_trade_loss(entry.trader_id);
				}
			}
		}
	}

	fn log_trade(trade: &Trade) {
		debug!(
			target: "engine",
			buy_order = trade.buy_order_id,
			sell_order = trade.sell_order_id,
			price = trade.price,
			qty = trade.qty,
			buy_trader = trade.buy_trader_id,
			sell_trader = trade.sell_trader_id,
			"trade executed"
		);
	}

	/// Switch the matching discipline.
	///
	/// The two disciplines rank resting orders incompatibly, so the book
	/// is released and rebuilt, the metrics reset, and any in-flight
	/// batch discarded. Switching to the current mode is a no-op.
	pub fn set_mode(&mut self, mode: MatchingMode) {
		if mode == self.mode {
			return;
		}
		info!(target: "engine", from = %self.mode, to = %mode, "switching matching mode");

		self.mode = mode;
		self.book.clear();
		self.book = OrderBook::new(mode);
		self.metrics.reset();
		self.batcher = MicroBatcher::new(self.batcher.window_ns());
		self.last_recv_time = 0;
	}

	/// Change the batching window; the pending batch is discarded.
	pub fn set_window(&mut self, window_ns: TimeNs) -> Result<(), EngineError> {
		if window_ns == 0 {
			return Err(EngineError::InvalidWindow);
		}
		self.batcher.set_window(window_ns);
		Ok(())
	}

	/// Reinitialise book, metrics and batcher; mode and window survive.
	///
	/// After a reset an identical event trace reproduces identical trades
	/// and metrics (given a pinned clock).
	pub fn reset(&mut self) {
		self.book.clear();
		self.metrics.reset();
		self.batcher = MicroBatcher::new(self.batcher.window_ns());
		self.last_recv_time = 0;
	}
}

struct GroupEntry {
	order_id: OrderId,
	recv_time: TimeNs,
	trader_id: TraderId,
}

/// Group a batch's new orders by (price, side).
fn competition_groups(batch: &[OrderEvent]) -> BTreeMap<(Price, Side), Vec<GroupEntry>> {
	let mut groups: BTreeMap<(Price, Side), Vec<GroupEntry>> = BTreeMap::new();
	for ev in batch {
		if ev.event_type != EventType::New {
			continue;
		}
		groups.entry((ev.price, ev.side)).or_default().push(GroupEntry {
			order_id: ev.order_id,
			recv_time: ev.recv_time,
			trader_id: ev.trader_id,
		});
	}
	groups
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;

	fn new_event(
		order_id: u64,
		side: Side,
		price: Price,
		qty: i64,
		recv_time: TimeNs,
		trader_id: TraderId,
	) -> OrderEvent {
		OrderEvent {
			event_type: EventType::New,
			order_id,
			instrument: "STOCK".to_string(),
			side,
			price,
			qty,
			recv_time,
			batch_id: 0,
			trader_id,
		}
	}

	fn test_engine(mode: MatchingMode, window_ns: TimeNs) -> MatchingEngine {
		let config = EngineConfig { mode, window_ns };
		MatchingEngine::with_clock(config, Box::new(ManualClock::new(0)))
			.expect("valid test config")
	}

	#[test]
	fn test_submit_rejects_zero_order_id() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		let result = engine.submit(new_event(0, Side::Buy, 100, 10, 1_000, 1));
		assert!(matches!(result, Err(EngineError::InvalidEvent(_))));
		assert_eq!(engine.pending_events(), 0);
	}

	#[test]
	fn test_submit_rejects_non_positive_qty() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		let result = engine.submit(new_event(1, Side::Buy, 100, 0, 1_000, 1));
		assert!(matches!(result, Err(EngineError::InvalidEvent(_))));
		let result = engine.submit(new_event(2, Side::Buy, 100, -5, 1_000, 1));
		assert!(matches!(result, Err(EngineError::InvalidEvent(_))));
	}

	#[test]
	fn test_submit_rejects_time_regression() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(1, Side::Buy, 100, 10, 2_000, 1)).unwrap();
		let result = engine.submit(new_event(2, Side::Buy, 100, 10, 1_999, 1));
		assert!(matches!(result, Err(EngineError::InvalidEvent(_))));
		assert_eq!(engine.pending_events(), 1);
	}

	#[test]
	fn test_try_flush_respects_window() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 50_000);
		engine.submit(new_event(1, Side::Sell, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Buy, 100, 10, 2_000, 2)).unwrap();

		assert!(engine.try_flush().is_empty());
		assert_eq!(engine.pending_events(), 2);

		engine.submit(new_event(3, Side::Buy, 99, 10, 51_000, 3)).unwrap();
		let trades = engine.try_flush();
		assert_eq!(trades.len(), 1);
		assert_eq!(engine.pending_events(), 0);
	}

	#[test]
	fn test_force_flush_on_empty_batcher_is_noop() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 50_000);
		assert!(engine.force_flush().is_empty());
	}

	#[test]
	fn test_attribution_fair_mode_smallest_id_wins() {
		let mut engine = test_engine(MatchingMode::LatencyFairBatched, 1_000);
		// Two buys contend at price 100; ids 7 and 2.
		engine.submit(new_event(7, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Buy, 100, 10, 1_500, 2)).unwrap();
		engine.force_flush();

		assert_eq!(engine.metrics().win_rate(2), 1.0);
		assert_eq!(engine.metrics().win_rate(1), 0.0);
	}

	#[test]
	fn test_attribution_naive_mode_earliest_wins() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(7, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Buy, 100, 10, 1_500, 2)).unwrap();
		engine.force_flush();

		assert_eq!(engine.metrics().win_rate(1), 1.0);
		assert_eq!(engine.metrics().win_rate(2), 0.0);
	}

	#[test]
	fn test_attribution_naive_equal_times_break_by_order_id() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(7, Side::Sell, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Sell, 100, 10, 1_000, 2)).unwrap();
		engine.force_flush();

		assert_eq!(engine.metrics().win_rate(2), 1.0);
		assert_eq!(engine.metrics().win_rate(1), 0.0);
	}

	#[test]
	fn test_uncontested_batch_attributes_nothing() {
		let mut engine = test_engine(MatchingMode::LatencyFairBatched, 1_000);
		engine.submit(new_event(1, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Buy, 101, 10, 1_500, 2)).unwrap();
		engine.force_flush();

		assert_eq!(engine.metrics().win_rate(1), 0.0);
		assert_eq!(engine.metrics().win_rate(2), 0.0);
		assert_eq!(engine.metrics().fairness_index(), 0.0);
	}

	#[test]
	fn test_collision_flag_on_contested_trades() {
		let mut engine = test_engine(MatchingMode::LatencyFairBatched, 1_000);
		engine.submit(new_event(1, Side::Sell, 100, 10, 1_000, 1)).unwrap();
		engine.submit(new_event(2, Side::Buy, 100, 10, 1_100, 2)).unwrap();
		engine.submit(new_event(3, Side::Buy, 100, 10, 1_200, 3)).unwrap();
		engine.force_flush();

		let records: Vec<_> = engine.metrics().trade_history().collect();
		assert_eq!(records.len(), 1);
		assert!(records[0].was_collision);
	}

	#[test]
	fn test_immediate_path_skips_attribution() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine
			.process_immediate(new_event(1, Side::Sell, 100, 10, 1_000, 1), 1)
			.unwrap();
		let trades = engine
			.process_immediate(new_event(2, Side::Buy, 100, 10, 2_000, 2), 2)
			.unwrap();

		assert_eq!(trades.len(), 1);
		assert_eq!(engine.metrics().win_rate(1), 0.0);
		assert_eq!(engine.metrics().win_rate(2), 0.0);

		let records: Vec<_> = engine.metrics().trade_history().collect();
		assert!(!records[0].was_collision);
	}

	#[test]
	fn test_set_mode_discards_state() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(1, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.force_flush();
		assert_eq!(engine.buy_depth(), 1);

		engine.set_mode(MatchingMode::LatencyFairBatched);
		assert_eq!(engine.mode(), MatchingMode::LatencyFairBatched);
		assert_eq!(engine.buy_depth(), 0);
		assert_eq!(engine.metrics().trade_history().count(), 0);
		assert_eq!(engine.window_ns(), 1_000);
	}

	#[test]
	fn test_set_mode_same_mode_keeps_state() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(1, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.force_flush();

		engine.set_mode(MatchingMode::NaivePriceTime);
		assert_eq!(engine.buy_depth(), 1);
	}

	#[test]
	fn test_set_window_rejects_zero() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		assert!(matches!(engine.set_window(0), Err(EngineError::InvalidWindow)));
		assert_eq!(engine.window_ns(), 1_000);
	}

	#[test]
	fn test_set_window_discards_pending_batch() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		engine.submit(new_event(1, Side::Buy, 100, 10, 1_000, 1)).unwrap();
		engine.set_window(2_000).unwrap();
		assert_eq!(engine.pending_events(), 0);
		assert_eq!(engine.window_ns(), 2_000);
	}

	#[test]
	fn test_zero_trader_id_falls_back_in_immediate_path() {
		let mut engine = test_engine(MatchingMode::NaivePriceTime, 1_000);
		let ev = new_event(1, Side::Sell, 100, 10, 1_000, 0);
		engine.process_immediate(ev, 9).unwrap();

		let trades = engine
			.process_immediate(new_event(2, Side::Buy, 100, 10, 2_000, 2), 2)
			.unwrap();
		assert_eq!(trades[0].sell_trader_id, 9);
	}
}
