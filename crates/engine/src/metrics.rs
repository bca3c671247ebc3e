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

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Price, Qty, TimeNs, Trade, TraderId};

/// Driver-side identity of a participant
///
/// The latency is the artificial delay the driver adds to this
/// participant's submissions; the core never reads it except to find the
/// fastest and slowest participants when deriving reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderProfile {
	pub trader_id: TraderId,
	pub name: String,
	pub latency_ns: TimeNs,
}

/// One row of per-participant statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderStats {
	pub trader_id: TraderId,
	pub name: String,
	pub orders_submitted: u64,
	pub orders_executed: u64,
	pub trades_won: u64,
	pub trades_lost: u64,
	pub win_rate: f64,
	pub execution_rate: f64,
	pub latency_ns: TimeNs,
}

/// Executed-trade record kept in the metrics history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
	pub buy_trader_id: TraderId,
	pub sell_trader_id: TraderId,
	pub price: Price,
	pub qty: Qty,
	pub execution_time: TimeNs,
	/// True when a participating order came out of a contested
	/// (price, side) group of its batch.
	pub was_collision: bool,
}

/// Aggregate fairness report for a set of participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
	pub fairness_index: f64,
	pub latency_advantage_reduction: f64,
	pub traders: Vec<TraderStats>,
}

impl FairnessReport {
	/// Machine-readable form for external sinks.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

/// Per-participant counters and derived fairness indicators
///
/// Counters only grow (an explicit `reset` excepted) and are mutated by
/// the matcher alone. `BTreeMap` keeps every derived quantity independent
/// of insertion order, which the replay tests rely on.
#[derive(Debug, Default)]
pub struct FairnessMetrics {
	orders_submitted: BTreeMap<TraderId, u64>,
	orders_executed: BTreeMap<TraderId, u64>,
	trades_won: BTreeMap<TraderId, u64>,
	trades_lost: BTreeMap<TraderId, u64>,
	trade_history: Vec<TradeRecord>,
}

impl FairnessMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record an execution.
	///
	/// Appends to the trade history and credits both participants with an
	/// executed order.
	pub fn record_trade(&mut self, trade: &Trade, was_collision: bool) {
		self.trade_history.push(TradeRecord {
			buy_trader_id: trade.buy_trader_id,
			sell_trader_id: trade.sell_trader_id,
			price: trade.price,
			qty: trade.qty,
			execution_time: trade.execution_time,
			was_collision,
		});

		self.record_order_execution(trade.buy_trader_id);
		self.record_order_execution(trade.sell_trader_id);
	}

	pub fn record_order_submission(&mut self, trader_id: TraderId) {
		*self.orders_submitted.entry(trader_id).or_insert(0) += 1;
	}

	fn record_order_execution(&mut self, trader_id: TraderId) {
		*self.orders_executed.entry(trader_id).or_insert(0) += 1;
	}

	pub fn record_trade_win(&mut self, trader_id: TraderId) {
		*self.trades_won.entry(trader_id).or_insert(0) += 1;
	}

	pub fn record_trade_loss(&mut self, trader_id: TraderId) {
		*self.trades_lost.entry(trader_id).or_insert(0) += 1;
	}

	/// Clear all counters and the trade history.
	pub fn reset(&mut self) {
		self.orders_submitted.clear();
		self.orders_executed.clear();
		self.trades_won.clear();
		self.trades_lost.clear();
		self.trade_history.clear();
	}

	fn counter(map: &BTreeMap<TraderId, u64>, trader_id: TraderId) -> u64 {
		map.get(&trader_id).copied().unwrap_or(0)
	}

	/// Share of contested trades this participant won; 0 when it was
	/// never in a contested group.
	pub fn win_rate(&self, trader_id: TraderId) -> f64 {
		let won = Self::counter(&self.trades_won, trader_id);
		let lost = Self::counter(&self.trades_lost, trader_id);
		let total = won + lost;
		if total == 0 {
			0.0
		} else {
			won as f64 / total as f64
		}
	}

	/// Executions per submitted order; 0 when nothing was submitted.
	pub fn execution_rate(&self, trader_id: TraderId) -> f64 {
		let submitted = Self::counter(&self.orders_submitted, trader_id);
		if submitted == 0 {
			0.0
		} else {
			Self::counter(&self.orders_executed, trader_id) as f64 / submitted as f64
		}
	}

	/// Win-rate equality across participants with contested trades.
	///
	/// 1 − (max win rate − min win rate) over every participant that won
	/// or lost at least one contested trade; 0 when nobody contested.
	/// Equals 1 exactly when all contested participants share one rate.
	pub fn fairness_index(&self) -> f64 {
		let contested: BTreeSet<TraderId> = self
			.trades_won
			.keys()
			.chain(self.trades_lost.keys())
			.copied()
			.collect();

		let mut min_rate = f64::MAX;
		let mut max_rate = f64::MIN;
		let mut any = false;
		for trader_id in contested {
			let total = Self::counter(&self.trades_won, trader_id)
				+ Self::counter(&self.trades_lost, trader_id);
			if total == 0 {
				continue;
			}
			let rate = self.win_rate(trader_id);
			min_rate = min_rate.min(rate);
			max_rate = max_rate.max(rate);
			any = true;
		}

		if !any {
			return 0.0;
		}
		1.0 - (max_rate - min_rate)
	}

	/// How close the fastest and slowest participants trade to a 50% win
	/// rate.
	///
	/// 1 means latency confers no advantage at either extreme; 0 when
	/// fewer than two profiles are given or an extreme participant has no
	/// contested trades.
	pub fn latency_advantage_reduction(&self, traders: &[TraderProfile]) -> f64 {
		if traders.len() < 2 {
			return 0.0;
		}
		let Some(fastest) = traders.iter().min_by_key(|t| t.latency_ns) else {
			return 0.0;
		};
		let Some(slowest) = traders.iter().max_by_key(|t| t.latency_ns) else {
			return 0.0;
		};

		let fast_total = Self::counter(&self.trades_won, fastest.trader_id)
			+ Self::counter(&self.trades_lost, fastest.trader_id);
		let slow_total = Self::counter(&self.trades_won, slowest.trader_id)
			+ Self::counter(&self.trades_lost, slowest.trader_id);
		if fast_total == 0 || slow_total == 0 {
			return 0.0;
		}

		let fast_deviation = (self.win_rate(fastest.trader_id) - 0.5).abs();
		let slow_deviation = (self.win_rate(slowest.trader_id) - 0.5).abs();
		1.0 - (fast_deviation + slow_deviation) / 2.0
	}

	/// Per-participant statistics for the given profiles.
	pub fn trader_stats(&self, traders: &[TraderProfile]) -> Vec<TraderStats> {
		traders
			.iter()
			.map(|profile| TraderStats {
				trader_id: profile.trader_id,
				name: profile.name.clone(),
				orders_submitted: Self::counter(&self.orders_submitted, profile.trader_id),
				orders_executed: Self::counter(&self.orders_executed, profile.trader_id),
				trades_won: Self::counter(&self.trades_won, profile.trader_id),
				trades_lost: Self::counter(&self.trades_lost, profile.trader_id),
				win_rate: self.win_rate(profile.trader_id),
				execution_rate: self.execution_rate(profile.trader_id),
				latency_ns: profile.latency_ns,
			})
			.collect()
	}

	/// Aggregate report over the given profiles.
	pub fn report(&self, traders: &[TraderProfile]) -> FairnessReport {
		FairnessReport {
			fairness_index: self.fairness_index(),
			latency_advantage_reduction: self.latency_advantage_reduction(traders),
			traders: self.trader_stats(traders),
		}
	}

	/// Append-only execution history, oldest first.
	pub fn trade_history(&self) -> impl Iterator<Item = &TradeRecord> {
		self.trade_history.iter()
	}
}
