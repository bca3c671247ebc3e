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

use serde::{Deserialize, Serialize};

use crate::types::{EngineError, MatchingMode, TimeNs};

/// Matching engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Matching discipline
	pub mode: MatchingMode,
	/// Batch window length in nanoseconds
	pub window_ns: TimeNs,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			mode: MatchingMode::NaivePriceTime,
			window_ns: 100_000,
		}
	}
}

impl EngineConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("FAIRMATCH"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("FAIRMATCH"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Reject configurations the engine cannot run with.
	pub fn validate(&self) -> Result<(), EngineError> {
		if self.window_ns == 0 {
			return Err(EngineError::InvalidWindow);
		}
		Ok(())
	}
}
