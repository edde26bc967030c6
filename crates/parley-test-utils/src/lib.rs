// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Mock provider, channel, and search adapters with scripted behavior and
//! recorded calls, plus a [`TestHarness`] that wires them to a temporary
//! SQLite database and the real turn pipeline.

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;
pub mod mock_search;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::{ChannelEvent, MockChannel};
pub use mock_provider::{MockProvider, ScriptedAnswer};
pub use mock_search::MockSearch;
