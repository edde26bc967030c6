// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search routing for the Parley chat assistant.
//!
//! - [`SearchRouter`]: asks the backend whether the latest user message
//!   needs fresh web results and which queries to run
//! - [`decision`]: strict parsing and clean-up of the backend's JSON reply
//!
//! Routing never fails a turn: any backend or decoding problem yields
//! [`RouteDecision::no_search`](parley_core::RouteDecision::no_search).

pub mod decision;
pub mod prompt;
pub mod router;

pub use decision::{normalize_decision, parse_decision};
pub use router::SearchRouter;
