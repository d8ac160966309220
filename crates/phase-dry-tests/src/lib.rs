// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for phase tracking crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`host`] - In-memory world host with scripted decisions and reactions
//! - [`sources`] - Terse constructors for phase sources and block changes
//! - [`logging`] - One-shot tracing subscriber setup and warning capture

pub mod config;
pub mod host;
pub mod logging;
pub mod sources;

pub use config::InMemoryConfigStore;
pub use host::{chain_reaction, DeliveredNotification, FiredEvent, Reaction, TestHost};
pub use sources::{block_source, entity_source, place, pos, state, tile_entity_source, world_source, W0};
pub use logging::{capture_warnings, init_test_tracing, CapturedEvent};
