// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for phase tracking hosts: the versioned
//! tracker-config document, the storage port it persists through and the
//! [`config_port::TrackerConfigPort`] hosts read their tracker settings from.

pub mod config;
pub mod config_port;
