// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for the ISA IDE (config, notices, trace log,
//! state view). Keeps front-end adapters thin and framework-agnostic.

pub mod config;
pub mod notice;
pub mod state_view;
pub mod trace_log;
