//! # Quizhall Session Library
//!
//! This library provides the live attempt engine for the Quizhall quiz
//! platform. It manages quiz sessions from start to submission, keeps an
//! answer ledger with last-write-wins semantics, scores completed
//! attempts, aggregates live room statistics, and routes realtime events
//! to connections through a pluggable transport tunnel.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod constants;

pub mod engine;
pub mod ids;
pub mod quiz;
pub mod registry;
pub mod room_code;
pub mod rooms;
pub mod scoring;
pub mod store;
pub mod transport;

pub use engine::{Engine, EngineError, IncomingEvent, Options, OutgoingEvent};
pub use room_code::RoomCode;
pub use transport::Tunnel;
