// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides a recording controller and webhook fixtures for fast,
//! deterministic tests without a bot engine or a real platform.
//!
//! # Components
//!
//! - [`MockController`] - Records events and delivery errors, with async waits
//! - [`fixtures`] - Signed callback bodies and connector configurations

pub mod fixtures;
pub mod mock_controller;

pub use mock_controller::MockController;
