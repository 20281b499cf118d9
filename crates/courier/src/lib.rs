// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier service wiring, shared by the binary and its end-to-end tests.

pub mod check;
pub mod controller;
pub mod serve;
pub mod shutdown;
