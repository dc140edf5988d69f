// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod payment;
pub mod storage;

pub use adapter::PluginAdapter;
pub use payment::PaymentVerifier;
pub use storage::StorageAdapter;
