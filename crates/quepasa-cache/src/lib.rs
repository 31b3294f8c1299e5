// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory caching for the Quepasa gateway.
//!
//! [`Cache`] is a generic expiring map; [`MessageStore`] specializes it for
//! messages of one server.

pub mod cache;
pub mod store;

pub use cache::{Cache, CacheItem};
pub use store::MessageStore;
