// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for the three gateway tables.

pub mod dispatching;
pub mod servers;
pub mod users;
