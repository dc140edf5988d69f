// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod bookings;
pub mod groups;
pub mod payments;
pub mod schedules;
pub mod sessions;
pub mod time_slots;
