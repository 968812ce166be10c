// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs for the Lodge server.

pub mod trial_expiry;

pub use trial_expiry::TrialExpiryJob;
