// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Loom.
//!
//! This crate provides:
//! - An HTTP client builder that sets the User-Agent header
//! - Gzip encoding for request bodies sent with `Content-Encoding: gzip`

mod client;
mod gzip;

pub use client::builder_with_user_agent;
pub use gzip::{gunzip, gzip, CONTENT_ENCODING_GZIP};
