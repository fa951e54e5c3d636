// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gzip encoding for request bodies.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Value of the `Content-Encoding` header for bodies produced by [`gzip`].
pub const CONTENT_ENCODING_GZIP: &str = "gzip";

/// Compresses `body` with the default compression level.
pub fn gzip(body: &[u8]) -> io::Result<Vec<u8>> {
	let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
	encoder.write_all(body)?;
	let compressed = encoder.finish()?;
	tracing::trace!(
		raw_len = body.len(),
		compressed_len = compressed.len(),
		"gzip-compressed request body"
	);
	Ok(compressed)
}

/// Decompresses a gzip body.
pub fn gunzip(body: &[u8]) -> io::Result<Vec<u8>> {
	let mut decoder = GzDecoder::new(body);
	let mut out = Vec::new();
	decoder.read_to_end(&mut out)?;
	Ok(out)
}
