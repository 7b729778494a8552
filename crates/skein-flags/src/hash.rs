// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deterministic bucketing for local flag evaluation.
//!
//! Variant assignment must agree byte-for-byte across SDK
//! implementations, so bucketing is defined in terms of 64-bit FNV-1a
//! rather than anything platform-specific.

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// 64-bit FNV-1a over `data`.
pub fn fnv1a_64(data: &[u8]) -> u64 {
	let mut hash = FNV_OFFSET_BASIS;
	for &byte in data {
		hash ^= u64::from(byte);
		hash = hash.wrapping_mul(FNV_PRIME);
	}
	hash
}

/// Maps `key` concatenated with `salt` onto one of a hundred evenly
/// spaced buckets in `[0.0, 1.0)`.
///
/// Pure: the same inputs produce the same bucket on every platform and
/// every call.
pub fn normalized_hash(key: &str, salt: &str) -> f64 {
	let mut input = String::with_capacity(key.len() + salt.len());
	input.push_str(key);
	input.push_str(salt);
	(fnv1a_64(input.as_bytes()) % 100) as f64 / 100.0
}
