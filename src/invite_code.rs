// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random join-code generation.
//!
//! Codes are two 13-character base-36 fragments (26 chars total), URL-safe,
//! with no structural meaning. Uniqueness is probabilistic; the invitation
//! lookup tie-break handles the astronomically unlikely collision.

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const FRAGMENT_LEN: usize = 13;

/// Generate a fresh 26-character join code.
pub fn generate() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;

    let a = u64::from_le_bytes(bytes[..8].try_into().expect("8-byte slice"));
    let b = u64::from_le_bytes(bytes[8..].try_into().expect("8-byte slice"));

    let mut code = String::with_capacity(FRAGMENT_LEN * 2);
    code.push_str(&base36_fragment(a));
    code.push_str(&base36_fragment(b));
    Ok(code)
}

/// Encode a u64 as a zero-padded base-36 fragment.
fn base36_fragment(mut value: u64) -> String {
    let mut buf = [b'0'; FRAGMENT_LEN];
    let mut i = FRAGMENT_LEN;
    while value > 0 && i > 0 {
        i -= 1;
        buf[i] = BASE36[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&buf).into_owned()
}
