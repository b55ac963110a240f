//! MurmurHash3 x64_128 implementation.
//!
//! Original algorithm by Austin Appleby. All rights to the original belong to the author.
//!
//! Besides the one-shot [`hash128`], the block function is exposed in a seeded
//! form ([`hash128_seeded`]) taking the full 128-bit `(h1, h2)` state, so a caller
//! can chain several appends into one running fingerprint.

use std::borrow::Cow;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Compute MurmurHash3 x64_128 with a zero seed.
///
/// `pod_size` controls byte swapping on big-endian targets: every
/// `pod_size`-wide element is reversed so the result matches a little-endian
/// host. If `pod_size` is None, no swapping is applied.
/// Returns the 128-bit hash as (h1, h2).
#[inline]
pub fn hash128(data: &[u8], pod_size: Option<usize>) -> (u64, u64) {
    hash128_seeded(data, pod_size, (0, 0))
}

/// Compute MurmurHash3 x64_128 starting from an existing `(h1, h2)` state.
///
/// With `seed == (0, 0)` this is identical to [`hash128`].
pub fn hash128_seeded(data: &[u8], pod_size: Option<usize>, seed: (u64, u64)) -> (u64, u64) {
    let data = to_little_endian(data, pod_size.unwrap_or(1));
    let data: &[u8] = &data;

    let len = data.len();
    let (mut h1, mut h2) = seed;

    // Body - 16-byte blocks
    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        let k1 = u64::from_le_bytes(le_word(&block[0..8]));
        let k2 = u64::from_le_bytes(le_word(&block[8..16]));

        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(27);
        h1 = h1.wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        h2 ^= mix_k2(k2);
        h2 = h2.rotate_left(31);
        h2 = h2.wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    // Tail - up to 15 remaining bytes, k2 takes bytes 8..15
    let tail = blocks.remainder();
    if tail.len() > 8 {
        let mut k2: u64 = 0;
        for (i, &b) in tail[8..].iter().enumerate() {
            k2 ^= (b as u64) << (i * 8);
        }
        h2 ^= mix_k2(k2);
    }
    if !tail.is_empty() {
        let mut k1: u64 = 0;
        for (i, &b) in tail.iter().take(8).enumerate() {
            k1 ^= (b as u64) << (i * 8);
        }
        h1 ^= mix_k1(k1);
    }

    // Finalization
    h1 ^= len as u64;
    h2 ^= len as u64;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}

#[inline]
fn le_word(bytes: &[u8]) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    word
}

#[inline]
fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

fn to_little_endian(data: &[u8], pod_size: usize) -> Cow<'_, [u8]> {
    if cfg!(target_endian = "big") && pod_size > 1 {
        let mut swapped = Vec::with_capacity(data.len());
        for chunk in data.chunks(pod_size) {
            swapped.extend(chunk.iter().rev());
        }
        Cow::Owned(swapped)
    } else {
        Cow::Borrowed(data)
    }
}

/// Final mix function for 64-bit values.
#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}
