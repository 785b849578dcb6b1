// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Packing of 10-bit sample streams into the v210 line format.
//!
//! v210 stores three 10-bit samples per little-endian 32-bit word, in bits
//! `[0..10)`, `[10..20)` and `[20..30)`, with the top two bits zero.  The
//! sample layout depends on the active line width: SD lines (≤ 720 pixels)
//! interleave chroma and luma as UYVY, wider lines carry luma-only samples.

/// Neutral chroma sample used to pad a partial group
const CHROMA_MID: u16 = 0x040;
/// Neutral luma sample used to pad a partial group
const LUMA_MID: u16 = 0x200;

/// Active line widths up to this many pixels use the UYVY sample layout;
/// anything wider is packed as a luma-only stream.  Downstream equipment
/// keys on the same threshold.
const UYVY_MAX_WIDTH: usize = 720;

/// Pack 10-bit `samples` into v210 words for an active line `width` pixels
/// wide.
///
/// Partial trailing sample groups are completed with neutral mid-scale
/// samples and the produced line is zero-padded up to the next multiple of
/// 32 words.
///
/// # Panics (debug)
///
/// * If any sample exceeds 10 bits
///
/// # Examples
/// ```
/// # use vanc_types::v210::pack_line;
/// let line = pack_line(&[0x3FF], 1920);
/// assert_eq!(line.len(), 32);
/// assert_eq!(line[0], 0x3FF << 10);
/// ```
pub fn pack_line(samples: &[u16], width: usize) -> Vec<u32> {
    debug_assert!(
        samples.iter().all(|&s| s <= 0x3FF),
        "samples wider than 10 bits"
    );
    let mut words = if width > UYVY_MAX_WIDTH {
        pack_luma(samples)
    } else {
        pack_uyvy(samples)
    };
    let padded = words.len().div_ceil(32) * 32;
    words.resize(padded, 0);
    words
}

/// Luma-only layout: six samples spread over four words, one or two
/// samples per word.
fn pack_luma(samples: &[u16]) -> Vec<u32> {
    let mut words = Vec::with_capacity(samples.len().div_ceil(6) * 4);
    for group in samples.chunks(6) {
        let mut s = [LUMA_MID; 6];
        s[..group.len()].copy_from_slice(group);
        words.push(u32::from(s[0]) << 10);
        words.push(u32::from(s[1]) | u32::from(s[2]) << 20);
        words.push(u32::from(s[3]) << 10);
        words.push(u32::from(s[4]) | u32::from(s[5]) << 20);
    }
    words
}

/// UYVY layout: twelve samples densely packed, three per word.  Even sample
/// positions are chroma, odd positions luma.
fn pack_uyvy(samples: &[u16]) -> Vec<u32> {
    let mut words = Vec::with_capacity(samples.len().div_ceil(12) * 4);
    for group in samples.chunks(12) {
        let mut s = [0u16; 12];
        for (i, slot) in s.iter_mut().enumerate() {
            *slot = group.get(i).copied().unwrap_or(if i % 2 == 0 {
                CHROMA_MID
            } else {
                LUMA_MID
            });
        }
        for k in [0, 3, 6, 9] {
            words.push(
                u32::from(s[k]) | u32::from(s[k + 1]) << 10 | u32::from(s[k + 2]) << 20,
            );
        }
    }
    words
}
