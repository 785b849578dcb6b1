// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! 10-bit VANC packetization as specified in SMPTE ST 291.
//!
//! A VANC packet is a sequence of 10-bit words: the Ancillary Data Flag
//! `0x000 0x3FF 0x3FF`, the DID/SDID namespace tags, a data count, the user
//! data words and a checksum.  Every word after the ADF carries an even
//! parity bit (bit 8) or its inverse (bit 9).

/// DID for SCTE-104 messages carried per SMPTE ST 2010
pub const SCTE_104_DID: u8 = 0x41;
/// SDID for SCTE-104 messages carried per SMPTE ST 2010
pub const SCTE_104_SDID: u8 = 0x07;

/// Wrap `udw` into a 10-bit VANC packet tagged `did`/`sdid`.
///
/// Each returned `u16` holds one 10-bit word in its low ten bits.  The
/// result is `6 + udw.len() + 1` words long: ADF, DID, SDID, DC, the user
/// data words widened to 10 bits, and the checksum word.
///
/// Words from the DID onward have bit 8 set when their low 8 bits have odd
/// parity and bit 9 set otherwise.  The checksum word holds the 9-bit sum of
/// those same words with bit 9 the inverse of bit 8.
///
/// # Panics
///
/// * If `udw` is longer than 255 bytes (the data count field is 8 bits)
///
/// # Examples
/// ```
/// # use vanc_types::vanc::*;
/// let words = encode_packet(&[0x60], 0x61, 0x02);
/// assert_eq!(&words[..3], &[0x000, 0x3FF, 0x3FF]);
/// assert_eq!(words.len(), 7);
/// ```
pub fn encode_packet(udw: &[u8], did: u8, sdid: u8) -> Vec<u16> {
    assert!(
        udw.len() <= 255,
        "VANC user data count {} exceeds 255",
        udw.len()
    );
    let mut words = Vec::with_capacity(udw.len() + 7);
    words.push(0x000);
    words.push(0x3FF);
    words.push(0x3FF);
    words.push(u16::from(did));
    words.push(u16::from(sdid));
    words.push(udw.len() as u16);
    words.extend(udw.iter().map(|&byte| u16::from(byte)));

    let mut checksum: u16 = 0;
    for word in words.iter_mut().skip(3) {
        if (*word as u8).count_ones() % 2 == 1 {
            *word |= 0x100;
        } else {
            *word |= 0x200;
        }
        checksum = (checksum + *word) & 0x1FF;
    }
    // bit 9 is the inverse of bit 8
    checksum |= (!checksum & 0x100) << 1;
    words.push(checksum);
    words
}
