// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Assembly of CEA-708/CEA-608 caption data into Caption Distribution
//! Packets (CDP) for VANC carriage.
//!
//! The reference for this implementation is the
//! [SMPTE ST 334-2](https://ieeexplore.ieee.org/document/7291919) CDP
//! definition together with the `cc_data` triplet layout of CEA-708.

use crate::ConfigError;

/// The `cc_type` tag in bits `[1:0]` of the first byte of a cc_data triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcType {
    /// CEA-608 byte pair for NTSC field 1
    NtscField1 = 0,
    /// CEA-608 byte pair for NTSC field 2
    NtscField2 = 1,
    /// Continuation bytes of a DTVCC packet
    DtvccData = 2,
    /// First bytes of a DTVCC packet
    DtvccStart = 3,
}

impl CcType {
    fn from_byte(byte: u8) -> Self {
        match byte & 0x03 {
            0 => CcType::NtscField1,
            1 => CcType::NtscField2,
            2 => CcType::DtvccData,
            _ => CcType::DtvccStart,
        }
    }

    /// Whether this type carries CEA-608 (NTSC) data.  NTSC triplets must
    /// precede all DTVCC triplets within a cc_data block.
    pub fn is_ntsc(self) -> bool {
        matches!(self, CcType::NtscField1 | CcType::NtscField2)
    }
}

/// One 3-byte `cc_data` element: a type tag, a validity flag and two
/// payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcDataTriplet {
    cc_type: CcType,
    cc_valid: bool,
    data: [u8; 2],
}

impl CcDataTriplet {
    /// Create a new [CcDataTriplet]
    pub fn new(cc_type: CcType, cc_valid: bool, data: [u8; 2]) -> Self {
        Self {
            cc_type,
            cc_valid,
            data,
        }
    }

    /// Parse a [CcDataTriplet] from its 3-byte wire form
    ///
    /// # Examples
    /// ```
    /// # use vanc_types::cdp::*;
    /// let triplet = CcDataTriplet::from_bytes([0xFC, 0x41, 0x80]);
    /// assert_eq!(triplet.cc_type(), CcType::NtscField1);
    /// assert!(triplet.cc_valid());
    /// ```
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            cc_type: CcType::from_byte(bytes[0]),
            cc_valid: bytes[0] & 0x04 == 0x04,
            data: [bytes[1], bytes[2]],
        }
    }

    /// The type tag of this triplet
    pub fn cc_type(&self) -> CcType {
        self.cc_type
    }

    /// Whether the payload bytes are valid caption data
    pub fn cc_valid(&self) -> bool {
        self.cc_valid
    }

    /// The two payload bytes
    pub fn data(&self) -> [u8; 2] {
        self.data
    }

    /// Serialize to the 3-byte wire form, marker bits set
    pub fn to_bytes(&self) -> [u8; 3] {
        let byte0 = 0xF8 | (u8::from(self.cc_valid) << 2) | self.cc_type as u8;
        [byte0, self.data[0], self.data[1]]
    }
}

/// Layout of the caption bytes handed to [Cdp::new]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CeaFormat {
    /// A raw stream of 3-byte cc_data triplets
    RawPkts,
    /// A pre-framed CDP byte stream.  Not implemented by the assembler.
    CdpStream,
}

/// CDP frame rate identifier, stamped into the high nibble of the CDP
/// header's frame rate byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    id: u8,
}

impl Framerate {
    /// Retrieve a [Framerate] from the identifier used inside a CDP.
    /// Valid ids are 1 (23.98 fps) through 8 (60 fps).
    pub fn from_id(id: u8) -> Option<Framerate> {
        (1..=8).contains(&id).then_some(Framerate { id })
    }

    /// The CDP identifier of this [Framerate]
    pub fn id(self) -> u8 {
        self.id
    }
}

impl Default for Framerate {
    /// 29.97 fps, the caption-rate baseline
    fn default() -> Self {
        Framerate { id: 4 }
    }
}

/// Assembles `cc_data` triplets into a Caption Distribution Packet.
///
/// A [Cdp] is constructed from a raw triplet stream, optionally merged with
/// further triplet sets via [append_back](Cdp::append_back) and serialized
/// with [to_bytes](Cdp::to_bytes).
///
/// # Examples
/// ```
/// # use vanc_types::cdp::*;
/// let mut cdp = Cdp::new(&[0xFC, 0x41, 0x80], CeaFormat::RawPkts).unwrap();
/// let frame = cdp.to_bytes();
/// assert_eq!(&frame[..2], &[0x96, 0x69]);
/// assert_eq!(frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Cdp {
    pkts: Vec<CcDataTriplet>,
    framerate: Framerate,
    sequence_count: u16,
}

impl Cdp {
    /// Build a [Cdp] from caption bytes in the named `format`.
    ///
    /// # Errors
    ///
    /// * [ConfigError::NotTripletAligned] if `data` is not a whole number of
    ///   3-byte triplets
    /// * [ConfigError::UnimplementedFormat] for any format other than
    ///   [CeaFormat::RawPkts]
    #[tracing::instrument(name = "Cdp::new", skip(data), err)]
    pub fn new(data: &[u8], format: CeaFormat) -> Result<Self, ConfigError> {
        match format {
            CeaFormat::RawPkts => (),
            _ => return Err(ConfigError::UnimplementedFormat),
        }
        if data.len() % 3 != 0 {
            return Err(ConfigError::NotTripletAligned);
        }
        let pkts = data
            .chunks_exact(3)
            .map(|chunk| CcDataTriplet::from_bytes([chunk[0], chunk[1], chunk[2]]))
            .collect::<Vec<_>>();
        trace!("parsed {} cc_data triplets", pkts.len());
        Ok(Self {
            pkts,
            framerate: Framerate::default(),
            sequence_count: 0,
        })
    }

    /// Set the frame rate stamped into subsequent CDP frames
    pub fn set_framerate(&mut self, framerate: Framerate) {
        self.framerate = framerate;
    }

    /// Set the sequence counter of the next CDP frame
    pub fn set_sequence_count(&mut self, sequence_count: u16) {
        self.sequence_count = sequence_count;
    }

    /// The triplets currently held, NTSC first
    pub fn triplets(&self) -> &[CcDataTriplet] {
        &self.pkts
    }

    /// Merge `other`'s triplets into this packet.
    ///
    /// NTSC (CEA-608) triplets sort ahead of any DTVCC triplet: an incoming
    /// NTSC triplet is inserted just before the first DTVCC triplet already
    /// held, everything else is appended.
    pub fn append_back(&mut self, other: &Cdp) {
        let mut first_dtvcc = self.pkts.iter().position(|p| !p.cc_type().is_ntsc());
        for pkt in &other.pkts {
            match first_dtvcc {
                Some(at) if pkt.cc_type().is_ntsc() => {
                    self.pkts.insert(at, *pkt);
                    first_dtvcc = Some(at + 1);
                }
                _ => {
                    if first_dtvcc.is_none() && !pkt.cc_type().is_ntsc() {
                        first_dtvcc = Some(self.pkts.len());
                    }
                    self.pkts.push(*pkt);
                }
            }
        }
    }

    /// Serialize as a CDP frame.
    ///
    /// The header carries the frame rate nibble, the caption-present flags
    /// and the sequence counter; the `0x72` section carries the triplets;
    /// the `0x74` footer repeats the sequence counter; the final byte makes
    /// the whole frame sum to zero modulo 256.  The sequence counter
    /// increments after each call.
    ///
    /// # Panics
    ///
    /// * If more than 31 triplets are held (the section count is 5 bits)
    pub fn to_bytes(&mut self) -> Vec<u8> {
        assert!(
            self.pkts.len() <= 0x1F,
            "cc_data count {} exceeds the 5-bit section count",
            self.pkts.len()
        );
        let mut data = Vec::with_capacity(255);
        data.push(0x96);
        data.push(0x69);
        data.push(0x00); // cdp_length, patched below
        data.push(self.framerate.id() << 4 | 0x0F);
        data.push(0x43); // ccdata_present | caption_service_active | reserved
        data.extend_from_slice(&self.sequence_count.to_be_bytes());
        data.push(0x72); // ccdata_id
        data.push(0xE0 | self.pkts.len() as u8);
        for pkt in &self.pkts {
            data.extend_from_slice(&pkt.to_bytes());
        }
        data.push(0x74); // cdp_footer
        data.extend_from_slice(&self.sequence_count.to_be_bytes());
        data[2] = (data.len() + 1) as u8;
        let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        data.push((!sum).wrapping_add(1));
        trace!(
            "serialized CDP frame of {} bytes, sequence {}",
            data.len(),
            self.sequence_count
        );
        self.sequence_count = self.sequence_count.wrapping_add(1);
        data
    }
}
