// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # vanc-types
//!
//! Byte-exact encoders for the side-band data a broadcast playout chain
//! carries next to the active picture:
//!
//! - SCTE-104 splice requests scheduled frame by frame ([Scte104]),
//! - CEA-708/CEA-608 caption transport as CDP frames ([Cdp]),
//! - 10-bit VANC packetization ([vanc]) and v210 line packing ([v210]).
//!
//! The produced VANC lines are handed to the video-output stage attached to
//! an outgoing frame through the [Ancillary] container.
//!
//! The references for this implementation are SMPTE ST 291 / ST 2010,
//! ANSI/SCTE 104 and the CDP definition of SMPTE ST 334-2.

#[macro_use]
extern crate tracing;

pub mod bitstream;
pub mod cdp;
pub mod scte104;
pub mod v210;
pub mod vanc;

pub use bitstream::Bitstream;
pub use cdp::{CcDataTriplet, CcType, Cdp, CeaFormat};
pub use scte104::Scte104;

/// Errors raised while interpreting caller-supplied configuration.
///
/// Construction and reconfiguration are the only fallible operations;
/// per-frame ticking never fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The SCTE command string carries no `OPID` parameter
    #[error("SCTE without OPID Param")]
    MissingOpId,
    /// The SCTE command string carries an unrecognized `OPID` value
    #[error("SCTE wrong OPID Param")]
    WrongOpId,
    /// `OPID=SPLICE` without a usable `SPLICE_TYPE`
    #[error("SCTE SPLICE without valid SPLICE_TYPE Param")]
    MissingSpliceType,
    /// A numeric parameter failed to parse
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// The parameter name
        key: &'static str,
        /// The offending token
        value: String,
    },
    /// Caption input is not a whole number of cc_data triplets
    #[error("input data not mod 3")]
    NotTripletAligned,
    /// The named caption input format has no implementation
    #[error("CEA input type not implemented")]
    UnimplementedFormat,
}

/// Kinds of ancillary payload a frame can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AncillaryType {
    /// An SCTE-104 message packed as a v210 VANC line
    Scte104,
}

/// Ordered ancillary payloads attached to one outgoing video frame.
///
/// A plain value type: producers [add](Ancillary::add) packed VANC lines,
/// the video-output stage [drain](Ancillary::drain)s them.  Frames
/// duplicated to several outputs clone the container, giving every output
/// its own copy of the word vectors.
///
/// # Examples
/// ```
/// # use vanc_types::{Ancillary, AncillaryType};
/// let mut anc = Ancillary::new();
/// anc.add(AncillaryType::Scte104, vec![0x3FF; 32]);
/// assert_eq!(anc.len(), 1);
/// let copy = anc.clone();
/// for (ty, words) in anc.drain() {
///     assert_eq!(ty, AncillaryType::Scte104);
///     assert_eq!(words.len(), 32);
/// }
/// assert!(anc.is_empty());
/// assert_eq!(copy.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Ancillary {
    items: Vec<(AncillaryType, Vec<u32>)>,
}

impl Ancillary {
    /// Create an empty [Ancillary] container
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one payload
    pub fn add(&mut self, ty: AncillaryType, words: Vec<u32>) {
        self.items.push((ty, words));
    }

    /// Move every payload of `other` to the end of this container,
    /// preserving order
    pub fn merge(&mut self, other: Ancillary) {
        self.items.extend(other.items);
    }

    /// Iterate the payloads in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, (AncillaryType, Vec<u32>)> {
        self.items.iter()
    }

    /// Remove and return all payloads in insertion order
    pub fn drain(&mut self) -> impl Iterator<Item = (AncillaryType, Vec<u32>)> + '_ {
        self.items.drain(..)
    }

    /// The number of payloads held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the container holds no payloads
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Ancillary {
    type Item = &'a (AncillaryType, Vec<u32>);
    type IntoIter = std::slice::Iter<'a, (AncillaryType, Vec<u32>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
