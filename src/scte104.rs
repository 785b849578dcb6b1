// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! SCTE-104 splice request encoding and per-frame scheduling.
//!
//! A [Scte104] session is configured from a textual command string and
//! ticked once per video frame.  Each tick either returns an empty word
//! vector or a complete VANC line in v210 words: a single-operation SCTE-104
//! message prefixed with the SMPTE ST 2010 payload descriptor, wrapped as a
//! 10-bit VANC packet and packed for a 1920-pixel active line.
//!
//! A pre-rolled splice is re-announced every second with the remaining
//! pre-roll time, counting down until the splice point is closer than the
//! countdown floor; from then on the session keeps the receiver alive with
//! `splice_null` heartbeats.

use std::time::{Duration, Instant};

use crate::bitstream::Bitstream;
use crate::v210;
use crate::vanc;
use crate::ConfigError;

/// Active line width the emitted VANC words are packed for
const LINE_WIDTH: usize = 1920;
/// Expected upper bound of an encoded message, preallocated before writing
const MESSAGE_RESERVE: usize = 255;
/// Remaining pre-roll below which the countdown stops and heartbeats begin
const COUNTDOWN_FLOOR_MS: i32 = 4500;
/// The pre-roll is re-announced in steps of this many milliseconds
const MARK_STEP_MS: i32 = 1000;
/// Minimum spacing of `splice_null` heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// `splice_request_data` operation payload size in bytes
const SPLICE_REQUEST_DATA_LEN: u16 = 14;

/// SCTE-104 operation identifiers handled by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpId {
    /// No operation configured
    Null,
    /// `splice_request_data`
    Splice,
    /// `splice_null_request_data`
    SpliceNull,
}

impl OpId {
    fn code(self) -> u16 {
        match self {
            OpId::Null => 0xFFFF,
            OpId::Splice => 0x0101,
            OpId::SpliceNull => 0x0102,
        }
    }
}

/// `splice_insert_type` values of a splice request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceType {
    /// No splice configured
    Null = 0,
    /// Splice out at the end of the pre-roll
    StartNormal = 1,
    /// Splice out as soon as possible
    StartImmediate = 2,
    /// Return to the program at the end of the pre-roll
    EndNormal = 3,
    /// Return to the program as soon as possible
    EndImmediate = 4,
    /// Cancel a previously announced splice
    Cancel = 5,
}

impl SpliceType {
    fn from_param(value: &str) -> Option<Self> {
        match value {
            "START_NORMAL" => Some(SpliceType::StartNormal),
            "START_IMMEDIATE" => Some(SpliceType::StartImmediate),
            "END_NORMAL" => Some(SpliceType::EndNormal),
            "END_IMMEDIATE" => Some(SpliceType::EndImmediate),
            "CANCEL" => Some(SpliceType::Cancel),
            _ => None,
        }
    }

    /// Whether this type announces a splice point ahead of time
    fn has_pre_roll(self) -> bool {
        matches!(self, SpliceType::StartNormal | SpliceType::EndNormal)
    }
}

/// Split a command string into tokens at `=`, `,` and space, dropping empty
/// tokens
fn split_params(input: &str) -> Vec<&str> {
    input
        .split(['=', ',', ' '])
        .filter(|token| !token.is_empty())
        .collect()
}

/// The token following `key`, if `key` is present
fn get_param<'a>(key: &str, params: &[&'a str]) -> Option<&'a str> {
    params
        .iter()
        .position(|&param| param == key)
        .and_then(|at| params.get(at + 1).copied())
}

fn contains_param(key: &str, params: &[&str]) -> bool {
    params.iter().any(|&param| param == key)
}

fn parse_param<T: std::str::FromStr>(
    key: &'static str,
    params: &[&str],
) -> Result<Option<T>, ConfigError> {
    let Some(value) = get_param(key, params) else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

/// A per-channel SCTE-104 insertion session.
///
/// Created from a command string of `KEY=VALUE` pairs (separated by `=`,
/// `,` or space in any order), driven by the channel's frame clock through
/// [tick](Scte104::tick) and reconfigured with [update](Scte104::update).
///
/// # Examples
/// ```
/// # use vanc_types::Scte104;
/// let mut session =
///     Scte104::new("OPID=SPLICE,SPLICE_TYPE=START_NORMAL,PRE_ROLL_TIME=8000,BREAK_DURATION=600")
///         .unwrap();
/// let words = session.tick();
/// assert_eq!(words.len() % 32, 0);
/// assert!(!words.is_empty());
/// ```
#[derive(Debug)]
pub struct Scte104 {
    opid: OpId,
    splice_type: SpliceType,
    event_id: u32,
    unique_program_id: u16,
    pre_roll_time: u16,
    break_duration: u16,
    avail_num: u8,
    avails_expected: u8,
    auto_return_flag: u8,
    started: bool,
    t_first_frame: Option<Instant>,
    t_last_emit: Option<Instant>,
    next_remaining_mark: i32,
}

impl Scte104 {
    /// Create a session from a command string.
    ///
    /// `OPID` is mandatory and must name `SPLICE` or `SPLICE_NULL`; a
    /// `SPLICE` additionally needs a valid `SPLICE_TYPE`.  `PRE_ROLL_TIME`
    /// and `BREAK_DURATION` default to `u16::MAX` when absent, the
    /// identifier parameters (`EVENT_ID`, `UNIQUE_PROGRAM_ID`, `AVAIL_NUM`,
    /// `AVAILS_EXPECTED`) to zero, and `AUTO_RETURN` is a bare flag.
    #[tracing::instrument(name = "Scte104::new", err)]
    pub fn new(command: &str) -> Result<Self, ConfigError> {
        let mut session = Self {
            opid: OpId::Null,
            splice_type: SpliceType::Null,
            event_id: 0,
            unique_program_id: 0,
            pre_roll_time: 0,
            break_duration: 0,
            avail_num: 0,
            avails_expected: 0,
            auto_return_flag: 0,
            started: false,
            t_first_frame: None,
            t_last_emit: None,
            next_remaining_mark: 0,
        };
        session.configure(command)?;
        Ok(session)
    }

    /// Replace the session configuration from a new command string.
    ///
    /// The previous cue is dropped, including any pending heartbeats; the
    /// new cue is announced on the next [tick](Scte104::tick).  On error the
    /// session is left unconfigured and emits nothing.
    #[tracing::instrument(name = "Scte104::update", skip(self), err)]
    pub fn update(&mut self, command: &str) -> Result<(), ConfigError> {
        self.configure(command)
    }

    fn configure(&mut self, command: &str) -> Result<(), ConfigError> {
        info!("configuring SCTE-104 session from {command:?}");
        self.opid = OpId::Null;
        self.started = false;
        let params = split_params(command);
        let opid_s = get_param("OPID", &params).ok_or(ConfigError::MissingOpId)?;
        let opid = if opid_s.starts_with("SPLICE_NULL") {
            OpId::SpliceNull
        } else if opid_s.starts_with("SPLICE") {
            OpId::Splice
        } else {
            return Err(ConfigError::WrongOpId);
        };
        let splice_type = if opid == OpId::Splice {
            get_param("SPLICE_TYPE", &params)
                .and_then(SpliceType::from_param)
                .ok_or(ConfigError::MissingSpliceType)?
        } else {
            SpliceType::Null
        };
        *self = Self {
            opid,
            splice_type,
            event_id: parse_param("EVENT_ID", &params)?.unwrap_or(0),
            unique_program_id: parse_param("UNIQUE_PROGRAM_ID", &params)?.unwrap_or(0),
            pre_roll_time: parse_param("PRE_ROLL_TIME", &params)?.unwrap_or(u16::MAX),
            break_duration: parse_param("BREAK_DURATION", &params)?.unwrap_or(u16::MAX),
            avail_num: parse_param("AVAIL_NUM", &params)?.unwrap_or(0),
            avails_expected: parse_param("AVAILS_EXPECTED", &params)?.unwrap_or(0),
            auto_return_flag: u8::from(contains_param("AUTO_RETURN", &params)),
            started: false,
            t_first_frame: None,
            t_last_emit: None,
            next_remaining_mark: 0,
        };
        Ok(())
    }

    /// The operation the next emission will carry
    pub fn opid(&self) -> OpId {
        self.opid
    }

    /// The configured splice type
    pub fn splice_type(&self) -> SpliceType {
        self.splice_type
    }

    /// Advance the session by one video frame.
    ///
    /// Returns the v210 words to place on the VANC line of the outgoing
    /// frame, or an empty vector when this frame carries no message.  Never
    /// fails: an unconfigured session emits nothing.
    pub fn tick(&mut self) -> Vec<u32> {
        self.tick_at(Instant::now())
    }

    /// [tick](Scte104::tick) with a caller-supplied frame timestamp.
    ///
    /// `now` must be monotonic non-decreasing across the life of the
    /// session; the frame clock's own timestamps qualify.
    pub fn tick_at(&mut self, now: Instant) -> Vec<u32> {
        if self.opid == OpId::Null {
            return Vec::new();
        }
        if !self.started {
            self.started = true;
            self.t_first_frame = Some(now);
            self.next_remaining_mark = i32::from(self.pre_roll_time);
            let words = self.emit(now);
            if self.opid == OpId::Splice {
                self.advance_mark();
            }
            return words;
        }

        match self.opid {
            OpId::Splice => {
                let elapsed = self
                    .t_first_frame
                    .map(|first| now.duration_since(first).as_millis() as i64)
                    .unwrap_or(0);
                let remaining = i64::from(self.pre_roll_time) - elapsed;
                if remaining <= i64::from(self.next_remaining_mark) {
                    let words = self.emit(now);
                    self.advance_mark();
                    return words;
                }
                Vec::new()
            }
            OpId::SpliceNull => match self.t_last_emit {
                Some(last) if now.duration_since(last) < HEARTBEAT_INTERVAL => Vec::new(),
                _ => self.emit(now),
            },
            OpId::Null => Vec::new(),
        }
    }

    /// Step the countdown and drop to heartbeats once the splice point is
    /// closer than the countdown floor.  Immediate and cancel requests have
    /// no countdown at all.
    fn advance_mark(&mut self) {
        self.next_remaining_mark -= MARK_STEP_MS;
        if !self.splice_type.has_pre_roll() || self.next_remaining_mark <= COUNTDOWN_FLOOR_MS {
            trace!("pre-roll countdown finished, switching to splice_null heartbeats");
            self.opid = OpId::SpliceNull;
        }
    }

    /// Encode the current state, wrap it as VANC and pack the line
    fn emit(&mut self, now: Instant) -> Vec<u32> {
        let message = self.encode_message();
        debug!("emitting {:02X?}", message);
        let words = vanc::encode_packet(&message, vanc::SCTE_104_DID, vanc::SCTE_104_SDID);
        self.t_last_emit = Some(now);
        v210::pack_line(&words, LINE_WIDTH)
    }

    /// Serialize the session as a SMPTE ST 2010 payload descriptor followed
    /// by a single-operation SCTE-104 message
    fn encode_message(&self) -> Vec<u8> {
        let mut stream = Bitstream::with_capacity(MESSAGE_RESERVE);
        stream.write_byte(0x08); // ST 2010 payload descriptor
        stream.write_bytes_msb(0xFFFF, 2); // reserved
        stream.write_bytes_msb(0, 2); // messageSize, patched below
        stream.write_byte(0); // protocol_version
        stream.write_byte(0); // AS_index
        stream.write_bytes_msb(0, 2); // message_number
        stream.write_bytes_msb(0, 2); // DPI_PID_index
        stream.write_byte(0); // SCTE35_protocol_version
        stream.write_byte(0); // timestamp.time_type: none
        stream.write_byte(1); // num_ops
        match self.opid {
            OpId::Splice => {
                stream.write_bytes_msb(u64::from(OpId::Splice.code()), 2);
                stream.write_bytes_msb(u64::from(SPLICE_REQUEST_DATA_LEN), 2);
                stream.write_byte(self.splice_type as u8);
                stream.write_bytes_msb(u64::from(self.event_id), 4);
                stream.write_bytes_msb(u64::from(self.unique_program_id), 2);
                let pre_roll = self.next_remaining_mark.clamp(0, i32::from(u16::MAX)) as u16;
                stream.write_bytes_msb(u64::from(pre_roll), 2);
                stream.write_bytes_msb(u64::from(self.break_duration), 2);
                stream.write_byte(self.avail_num);
                stream.write_byte(self.avails_expected);
                stream.write_byte(self.auto_return_flag);
            }
            opid => {
                stream.write_bytes_msb(u64::from(opid.code()), 2);
                stream.write_bytes_msb(0, 2); // no operation payload
            }
        }
        let mut message = stream.finish();
        // the payload descriptor byte is not counted by messageSize
        let size = (message.len() - 1) as u16;
        message[3] = (size >> 8) as u8;
        message[4] = (size & 0xFF) as u8;
        message
    }
}
