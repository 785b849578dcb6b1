// Copyright (C) 2025 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end SCTE-104 scheduling scenarios over a simulated 50 fps frame
//! clock, unwrapping each emitted v210 line back to the message bytes.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tracing::debug;
use tracing_subscriber::EnvFilter;

use vanc_types::Scte104;

static TRACING: OnceLock<()> = OnceLock::new();

pub fn test_init_log() {
    TRACING.get_or_init(|| {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    });
}

const FRAME_INTERVAL: Duration = Duration::from_millis(20);

const OP_SPLICE: u16 = 0x0101;
const OP_SPLICE_NULL: u16 = 0x0102;

/// Recover the 10-bit samples of a luma-only (width > 720) v210 line
fn unpack_luma_line(words: &[u32]) -> Vec<u16> {
    assert_eq!(words.len() % 32, 0, "line not padded to 32-word groups");
    let mut samples = vec![];
    for group in words.chunks_exact(4) {
        samples.push(((group[0] >> 10) & 0x3FF) as u16);
        samples.push((group[1] & 0x3FF) as u16);
        samples.push(((group[1] >> 20) & 0x3FF) as u16);
        samples.push(((group[2] >> 10) & 0x3FF) as u16);
        samples.push((group[3] & 0x3FF) as u16);
        samples.push(((group[3] >> 20) & 0x3FF) as u16);
    }
    samples
}

/// Validate parity and checksum of a VANC packet and return its user data
/// bytes
fn unwrap_vanc(samples: &[u16]) -> Vec<u8> {
    assert_eq!(&samples[..3], &[0x000, 0x3FF, 0x3FF], "missing ADF");
    let dc = (samples[5] & 0xFF) as usize;
    let packet = &samples[3..6 + dc + 1];
    for &word in packet {
        let bit8 = (word >> 8) & 1;
        let bit9 = (word >> 9) & 1;
        assert_eq!(bit8 ^ bit9, 1, "parity bits of {word:#05x}");
    }
    for &word in &packet[..packet.len() - 1] {
        assert_eq!(
            ((word >> 8) & 1) as u32,
            (word as u8).count_ones() % 2,
            "even parity of {word:#05x}"
        );
    }
    let checksum = packet[packet.len() - 1];
    let sum = packet[..packet.len() - 1]
        .iter()
        .fold(0u16, |acc, &w| (acc + w) & 0x1FF);
    assert_eq!(checksum & 0x1FF, sum, "checksum");
    samples[6..6 + dc].iter().map(|&w| (w & 0xFF) as u8).collect()
}

/// Unwrap an emitted line down to the SCTE-104 message bytes, checking the
/// common header along the way
fn scte_bytes(words: &[u32]) -> Vec<u8> {
    let message = unwrap_vanc(&unpack_luma_line(words));
    debug!("unwrapped {message:02X?}");
    assert_eq!(message[0], 0x08, "2010 payload descriptor");
    assert_eq!(&message[1..3], &[0xFF, 0xFF], "reserved");
    let size = u16::from_be_bytes([message[3], message[4]]);
    assert_eq!(usize::from(size), message.len() - 1, "messageSize");
    message
}

fn opid_of(message: &[u8]) -> u16 {
    u16::from_be_bytes([message[0x0E], message[0x0F]])
}

fn pre_roll_of(message: &[u8]) -> u16 {
    u16::from_be_bytes([message[0x19], message[0x1A]])
}

#[test]
fn splice_null_command() {
    test_init_log();
    let mut session = Scte104::new("OPID=SPLICE_NULL").unwrap();
    let base = Instant::now();

    let words = session.tick_at(base);
    assert!(!words.is_empty());
    let message = scte_bytes(&words);
    assert_eq!(&message[0x0E..], &[0x01, 0x02, 0x00, 0x00]);

    // no heartbeat due on the following frame
    assert!(session.tick_at(base + FRAME_INTERVAL).is_empty());

    // one second later the heartbeat fires again
    let words = session.tick_at(base + Duration::from_millis(1000));
    assert_eq!(opid_of(&scte_bytes(&words)), OP_SPLICE_NULL);
}

#[test]
fn immediate_splice() {
    test_init_log();
    let mut session =
        Scte104::new("OPID=SPLICE,SPLICE_TYPE=START_IMMEDIATE,BREAK_DURATION=600").unwrap();
    let base = Instant::now();

    let message = scte_bytes(&session.tick_at(base));
    assert_eq!(opid_of(&message), OP_SPLICE);
    assert_eq!(u16::from_be_bytes([message[0x10], message[0x11]]), 14);
    assert_eq!(message[0x12], 2, "splice_insert_type START_IMMEDIATE");
    assert_eq!(pre_roll_of(&message), 0xFFFF);
    assert_eq!(u16::from_be_bytes([message[0x1B], message[0x1C]]), 600);

    // the splice is announced exactly once, heartbeats follow
    assert!(session.tick_at(base + FRAME_INTERVAL).is_empty());
    let message = scte_bytes(&session.tick_at(base + Duration::from_secs(1)));
    assert_eq!(opid_of(&message), OP_SPLICE_NULL);
}

#[test]
fn pre_rolled_splice_countdown() {
    test_init_log();
    let mut session = Scte104::new(
        "OPID=SPLICE,SPLICE_TYPE=START_NORMAL,PRE_ROLL_TIME=8000,BREAK_DURATION=600,AUTO_RETURN",
    )
    .unwrap();
    let base = Instant::now();

    let mut splices = vec![];
    let mut heartbeats = vec![];
    for frame in 0..400u32 {
        let words = session.tick_at(base + FRAME_INTERVAL * frame);
        if words.is_empty() {
            continue;
        }
        let message = scte_bytes(&words);
        match opid_of(&message) {
            OP_SPLICE => {
                assert_eq!(message[0x12], 1, "splice_insert_type START_NORMAL");
                assert_eq!(message[0x1F], 1, "auto_return_flag");
                splices.push((frame, pre_roll_of(&message)));
            }
            OP_SPLICE_NULL => heartbeats.push(frame),
            other => panic!("unexpected opID {other:#06x}"),
        }
    }

    // the pre-roll is re-announced once a second down to the 4.5 s floor
    assert_eq!(splices, [(0, 8000), (50, 7000), (100, 6000), (150, 5000)]);

    // heartbeats start one second after the last splice announcement and
    // stay at least one second apart
    assert_eq!(heartbeats.first().copied(), Some(200));
    for pair in heartbeats.windows(2) {
        assert!(pair[1] - pair[0] >= 50, "heartbeats {pair:?} too close");
    }
    assert!(!heartbeats.is_empty());
}

#[test]
fn optional_identifiers_reach_the_wire() {
    test_init_log();
    // space separators are equivalent to `,`; token order is free
    let mut session = Scte104::new(
        "SPLICE_TYPE=END_NORMAL OPID=SPLICE PRE_ROLL_TIME=5000 EVENT_ID=77 \
         UNIQUE_PROGRAM_ID=513 AVAIL_NUM=1 AVAILS_EXPECTED=2",
    )
    .unwrap();
    let message = scte_bytes(&session.tick_at(Instant::now()));
    assert_eq!(message[0x12], 3, "splice_insert_type END_NORMAL");
    let event_id = u32::from_be_bytes([
        message[0x13],
        message[0x14],
        message[0x15],
        message[0x16],
    ]);
    assert_eq!(event_id, 77);
    assert_eq!(u16::from_be_bytes([message[0x17], message[0x18]]), 513);
    assert_eq!(pre_roll_of(&message), 5000);
    // BREAK_DURATION was absent
    assert_eq!(u16::from_be_bytes([message[0x1B], message[0x1C]]), 0xFFFF);
    assert_eq!(message[0x1D], 1, "avail_num");
    assert_eq!(message[0x1E], 2, "avails_expected");
    assert_eq!(message[0x1F], 0, "auto_return_flag");
}

#[test]
fn update_replaces_pending_cue() {
    test_init_log();
    let mut session = Scte104::new(
        "OPID=SPLICE,SPLICE_TYPE=START_NORMAL,PRE_ROLL_TIME=8000,BREAK_DURATION=600",
    )
    .unwrap();
    let base = Instant::now();
    assert_eq!(pre_roll_of(&scte_bytes(&session.tick_at(base))), 8000);

    session
        .update("OPID=SPLICE,SPLICE_TYPE=START_NORMAL,PRE_ROLL_TIME=2000,BREAK_DURATION=300")
        .unwrap();

    // the replacement cue announces on its first frame with its own pre-roll
    let message = scte_bytes(&session.tick_at(base + FRAME_INTERVAL));
    assert_eq!(opid_of(&message), OP_SPLICE);
    assert_eq!(pre_roll_of(&message), 2000);
    assert_eq!(u16::from_be_bytes([message[0x1B], message[0x1C]]), 300);

    // 2000 ms is inside the countdown floor, so heartbeats follow directly
    let message = scte_bytes(&session.tick_at(base + FRAME_INTERVAL + Duration::from_secs(1)));
    assert_eq!(opid_of(&message), OP_SPLICE_NULL);
}
