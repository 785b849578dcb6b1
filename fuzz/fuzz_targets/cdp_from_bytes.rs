#![no_main]
use libfuzzer_sys::fuzz_target;

use vanc_types::{Cdp, CeaFormat};

use once_cell::sync::Lazy;

#[macro_use]
extern crate log;

pub fn debug_init() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        env_logger::init();
    });

    Lazy::force(&TRACING);
}

fuzz_target!(|data: &[u8]| {
    debug_init();
    // a CDP section counts at most 31 triplets
    if data.len() > 31 * 3 {
        return;
    }
    if let Ok(mut cdp) = Cdp::new(data, CeaFormat::RawPkts) {
        info!("parsed {} triplets", cdp.triplets().len());
        let frame = cdp.to_bytes();
        assert_eq!(frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)), 0);
    }
});
