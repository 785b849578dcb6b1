#![no_main]
use libfuzzer_sys::fuzz_target;

use vanc_types::Scte104;

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
    if let Ok(command) = std::str::from_utf8(data) {
        if let Ok(mut session) = Scte104::new(command) {
            info!("parsed {session:?}");
            let words = session.tick();
            assert_eq!(words.len() % 32, 0);
        }
    }
});
