#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mux) = zune_webp::mux::Mux::create(data, false) {
        // anything that parses must assemble or fail cleanly
        let _ = mux.assemble();
        let _ = mux.get_canvas_size();
    }
});
