#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let opts = zune_webp::zune_core::options::DecoderOptions::default()
        .set_max_width(4096)
        .set_max_height(4096);

    let mut decoder = zune_webp::WebpDecoder::new_with_options(data, opts);
    let _ = decoder.decode();
});
