#![no_main]
use geodat::{normalize, pretty, AddressInput, NormalizedAddress};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        match normalize(AddressInput::Text(s)) {
            NormalizedAddress::Ipv4(v4) => {
                // Re-normalizing the formatted value must be stable
                let text = pretty(v4);
                assert_eq!(normalize(AddressInput::Text(&text)), NormalizedAddress::Ipv4(v4));
            }
            NormalizedAddress::Ipv6(words) => {
                let text = pretty(words);
                let bare = text.trim_start_matches('[').trim_end_matches(']');
                let _ = normalize(AddressInput::Text(bare));
            }
            NormalizedAddress::Invalid => {}
        }
    }
});
