#![no_main]
use geodat::snapshot::{LoadOutcome, SnapshotSources};
use geodat::{NormalizedAddress, Snapshot};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input into an extended IPv4 table and a location table
    if data.len() < 2 {
        return;
    }
    let split = usize::from(data[0]) * 24 % data.len().max(1);
    let (table, locations) = data[1..].split_at(split.min(data.len() - 1));

    let sources = SnapshotSources::from_bytes(
        LoadOutcome::Extended(table.to_vec().into()),
        LoadOutcome::Legacy(Vec::new().into()),
        Some(locations.to_vec()),
    );

    // Malformed tables must be rejected or searched without panicking
    if let Ok(snapshot) = Snapshot::build(sources, 1, false) {
        for probe in [0u32, 1, 0x0101_0101, 0x7FFF_FFFF, 0xC0A8_0001, u32::MAX] {
            let _ = snapshot.lookup(NormalizedAddress::Ipv4(probe));
        }
        let _ = snapshot.validate();
    }
});
