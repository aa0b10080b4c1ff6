#![no_main]

use codec::{DecoderConfig, NullObserver, ReplayReader};
use libfuzzer_sys::fuzz_target;
use schema::ExportRegistry;
use wire::{Limits, ReplayVersions};

fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::new(ReplayVersions::latest(), ExportRegistry::diagnostic())
        .with_limits(Limits::for_testing());
    let Ok(mut reader) = ReplayReader::new(config) else {
        return;
    };
    let _ = reader.decode(data, &mut NullObserver);
});
