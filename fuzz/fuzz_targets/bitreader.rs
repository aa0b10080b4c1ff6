#![no_main]

use bitstream::BitReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = BitReader::new(data);
    let mut idx = 0usize;

    // Use input bytes to drive a bounded sequence of operations.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 8;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_bit();
            }
            1 => {
                let bits = (data[idx.saturating_sub(1)] % 64).saturating_add(1);
                let _ = reader.read_bits(bits);
            }
            2 => {
                let _ = reader.read_packed_u32();
            }
            3 => {
                let max = u32::from(data[idx.saturating_sub(1)]).saturating_add(1);
                let _ = reader.read_serialized_int(max);
            }
            4 => {
                let _ = reader.read_fstring();
            }
            5 => {
                let bits = usize::from(data[idx.saturating_sub(1)]);
                if let Ok(mut window) = reader.window(bits) {
                    let _ = window.read_u32();
                }
            }
            6 => {
                let _ = reader.read_f32();
            }
            _ => {
                let _ = reader.skip_bits(usize::from(data[idx.saturating_sub(1)] % 32));
            }
        }
    }
});
