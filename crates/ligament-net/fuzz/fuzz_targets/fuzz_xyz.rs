#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

use ligament_net::io::{LoadOptions, load_volume};

fuzz_target!(|data: &[u8]| {
    // Write fuzz data to a temporary file with .xyz extension
    let mut file = match NamedTempFile::with_suffix(".xyz") {
        Ok(f) => f,
        Err(_) => return,
    };

    if file.write_all(data).is_err() {
        return;
    }

    // Loading must return an error, never panic
    let _ = load_volume(file.path(), &LoadOptions::default());
});
