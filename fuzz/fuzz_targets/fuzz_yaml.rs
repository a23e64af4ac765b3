// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use bindef::sanitize;
use bindef::spec::yaml::YamlLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Fuzz YAML definitions through the sanitizer
    if let Ok(doc) = YamlLoader::parse_yaml(text) {
        if let Ok(defs) = YamlLoader::definitions(&doc) {
            for (_, spec) in defs {
                let _ = sanitize(&spec);
            }
        }
    }
});
