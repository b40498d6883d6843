#![no_main]
use libfuzzer_sys::fuzz_target;
use proofsweep_lattice::Configuration;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Anything that parses must render back to an equal configuration.
        if let Ok(c) = s.parse::<Configuration>() {
            let again: Configuration = c.to_string().parse().unwrap();
            assert_eq!(c, again);
            assert_eq!(Configuration::from_elements(&c.elements()).unwrap(), c);
        }
    }
});
