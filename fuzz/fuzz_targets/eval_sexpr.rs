#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Feed in two halves to exercise resumption of partial datums
        let split = (0..=s.len() / 2).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
        let mut interpreter = sexpr::Interpreter::new();
        if interpreter.feed(&s[..split]).is_ok() && interpreter.feed(&s[split..]).is_ok() {
            let _ = interpreter.flush();
        }
    }
});
