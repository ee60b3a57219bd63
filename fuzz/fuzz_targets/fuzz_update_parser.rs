#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(update) = bookstore::query::parse_update_json(s)
    {
        let mut book = bookstore::bookstore::sample_books()[0].to_document();
        let _ = bookstore::query::apply_update(&mut book, &update);
    }
});
