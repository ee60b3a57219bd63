#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(stages) = bookstore::query::parse_pipeline_json(s)
        && let Ok(pipeline) = bookstore::aggregate::Pipeline::parse(&stages)
    {
        let books = bookstore::bookstore::sample_books().iter().map(|b| b.to_document()).collect();
        let _ = pipeline.run(books);
    }
});
