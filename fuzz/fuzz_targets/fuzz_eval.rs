#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(filter) = bookstore::query::parse_filter_json(s)
    {
        let docs = [
            bson::doc! {"title": "x", "published_year": 1925, "price": 12.99},
            bson::doc! {"title": "y", "in_stock": false, "meta": {"z": 3}},
            bson::doc! {},
        ];
        for d in &docs {
            let _ = bookstore::query::eval_filter(d, &filter);
        }
    }
});
