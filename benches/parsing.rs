use criterion::{Criterion, black_box, criterion_group, criterion_main};

use aqirank::sources::{extract_search_results, parse_ranking_table};
use serde_json::{Value, json};

/// Builds a ranking page with a decoy navigation table ahead of the
/// real one, the shape the parser has to skip past in production.
fn ranking_page(rows: usize) -> String {
    let mut body = String::new();
    for idx in 0..rows {
        body.push_str(&format!(
            "<tr><th>{rank}</th><td><div>City {idx}</div></td>\
             <td><span>{aqi}</span></td>\
             <td><a href=\"/us/country-{c}/city-{idx}\">follow</a></td></tr>",
            rank = idx + 1,
            aqi = 40 + (idx % 260),
            c = idx % 7,
        ));
    }
    format!(
        "<html><body>\
         <table><thead><tr><th>Products</th><th>Company</th><th>Blog</th></tr></thead>\
         <tbody><tr><td>Monitors</td><td>About</td><td>News</td></tr></tbody></table>\
         <table><thead><tr><th>#</th><th>Major Cities</th><th>US AQI</th><th>Follow</th></tr></thead>\
         <tbody>{body}</tbody></table>\
         </body></html>"
    )
}

/// Builds a flat router payload: each record's scalars scattered
/// around its path anchor, with noise tokens in between.
fn search_payload(records: usize) -> Vec<Value> {
    let mut flat = vec![json!("loading"), json!(null)];
    for idx in 0..records {
        flat.push(json!(format!("recid{idx:08}ab")));
        flat.push(json!(40 + (idx % 260)));
        flat.push(json!(idx % 3 == 0));
        flat.push(json!(24.0 + idx as f64 * 0.1));
        flat.push(json!(67.0 + idx as f64 * 0.1));
        flat.push(json!("static/chunks/page.js"));
        flat.push(json!(format!("country-{}/state-{}/city-{idx}", idx % 7, idx % 11)));
        flat.push(json!(5));
        flat.push(json!(1200 + idx * 3));
    }
    flat
}

fn bench_ranking(c: &mut Criterion) {
    let page = ranking_page(100);

    c.bench_function("ranking_parse_100", |b| {
        b.iter(|| {
            let records = parse_ranking_table(black_box(&page), 100).expect("parse");
            black_box(records.len())
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let flat = search_payload(50);

    c.bench_function("search_extract_50", |b| {
        b.iter(|| {
            let results = extract_search_results(black_box(&flat));
            black_box(results.len())
        })
    });
}

criterion_group!(benches, bench_ranking, bench_search);
criterion_main!(benches);
