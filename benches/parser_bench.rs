use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlast::entities::decode_entities;
use xmlast::parser::{parse_str_with_options, ParseOptions};
use xmlast::sax::{parse_events, parse_events_with_options, BuilderOptions};
use xmlast::tokenizer::tokenize;
use xmlast::Document;

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a small XML document with approximately 10 elements.
fn make_small_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n");
    for i in 0..10 {
        let _ = writeln!(xml, "  <item id=\"{i}\">Value {i}</item>");
    }
    xml.push_str("</root>\n");
    xml
}

/// Generates a large XML document with approximately 1000 records.
fn make_large_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<database>\n");
    for i in 0..1000 {
        let _ = writeln!(
            xml,
            "  <record id=\"{i}\"><name>Record {i}</name>\
             <value>{}</value><status>active</status></record>",
            i * 42
        );
    }
    xml.push_str("</database>\n");
    xml
}

/// Generates a document nested `depth` levels deep.
fn make_nested_xml(depth: usize) -> String {
    let mut xml = String::new();
    for i in 0..depth {
        let _ = write!(xml, "<level{i}>");
    }
    xml.push_str("leaf");
    for i in (0..depth).rev() {
        let _ = write!(xml, "</level{i}>");
    }
    xml
}

/// Generates HTML-flavored markup with void elements and unclosed list items.
fn make_html_doc() -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<body>\n");
    for i in 0..50 {
        let _ = writeln!(
            html,
            "<div class=\"section\" id=\"s{i}\">\
             <p>Paragraph {i} with <b>bold</b> &amp; <i>italic</i> text.\
             <ul><li>Item A<li>Item B<li>Item C</ul>\
             <img src=\"img{i}.png\" alt=\"Image {i}\"><br>\
             <a href=\"#s{i}\">Link {i}</a>\
             </div>"
        );
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Generates text dense with character references.
fn make_entity_text() -> String {
    let mut text = String::new();
    for i in 0..500 {
        let _ = write!(
            text,
            "a &lt; b &amp;&amp; c &gt; d &#{}; &#x{:x}; &quot;q&quot; ",
            65 + i % 26,
            0x80 + i % 32
        );
    }
    text
}

// ---------------------------------------------------------------------------
// Single-pass parser benchmarks
// ---------------------------------------------------------------------------

fn bench_tokenize_large(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("tokenize_large", |b| {
        b.iter(|| tokenize(black_box(&xml)));
    });
}

fn bench_parse_small(c: &mut Criterion) {
    let xml = make_small_xml();
    c.bench_function("parse_small", |b| {
        b.iter(|| Document::parse_str(black_box(&xml)));
    });
}

fn bench_parse_large(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("parse_large", |b| {
        b.iter(|| Document::parse_str(black_box(&xml)));
    });
}

fn bench_parse_deeply_nested(c: &mut Criterion) {
    let xml = make_nested_xml(1000);
    c.bench_function("parse_deeply_nested", |b| {
        b.iter(|| Document::parse_str(black_box(&xml)));
    });
}

fn bench_parse_html(c: &mut Criterion) {
    let html = make_html_doc();
    c.bench_function("parse_html", |b| {
        b.iter(|| Document::parse_str(black_box(&html)));
    });
}

fn bench_parse_no_decoding(c: &mut Criterion) {
    let xml = make_large_xml();
    let options = ParseOptions::xml().decode_entities(false);
    c.bench_function("parse_large_no_decoding", |b| {
        b.iter(|| parse_str_with_options(black_box(&xml), &options));
    });
}

// ---------------------------------------------------------------------------
// Event engine benchmarks
// ---------------------------------------------------------------------------

fn bench_events_small(c: &mut Criterion) {
    let xml = make_small_xml();
    c.bench_function("events_small", |b| {
        b.iter(|| parse_events(black_box(&xml)));
    });
}

fn bench_events_large(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("events_large", |b| {
        b.iter(|| parse_events(black_box(&xml)));
    });
}

fn bench_events_large_with_indices(c: &mut Criterion) {
    let xml = make_large_xml();
    let options = ParseOptions::xml();
    c.bench_function("events_large_with_indices", |b| {
        b.iter(|| {
            parse_events_with_options(black_box(&xml), &options, BuilderOptions::with_indices())
        });
    });
}

// ---------------------------------------------------------------------------
// Entity decoding benchmarks
// ---------------------------------------------------------------------------

fn bench_decode_entities(c: &mut Criterion) {
    let text = make_entity_text();
    c.bench_function("decode_entities", |b| {
        b.iter(|| decode_entities(black_box(&text)));
    });
}

fn bench_decode_plain_text(c: &mut Criterion) {
    let text = "plain text without any references ".repeat(500);
    c.bench_function("decode_plain_text", |b| {
        b.iter(|| decode_entities(black_box(&text)));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    single_pass,
    bench_tokenize_large,
    bench_parse_small,
    bench_parse_large,
    bench_parse_deeply_nested,
    bench_parse_html,
    bench_parse_no_decoding,
);

criterion_group!(
    events,
    bench_events_small,
    bench_events_large,
    bench_events_large_with_indices,
);

criterion_group!(entities, bench_decode_entities, bench_decode_plain_text);

criterion_main!(single_pass, events, entities);
