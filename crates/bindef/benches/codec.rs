// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec Benchmark
//!
//! Measures the traversal engine on a table of variable-size records:
//! - parse of a serialized table
//! - serialize of a parsed tree
//! - sanitize of the table spec

#![allow(clippy::uninlined_format_args)]

use bindef::traversal::{parse, serialize_to_vec};
use bindef::{sanitize, FieldSpec, Meta};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn table_spec() -> FieldSpec {
    FieldSpec::container("table")
        .endian("<")
        .entry(FieldSpec::field("count", "UInt32"))
        .entry(FieldSpec::array(
            "rows",
            Meta::path(".count"),
            FieldSpec::container("row")
                .entry(FieldSpec::field("id", "UInt32"))
                .entry(FieldSpec::field("score", "Double").align(8))
                .entry(FieldSpec::field("name_len", "UInt8"))
                .entry(FieldSpec::field("name", "StrRawUtf8").size_path(".name_len")),
        ))
}

fn table_bytes(rows: u32) -> Vec<u8> {
    let mut out = rows.to_le_bytes().to_vec();
    for i in 0..rows {
        let name = format!("row-{}", i);
        out.extend_from_slice(&i.to_le_bytes());
        out.resize(out.len().next_multiple_of(8), 0);
        out.extend_from_slice(&(f64::from(i) * 0.5).to_le_bytes());
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let desc = sanitize(&table_spec()).expect("valid spec");
    let mut group = c.benchmark_group("parse");
    for rows in [16u32, 256, 4096] {
        let data = table_bytes(rows);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| black_box(parse(&desc, data).expect("parse")));
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let desc = sanitize(&table_spec()).expect("valid spec");
    let mut group = c.benchmark_group("serialize");
    for rows in [16u32, 256, 4096] {
        let data = table_bytes(rows);
        let tree = parse(&desc, &data).expect("parse");
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &tree, |b, tree| {
            b.iter(|| black_box(serialize_to_vec(tree).expect("serialize")));
        });
    }
    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let spec = table_spec();
    c.bench_function("sanitize_table", |b| {
        b.iter(|| black_box(sanitize(black_box(&spec)).expect("valid spec")));
    });
}

criterion_group!(codec_benches, bench_parse, bench_serialize, bench_sanitize);
criterion_main!(codec_benches);
