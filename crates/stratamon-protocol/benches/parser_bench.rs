// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for status payload extraction and parsing in the
// stratamon-protocol crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use stratamon_protocol::parser::{parse_status_payload, parse_status_text};

// ---------------------------------------------------------------------------
// Helper: synthetic status file
// ---------------------------------------------------------------------------

/// A status file shaped like a busy printer's: a few scalar sections and a
/// queue with `jobs` records.
fn build_status_text(jobs: usize) -> String {
    let mut text = String::from(
        "set machineStatus(general) {\n\
         -modelerType {uPrint SE Plus}\n\
         -modelerStatus {Building}\n\
         -modelerExplanation {Part in progress}\n\
         -startTime 1700000000\n\
         -partCurrentTemp 77.5\n\
         -doorOpen false\n\
         }\n\
         set machineStatus(currentJob) {\n\
         -currentLayer 112\n\
         -totalLayers 340\n\
         -jobName bracket_v2\n\
         }\n\
         set machineStatus(queue) {\n",
    );
    for n in 0..jobs {
        text.push_str(&format!(
            "{{\n-jobName job_{n}\n-pack {n}\n-estimatedTime 5400\n}}\n"
        ));
    }
    text.push_str("}\n");
    text
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Parse an already-decoded status file of roughly the size a printer sends.
fn bench_parse_text(c: &mut Criterion) {
    let text = build_status_text(20);

    c.bench_function("parse_status_text (20 queued jobs)", |b| {
        b.iter(|| {
            let tree = parse_status_text(black_box(&text));
            black_box(tree);
        });
    });
}

/// Full payload path: marker search, lossy decode, parse.
fn bench_parse_payload(c: &mut Criterion) {
    let mut payload = b"\x00\x00header ".to_vec();
    payload.extend_from_slice(build_status_text(20).as_bytes());
    payload.extend_from_slice(b"Transferred: 4096");

    c.bench_function("parse_status_payload (20 queued jobs)", |b| {
        b.iter(|| {
            let tree = parse_status_payload(black_box(&payload));
            black_box(tree);
        });
    });
}

criterion_group!(benches, bench_parse_text, bench_parse_payload);
criterion_main!(benches);
