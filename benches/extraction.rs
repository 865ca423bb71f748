//! Extraction and editing benchmarks.
//!
//! Measures parse + discovery, digraph extraction and a round of edits on a
//! generated machine with many states.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use statelit::{parse_source, Dialect, LensConfig, MachineEdit};

/// A flat machine with `n` states, each sending `NEXT` to its successor.
fn generated_machine(n: usize) -> String {
    let mut src = String::from("createMachine({\n  id: 'bench',\n  initial: 's0',\n  states: {\n");
    for i in 0..n {
        src.push_str(&format!(
            "    s{i}: {{\n      entry: ['enter{i}', 'log'],\n      on: {{\n        NEXT: {{ target: 's{}', guard: 'ready' }},\n        RESET: 's0',\n      }},\n    }},\n",
            (i + 1) % n
        ));
    }
    src.push_str("  },\n});\n");
    src
}

fn bench_extraction(c: &mut Criterion) {
    let config = LensConfig::default();
    let mut group = c.benchmark_group("extract");
    for n in [10, 100, 500] {
        let src = generated_machine(n);
        group.bench_with_input(BenchmarkId::new("parse_and_locate", n), &src, |b, src| {
            b.iter(|| parse_source(black_box(src.as_str()), Dialect::TypeScript, &config).unwrap())
        });
        let file = parse_source(src.as_str(), Dialect::TypeScript, &config).unwrap();
        group.bench_with_input(BenchmarkId::new("digraph", n), &file, |b, file| {
            b.iter(|| black_box(file.extract(0).unwrap()))
        });
    }
    group.finish();
}

fn bench_edits(c: &mut Criterion) {
    let config = LensConfig::default();
    let src = generated_machine(100);
    let file = parse_source(src.as_str(), Dialect::TypeScript, &config).unwrap();
    let edits = vec![
        MachineEdit::RenameState {
            path: vec!["s0".into()],
            name: "start".into(),
        },
        MachineEdit::RemoveState {
            path: vec!["s50".into()],
        },
    ];
    c.bench_function("edit/rename_and_remove_100", |b| {
        b.iter(|| black_box(file.edit(0, &edits, &config).unwrap()))
    });
}

criterion_group!(benches, bench_extraction, bench_edits);
criterion_main!(benches);
