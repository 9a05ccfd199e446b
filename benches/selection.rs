//! Benchmarks for seminal folding and quota selection.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prereq_tree::pipeline::selection::SelectionPolicy;
use prereq_tree::pipeline::seminal::{FrequencyTable, SeminalDelta};
use prereq_tree::provider::SeminalWork;

/// 8 concepts x 6 surveys x 10 references, drawn from a pool of 40 titles
/// per concept so roughly a third repeat across surveys.
fn synthetic_deltas() -> Vec<SeminalDelta> {
    let mut deltas = Vec::new();
    for c in 0..8 {
        for s in 0..6 {
            let references = (0..10)
                .map(|r| SeminalWork::titled(format!("paper {}", (s * 7 + r * 3) % 40)))
                .collect();
            deltas.push(SeminalDelta {
                concept: format!("concept {c}"),
                source: format!("survey {c}-{s}"),
                references,
            });
        }
    }
    deltas
}

fn bench_fold(c: &mut Criterion) {
    let deltas = synthetic_deltas();
    c.bench_function("fold_8x6x10", |bench| {
        bench.iter(|| black_box(FrequencyTable::fold(deltas.clone())))
    });
}

fn bench_select_quota(c: &mut Criterion) {
    let table = FrequencyTable::fold(synthetic_deltas());
    let policy = SelectionPolicy::default();
    c.bench_function("select_quota_8_concepts", |bench| {
        bench.iter(|| black_box(policy.select_quota(&table)))
    });
}

criterion_group!(benches, bench_fold, bench_select_quota);
criterion_main!(benches);
