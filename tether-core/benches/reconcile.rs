//! List reconciliation and expression benchmarks.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::json;
use tether_core::expr::compile;
use tether_core::reactive::observe;
use tether_core::{MemoryDom, Options, Scope, Value, ViewModel};

const TEMPLATE: &str = r#"<ul><li v-for="(row, i) in rows">{{ i }}: {{ row.label }}</li></ul>"#;

fn rows(count: usize) -> serde_json::Value {
    let rows: Vec<_> = (0..count)
        .map(|i| json!({ "label": format!("row {i}") }))
        .collect();
    json!({ "rows": rows })
}

fn list(count: usize) -> (Rc<MemoryDom>, ViewModel) {
    let dom = Rc::new(MemoryDom::new());
    let root = dom.root_with(TEMPLATE);
    let vm = ViewModel::new(dom.clone(), root, Options::new().data(rows(count)))
        .expect("valid instance");
    (dom, vm)
}

fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    group.bench_function("render_1000", |b| {
        b.iter(|| black_box(list(1000)));
    });

    group.bench_function("push_one_into_1000", |b| {
        b.iter_batched(
            || list(1000),
            |(dom, vm)| {
                if let Some(rows) = vm.get("rows").as_array() {
                    rows.push([Value::from(json!({ "label": "new" }))]);
                }
                (dom, vm)
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("splice_head_of_1000", |b| {
        b.iter_batched(
            || list(1000),
            |(dom, vm)| {
                if let Some(rows) = vm.get("rows").as_array() {
                    rows.splice(0, 1, []);
                }
                (dom, vm)
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("reverse_1000", |b| {
        b.iter_batched(
            || list(1000),
            |(dom, vm)| {
                if let Some(rows) = vm.get("rows").as_array() {
                    rows.reverse();
                }
                (dom, vm)
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_expressions(c: &mut Criterion) {
    let data = Value::from(json!({ "a": 1, "b": { "c": 2 }, "items": [1, 2, 3] }));
    observe(&data);
    let scope = Scope::root(data.as_object().cloned().expect("object"));

    let mut group = c.benchmark_group("expr");

    group.bench_function("compile_cached", |b| {
        b.iter(|| compile(black_box("a + b.c * 2 > 3 ? 'big' : 'small'")));
    });

    let getter = compile("a + b.c * 2 > 3 ? 'big' : 'small'").expect("valid expression");
    group.bench_function("evaluate", |b| {
        b.iter(|| black_box(getter.get(&scope)));
    });

    let length = compile("items.length + a").expect("valid expression");
    group.bench_function("evaluate_member_chain", |b| {
        b.iter(|| black_box(length.get(&scope)));
    });

    group.finish();
}

criterion_group!(benches, bench_list, bench_expressions);
criterion_main!(benches);
