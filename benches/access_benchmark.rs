use carter_care::services::access::{effective_admin_set, resolve, ViewMode};
use carter_care::services::check_password_policy;
use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::BTreeSet;
use std::hint::black_box;

fn benchmark_access_resolution(c: &mut Criterion) {
    // A console-sized roster: a few configured admins plus many added at runtime
    let configured: BTreeSet<String> = (0..5).map(|i| format!("admin{i}@example.com")).collect();
    let roster: BTreeSet<String> = (0..500)
        .map(|i| format!("staff{i}@example.com"))
        .collect();
    let supers: BTreeSet<String> = ["dev@example.com".to_string()].into();

    let mut group = c.benchmark_group("access_resolution");

    group.bench_function("merge_admin_sets", |b| {
        b.iter(|| effective_admin_set(black_box(&configured), black_box(&roster)))
    });

    let admins = effective_admin_set(&configured, &roster);
    group.bench_function("resolve_regular_user", |b| {
        b.iter(|| {
            resolve(
                black_box("someone@example.com"),
                &admins,
                &supers,
                ViewMode::Normal,
            )
        })
    });

    group.bench_function("resolve_super_admin_preview", |b| {
        b.iter(|| {
            resolve(
                black_box("dev@example.com"),
                &admins,
                &supers,
                ViewMode::AdminPreview,
            )
        })
    });

    group.finish();
}

fn benchmark_password_policy(c: &mut Criterion) {
    let long = "Aa1".repeat(100);

    let mut group = c.benchmark_group("password_policy");
    group.bench_function("typical", |b| {
        b.iter(|| check_password_policy(black_box("Correct1Horse")))
    });
    group.bench_function("long", |b| b.iter(|| check_password_policy(black_box(&long))));
    group.finish();
}

criterion_group!(benches, benchmark_access_resolution, benchmark_password_policy);
criterion_main!(benches);
