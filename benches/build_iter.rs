use bsonbuf::{cstr, CString, DocumentBuf, ValidateOptions};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn construct_broad_doc(size: usize) -> DocumentBuf {
    let mut doc = DocumentBuf::new();
    for i in 0..size {
        let key = CString::try_from(format!("key {i}")).unwrap();
        doc.append_utf8(key.as_ref(), "lorem ipsum").unwrap();
    }
    doc
}

fn construct_deep_doc(depth: usize) -> DocumentBuf {
    let mut doc = DocumentBuf::new();
    for _ in 0..depth {
        doc.begin_document(cstr!("value")).unwrap();
    }
    doc.append_int64(cstr!("value"), 23).unwrap();
    for _ in 0..depth {
        doc.end_document().unwrap();
    }
    doc
}

fn build_broad(c: &mut Criterion) {
    let mut group = c.benchmark_group("build-broad");
    for size in &[10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| construct_broad_doc(size));
        });
    }
    group.finish();
}

fn build_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("build-deep");
    for depth in &[10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            b.iter(|| construct_deep_doc(depth));
        });
    }
    group.finish();
}

fn iter_broad(c: &mut Criterion) {
    const SIZE: usize = 1000;
    let doc = construct_broad_doc(SIZE);
    let bytes = doc.as_bytes().to_vec();
    c.bench_function("iter-broad", |b| {
        b.iter(|| {
            let doc = bsonbuf::Document::from_bytes(&bytes).unwrap();
            let mut i = 0;
            for result in doc.iter() {
                result.unwrap();
                i += 1;
            }
            assert_eq!(i, SIZE);
        });
    });
}

fn access_deep(c: &mut Criterion) {
    const DEPTH: usize = 100;
    let doc = construct_deep_doc(DEPTH);
    c.bench_function("access-deep", |b| {
        b.iter(|| {
            let mut view: &bsonbuf::Document = &doc;
            while let Ok(inner) = view.get_document("value") {
                view = inner;
            }
            view.get_i64("value").unwrap();
        });
    });
}

fn validate_broad(c: &mut Criterion) {
    const SIZE: usize = 1000;
    let doc = construct_broad_doc(SIZE);
    c.bench_function("validate-broad", |b| {
        b.iter(|| {
            doc.validate(ValidateOptions {
                utf8: true,
                ..Default::default()
            })
            .unwrap();
        });
    });
}

fn render_broad(c: &mut Criterion) {
    const SIZE: usize = 100;
    let doc = construct_broad_doc(SIZE);
    c.bench_function("render-broad", |b| {
        b.iter(|| doc.to_json().unwrap());
    });
}

criterion_group!(
    benches,
    build_broad,
    build_deep,
    iter_broad,
    access_deep,
    validate_broad,
    render_broad,
);

criterion_main!(benches);
