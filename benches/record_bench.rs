use criterion::{Criterion, criterion_group, criterion_main};
use flatbuffers::FlatBufferBuilder;
use schema_record::{
    BaseType, DynamicRecord, FieldPath, RecordFactory, SchemaCatalog, SchemaField, SchemaObject,
};
use std::hint::black_box;
use std::sync::Arc;

// ─── Test Data ──────────────────────────────────────────────────────────────

/// Person {
///   name, age, pets: [String], address: Address { city, zip, geo: Geo },
///   scores: [Int32], friends: [Friend { name, since }], height, active
/// }
fn make_factory() -> RecordFactory {
    let person = SchemaObject::new(
        "Person",
        vec![
            SchemaField::new("name", 0, BaseType::String),
            SchemaField::new("age", 1, BaseType::Int32),
            SchemaField::vector("pets", 2, BaseType::String),
            SchemaField::object("address", 3, "Address"),
            SchemaField::vector("scores", 4, BaseType::Int32),
            SchemaField::vector_of("friends", 5, "Friend"),
            SchemaField::new("height", 6, BaseType::Float),
            SchemaField::new("active", 7, BaseType::Bool),
        ],
    );
    let address = SchemaObject::new(
        "Address",
        vec![
            SchemaField::new("city", 0, BaseType::String),
            SchemaField::new("zip", 1, BaseType::Int32),
            SchemaField::object("geo", 2, "Geo"),
        ],
    );
    let geo = SchemaObject::new(
        "Geo",
        vec![
            SchemaField::new("lat", 0, BaseType::Double),
            SchemaField::new("lon", 1, BaseType::Double),
        ],
    );
    let friend = SchemaObject::new(
        "Friend",
        vec![
            SchemaField::new("name", 0, BaseType::String),
            SchemaField::new("since", 1, BaseType::Int32),
        ],
    );
    let catalog = SchemaCatalog::new(vec![person, address, geo, friend], Some("Person")).unwrap();
    RecordFactory::new(Arc::new(catalog))
}

fn make_record(factory: &RecordFactory) -> DynamicRecord {
    let mut r = factory.new_root().unwrap();
    r.set("name", "Alice").unwrap();
    r.set("age", 28).unwrap();
    r.set("height", 1.68f32).unwrap();
    r.set("active", true).unwrap();
    for pet in ["Rex", "Mia", "Tom"] {
        r.repeated("pets").unwrap().push(pet).unwrap();
    }
    for score in 0..32 {
        r.repeated("scores").unwrap().push(score).unwrap();
    }
    let address = r.mutable_child("address").unwrap();
    address.set("city", "Lyon").unwrap();
    address.set("zip", 69001).unwrap();
    let geo = address.mutable_child("geo").unwrap();
    geo.set("lat", 45.76).unwrap();
    geo.set("lon", 4.83).unwrap();
    for i in 0..8 {
        let friend = r.repeated("friends").unwrap().add_record().unwrap();
        friend.set("name", format!("friend-{i}")).unwrap();
        friend.set("since", 2000 + i).unwrap();
    }
    r
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: Serialize
// ═══════════════════════════════════════════════════════════════════════════

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let factory = make_factory();
    let record = make_record(&factory);

    group.bench_function("serialize (fresh builder)", |b| {
        b.iter(|| black_box(record.serialize()))
    });

    group.bench_function("serialize_into (reused builder)", |b| {
        let mut fbb = FlatBufferBuilder::with_capacity(1024);
        b.iter(|| {
            fbb.reset();
            let root = record.serialize_into(&mut fbb);
            fbb.finish(root, None);
            black_box(fbb.finished_data().len())
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Merge
// ═══════════════════════════════════════════════════════════════════════════

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    let factory = make_factory();
    let bytes = make_record(&factory).serialize();

    group.bench_function("merge_from (fresh record)", |b| {
        b.iter(|| {
            let mut r = factory.new_root().unwrap();
            r.merge_from(black_box(&bytes)).unwrap();
            r
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Set Values
// ═══════════════════════════════════════════════════════════════════════════

fn bench_set_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_values");
    let factory = make_factory();
    let mut record = factory.new_root().unwrap();

    // ── 8 fields: binary-search lookup ──

    group.bench_function("set i32 by name", |b| {
        b.iter(|| record.set(black_box("age"), black_box(29)).unwrap())
    });

    group.bench_function("set str by name", |b| {
        b.iter(|| record.set(black_box("name"), black_box("Bob")).unwrap())
    });

    group.bench_function("parse_and_set i32", |b| {
        b.iter(|| record.parse_and_set(black_box("age"), black_box("31")).unwrap())
    });

    // ── 2 fields: linear lookup ──

    group.bench_function("set nested f64 by name", |b| {
        let geo = record.mutable_child("address").unwrap().mutable_child("geo").unwrap();
        b.iter(|| geo.set(black_box("lat"), black_box(1.0)).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 4: Field Paths
// ═══════════════════════════════════════════════════════════════════════════

fn bench_field_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_paths");
    let factory = make_factory();
    let path: FieldPath = "address.geo.lat".parse().unwrap();
    let resolved = path.resolve(factory.catalog()).unwrap().to_field_path();

    group.bench_function("parse text path", |b| {
        b.iter(|| black_box("address.geo.lat").parse::<FieldPath>().unwrap())
    });

    group.bench_function("resolve", |b| {
        b.iter(|| path.resolve(black_box(factory.catalog())).unwrap())
    });

    let mut record = factory.new_root().unwrap();
    group.bench_function("set_path by name", |b| {
        b.iter(|| record.set_path(black_box(&path), 2.0).unwrap())
    });
    group.bench_function("set_path by offset", |b| {
        b.iter(|| record.set_path(black_box(&resolved), 2.0).unwrap())
    });

    group.finish();
}

// ─── Criterion Main ─────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_serialize,
    bench_merge,
    bench_set_values,
    bench_field_paths,
);
criterion_main!(benches);
