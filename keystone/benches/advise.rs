//! Benchmarks for enumeration and the full advisor pipeline.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use keystone::{Advisor, AdvisorConfig};
use keystone_model::{Cardinality, EntityDef, Model, ModelBuilder};
use keystone_plan::IndexEnumerator;
use keystone_query::Workload;

fn twitter_model() -> Model {
    ModelBuilder::new()
        .entity(
            EntityDef::new("User", 10_000)
                .id("UserId")
                .string("City", 20)
                .string("Username", 30),
        )
        .entity(
            EntityDef::new("Tweet", 100_000)
                .id("TweetId")
                .string("Body", 140)
                .integer("Timestamp")
                .foreign_key("User", "User", Cardinality::One),
        )
        .build()
        .expect("model builds")
}

fn twitter_workload() -> Workload {
    let mut workload = Workload::new(twitter_model()).with_budget(50_000_000);
    workload.add("SELECT Body FROM Tweet.User WHERE User.City = ?", 5.0);
    workload.add(
        "SELECT Body FROM Tweet.User WHERE User.Username = ? ORDER BY Tweet.Timestamp",
        3.0,
    );
    workload.add("SELECT Username FROM User WHERE User.City = ?", 2.0);
    workload.add("UPDATE User SET Username = ? WHERE User.UserId = ?", 1.0);
    workload.add("INSERT INTO Tweet SET TweetId = ?, Body = ?, Timestamp = ?, User = ?", 2.0);
    workload
}

fn bench_enumeration(c: &mut Criterion) {
    let workload = twitter_workload();
    let model = workload.model().clone();
    c.bench_function("enumerate_workload", |b| {
        b.iter(|| {
            let candidates = IndexEnumerator::new(&model)
                .indexes_for_workload(black_box(&workload))
                .expect("enumeration succeeds");
            black_box(candidates)
        });
    });
}

fn bench_advise(c: &mut Criterion) {
    let workload = twitter_workload();
    let advisor = Advisor::new(AdvisorConfig::default());
    c.bench_function("advise_workload", |b| {
        b.iter(|| {
            let recommendation = advisor.advise(black_box(&workload)).expect("advises");
            black_box(recommendation)
        });
    });
}

criterion_group!(benches, bench_enumeration, bench_advise);
criterion_main!(benches);
