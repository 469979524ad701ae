use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;
use serde_json::json;

use trafficsync::admin::TrafficChange;
use trafficsync::authority::Authority;
use trafficsync::events::{EventBody, EventLog};
use trafficsync::ledger::TrafficRecord;
use trafficsync::settings::Settings;

fn snapshot(n: u64) -> EventBody {
    EventBody::UpdateUserTraffic {
        user_id: format!("user_{}", n % 1000),
        total_traffic: n,
        used_traffic: 0,
    }
}

fn benchmark_event_log_append(c: &mut Criterion) {
    let log = EventLog::new();
    let mut counter = 0;
    c.bench_function("event_log_append", |b| {
        b.iter(|| {
            counter += 1;
            black_box(log.append(snapshot(counter)).unwrap())
        })
    });
}

fn benchmark_event_log_tail_read(c: &mut Criterion) {
    let log = EventLog::new();
    for n in 0..100_000 {
        log.append(snapshot(n)).unwrap();
    }

    c.bench_function("event_log_read_last_100", |b| {
        b.iter(|| black_box(log.read_since(99_900).unwrap()))
    });
}

fn benchmark_sync_round(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let settings = Settings {
        node_keys: vec!["edge-a".to_string()],
        ..Default::default()
    };
    let authority = runtime.block_on(async {
        let authority = Authority::from_settings(settings).await.unwrap();
        for n in 0..1000 {
            authority
                .admin
                .provision_user(TrafficRecord::new(format!("user_{}", n)))
                .await
                .unwrap();
        }
        authority
    });

    let mut rng = rand::thread_rng();
    c.bench_function("sync_batch_of_50", |b| {
        b.iter(|| {
            let batch: Vec<serde_json::Value> = (0..50)
                .map(|_| {
                    json!({
                        "type": "inc_used_traffic",
                        "user_id": format!("user_{}", rng.gen_range(0..1000)),
                        "dt": rng.gen_range(1..65_536),
                    })
                })
                .collect();
            runtime.block_on(async {
                authority
                    .admin
                    .apply_admin_traffic_change(TrafficChange {
                        user_id: "user_0".to_string(),
                        total_traffic: Some(rng.gen()),
                        used_traffic: None,
                    })
                    .await
                    .unwrap();
                black_box(authority.coordinator.sync("edge-a", batch).await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    benchmark_event_log_append,
    benchmark_event_log_tail_read,
    benchmark_sync_round
);
criterion_main!(benches);
