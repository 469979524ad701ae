use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::json;

use trafficsync::admin::TrafficChange;
use trafficsync::authority::Authority;
use trafficsync::events::{EventBody, EventLog};
use trafficsync::ledger::TrafficRecord;
use trafficsync::nodes::ReportWindow;
use trafficsync::settings::Settings;

fn snapshot(n: u64) -> EventBody {
    EventBody::UpdateUserTraffic {
        user_id: format!("u{}", n % 3),
        total_traffic: n,
        used_traffic: 0,
    }
}

#[derive(Clone, Debug)]
enum Step {
    Admin { total: u64 },
    Sync { node: usize, dt: i64 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u64..1_000_000).prop_map(|total| Step::Admin { total }),
        (0usize..3, -50i64..500).prop_map(|(node, dt)| Step::Sync { node, dt }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn test_read_since_returns_tail_in_order(
        appended in 0u64..60,
        revision in 0u64..80
    ) {
        let log = EventLog::new();
        for n in 0..appended {
            prop_assert_eq!(log.append(snapshot(n)).unwrap(), n);
        }

        let tail = log.read_since(revision).unwrap();
        prop_assert_eq!(tail.len() as u64, appended.saturating_sub(revision));
        for (offset, event) in tail.iter().enumerate() {
            prop_assert_eq!(event.sequence, revision + offset as u64);
            prop_assert_eq!(&event.body, &snapshot(event.sequence));
        }
    }

    #[test]
    fn test_report_window_never_exceeds_capacity(
        capacity in 0usize..16,
        ids in prop::collection::vec("[a-f0-9]{1,3}", 0..64)
    ) {
        let mut window = ReportWindow::new(capacity);
        for id in &ids {
            window.remember(id.clone());
            prop_assert!(window.len() <= capacity);
        }
        if capacity > 0 {
            if let Some(last) = ids.last() {
                prop_assert!(window.contains(last));
            }
        }
    }

    #[test]
    fn test_cursors_are_monotone_and_deliver_each_event_once(
        steps in prop::collection::vec(step_strategy(), 1..40)
    ) {
        let nodes = ["edge-a", "edge-b", "edge-c"];
        runtime().block_on(async {
            let settings = Settings {
                node_keys: nodes.iter().map(|k| k.to_string()).collect(),
                ..Default::default()
            };
            let authority = Authority::from_settings(settings).await.unwrap();
            authority.admin.provision_user(TrafficRecord::new("u1")).await.unwrap();

            let mut cursors = [0u64; 3];
            let mut delivered: Vec<HashSet<u64>> = vec![HashSet::new(); 3];
            let mut expected_used: i64 = 0;

            for step in &steps {
                match step {
                    Step::Admin { total } => {
                        authority
                            .admin
                            .apply_admin_traffic_change(TrafficChange {
                                user_id: "u1".to_string(),
                                total_traffic: Some(*total),
                                used_traffic: None,
                            })
                            .await
                            .unwrap();
                    }
                    Step::Sync { node, dt } => {
                        let outcome = authority
                            .coordinator
                            .sync(
                                nodes[*node],
                                vec![json!({"type": "inc_used_traffic", "user_id": "u1", "dt": dt})],
                            )
                            .await
                            .unwrap();
                        expected_used = (expected_used + dt).max(0);

                        prop_assert!(outcome.cursor >= cursors[*node]);
                        prop_assert_eq!(outcome.cursor, authority.log.len().unwrap());
                        for event in &outcome.events {
                            prop_assert!(event.sequence >= cursors[*node]);
                            prop_assert!(delivered[*node].insert(event.sequence));
                        }
                        cursors[*node] = outcome.cursor;
                        prop_assert_eq!(delivered[*node].len() as u64, outcome.cursor);
                    }
                }
            }

            let record = authority.ledger.get("u1").await.unwrap();
            prop_assert_eq!(record.used, expected_used as u64);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
