//! The attached router end to end: batches injected through the subscriber
//! channel come out of the right publishers, with metrics to match.

use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::LocalSet;
use tokio::time::timeout;

use routerd::framing::FramerRegistry;
use routerd::metrics::RouterMetrics;
use routerd::router::Router;

use crate::common::{RecordingBinder, RecordingPublisher, FULL_CONFIG};

async fn wait_for_delivery(publisher: &Rc<RecordingPublisher>) {
    timeout(Duration::from_secs(1), async {
        while publisher.sent_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("message never delivered");
}

#[tokio::test]
async fn attached_router_routes_injected_batches() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let config = routerd_config::load_str(FULL_CONFIG).unwrap();
            let mut binder = RecordingBinder::default();
            let registry = FramerRegistry::with_builtins();
            let router = Router::create(&config, &mut binder, &registry, false).unwrap();

            let metrics = Rc::new(RouterMetrics::new("test"));
            metrics.set_port_counts(router.skip_framer_ports, router.accept_last_ports);
            router.attach(&metrics);

            binder.senders[0]
                .send(Bytes::from_static(&[0x55, 0xae, 0x00]))
                .await
                .unwrap();

            let daemon = &binder.publishers[1];
            wait_for_delivery(daemon).await;

            assert_eq!(
                daemon.sent.borrow().as_slice(),
                &[vec![0x55, 0xae, 0x00]]
            );
            // INTERNAL accepted it too; everyone else rejected
            assert_eq!(binder.publishers[7].sent_count(), 1);
            for i in [2, 3, 4, 5, 6] {
                assert_eq!(binder.publishers[i].sent_count(), 0);
            }

            let s = metrics.snapshot();
            assert_eq!(s.count, 1);
            assert_eq!(s.size_total, 3);
            assert_eq!(s.wake_ups, 1);
            assert_eq!(s.ports_accept_last, 2);
        })
        .await;
}

#[tokio::test]
async fn ports_keep_working_independently() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let config = routerd_config::load_str(FULL_CONFIG).unwrap();
            let mut binder = RecordingBinder::default();
            let registry = FramerRegistry::with_builtins();
            let router = Router::create(&config, &mut binder, &registry, false).unwrap();

            let metrics = Rc::new(RouterMetrics::new("test"));
            router.attach(&metrics);

            // traffic into a port with no rules is accounted but goes nowhere
            binder.senders[1]
                .send(Bytes::from_static(&[0x01, 0x02]))
                .await
                .unwrap();
            // firmware traffic still routes
            binder.senders[0]
                .send(Bytes::from_static(&[0x55, 0xa5, 0x00]))
                .await
                .unwrap();

            let external = &binder.publishers[3];
            wait_for_delivery(external).await;

            assert_eq!(
                external.sent.borrow().as_slice(),
                &[vec![0x55, 0xa5, 0x00]]
            );

            timeout(Duration::from_secs(1), async {
                while metrics.snapshot().count < 2 {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("both batches accounted");
        })
        .await;
}
