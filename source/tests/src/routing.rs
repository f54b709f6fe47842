//! Dispatch scenarios over the production firmware rule set.

use routerd::framing::FramerRegistry;
use routerd::router::Router;
use routerd::rules::matching_filter;
use routerd_config::{FilterAction, RouterConfig};

use crate::common::{RecordingBinder, FULL_CONFIG};

fn full_config() -> RouterConfig {
    routerd_config::load_str(FULL_CONFIG).unwrap()
}

fn create_router(config: &RouterConfig) -> (Router, RecordingBinder) {
    let mut binder = RecordingBinder::default();
    let registry = FramerRegistry::with_builtins();
    let router = Router::create(config, &mut binder, &registry, false).unwrap();
    (router, binder)
}

/// Replay the firmware port's rules against a message and collect which
/// destinations accept and which reject, in rule order.
fn replay(config: &RouterConfig, data: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for rule in &config.ports[0].forwarding_rules {
        match matching_filter(rule, data).map(|f| f.action) {
            Some(FilterAction::Accept) => accepted.push(rule.dst_port_name.clone()),
            Some(FilterAction::Reject) => rejected.push(rule.dst_port_name.clone()),
            None => {}
        }
    }

    (accepted, rejected)
}

#[test]
fn basic_two_port_route() {
    let config = routerd_config::load_str(
        r#"
name: r
ports:
  - name: A
    metric: a
    pub_addr: ipc:///tmp/a.pub
    sub_addr: ipc:///tmp/a.sub
    forwarding_rules:
      - dst_port: B
        filters:
          - action: ACCEPT
            prefix: [0x55, 0xae, 0x00]
  - name: B
    metric: b
    pub_addr: ipc:///tmp/b.pub
    sub_addr: ipc:///tmp/b.sub
    forwarding_rules: []
"#,
    )
    .unwrap();

    let (router, binder) = create_router(&config);

    let payload = [0x55, 0xae, 0x00, 0x10, 0x20, 0x30];
    router.port_cache(0).forward(&payload);

    assert_eq!(binder.publishers[1].sent.borrow().as_slice(), &[payload.to_vec()]);
    assert_eq!(binder.publishers[0].sent_count(), 0);
}

#[test]
fn settings_register_accepts_daemon_and_internal() {
    let config = full_config();
    let (accepted, rejected) = replay(&config, &[0x55, 0xae, 0x00]);

    assert_eq!(
        accepted,
        vec!["SBP_PORT_SETTINGS_DAEMON", "SBP_PORT_INTERNAL"]
    );
    assert_eq!(
        rejected,
        vec![
            "SBP_PORT_SETTINGS_CLIENT",
            "SBP_PORT_EXTERNAL",
            "SBP_PORT_FILEIO_FIRMWARE",
            "SBP_PORT_SKYLARK",
            "SBP_PORT_NAV_DAEMON",
        ]
    );
}

#[test]
fn settings_read_resp_accepts_daemon_external_internal() {
    let config = full_config();
    let (accepted, rejected) = replay(&config, &[0x55, 0xa5, 0x00]);

    assert_eq!(
        accepted,
        vec![
            "SBP_PORT_SETTINGS_DAEMON",
            "SBP_PORT_EXTERNAL",
            "SBP_PORT_INTERNAL",
        ]
    );
    assert_eq!(
        rejected,
        vec![
            "SBP_PORT_SETTINGS_CLIENT",
            "SBP_PORT_FILEIO_FIRMWARE",
            "SBP_PORT_SKYLARK",
            "SBP_PORT_NAV_DAEMON",
        ]
    );
}

#[test]
fn settings_write_resp_accepts_four_ports() {
    let config = full_config();
    let (accepted, rejected) = replay(&config, &[0x55, 0xaf, 0x00]);

    assert_eq!(
        accepted,
        vec![
            "SBP_PORT_SETTINGS_DAEMON",
            "SBP_PORT_SETTINGS_CLIENT",
            "SBP_PORT_EXTERNAL",
            "SBP_PORT_INTERNAL",
        ]
    );
    assert_eq!(
        rejected,
        vec![
            "SBP_PORT_FILEIO_FIRMWARE",
            "SBP_PORT_SKYLARK",
            "SBP_PORT_NAV_DAEMON",
        ]
    );
}

#[test]
fn dispatch_matches_the_replayed_rules() {
    let config = full_config();
    let (router, binder) = create_router(&config);
    let cache = router.port_cache(0);

    assert_eq!(cache.prefixes.count(), 6);

    cache.forward(&[0x55, 0xaf, 0x00]);

    let delivered: Vec<&str> = config
        .ports
        .iter()
        .enumerate()
        .filter(|(i, _)| binder.publishers[*i].sent_count() > 0)
        .map(|(_, p)| p.name.as_str())
        .collect();

    assert_eq!(
        delivered,
        vec![
            "SBP_PORT_SETTINGS_DAEMON",
            "SBP_PORT_SETTINGS_CLIENT",
            "SBP_PORT_EXTERNAL",
            "SBP_PORT_INTERNAL",
        ]
    );

    // exactly once each, payload unchanged
    for name in &delivered {
        let id = config.port_id(name).unwrap();
        assert_eq!(
            binder.publishers[id.index()].sent.borrow().as_slice(),
            &[vec![0x55, 0xaf, 0x00]]
        );
    }
}

#[test]
fn short_and_foreign_messages_fall_to_default_accept() {
    let config = full_config();
    let (router, binder) = create_router(&config);
    let cache = router.port_cache(0);

    // shorter than the prefix width
    cache.forward(&[0x55]);
    // exactly the prefix width but not in the table
    cache.forward(&[0x55, 0x77, 0x00]);

    for (i, port) in config.ports.iter().enumerate() {
        let expected = match port.name.as_str() {
            // EXTERNAL and INTERNAL end on default accept
            "SBP_PORT_EXTERNAL" | "SBP_PORT_INTERNAL" => 2,
            _ => 0,
        };
        assert_eq!(
            binder.publishers[i].sent_count(),
            expected,
            "port {}",
            port.name
        );
    }
}

#[test]
fn config_loads_from_disk_and_reprints_identically() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();

    let config = routerd_config::load(file.path()).unwrap();
    assert_eq!(config.ports.len(), 8);

    let reloaded = routerd_config::load_str(&routerd_config::print::render(&config)).unwrap();
    assert_eq!(config, reloaded);
}

#[test]
fn broken_configs_bind_nothing() {
    // unknown destination fails at load time
    assert!(routerd_config::load_str(
        r#"
name: r
ports:
  - name: A
    metric: a
    pub_addr: ipc:///tmp/a.pub
    sub_addr: ipc:///tmp/a.sub
    forwarding_rules:
      - dst_port: MISSING
        filters:
          - action: ACCEPT
            prefix: []
"#,
    )
    .is_err());

    // mixed prefix widths fail at router creation, before any bind
    let config = routerd_config::load_str(
        r#"
name: r
ports:
  - name: A
    metric: a
    pub_addr: ipc:///tmp/a.pub
    sub_addr: ipc:///tmp/a.sub
    forwarding_rules:
      - dst_port: A
        filters:
          - action: ACCEPT
            prefix: [0x55, 0x01]
          - action: ACCEPT
            prefix: [0x55, 0x01, 0x00]
"#,
    )
    .unwrap();

    let mut binder = RecordingBinder::default();
    let registry = FramerRegistry::with_builtins();
    assert!(Router::create(&config, &mut binder, &registry, false).is_err());
    assert!(binder.publishers.is_empty());
}
