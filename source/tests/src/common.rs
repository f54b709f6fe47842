use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use tokio::sync::mpsc;

use routerd::endpoint::{BindError, Binder, BoundPort, Publisher, Subscriber};
use routerd_config::Port;

pub struct RecordingPublisher {
    identity: String,
    pub sent: RefCell<Vec<Vec<u8>>>,
}

impl RecordingPublisher {
    pub fn new(identity: String) -> Rc<Self> {
        Rc::new(Self {
            identity,
            sent: RefCell::new(Vec::new()),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Publisher for RecordingPublisher {
    fn send(&self, data: &[u8]) {
        self.sent.borrow_mut().push(data.to_vec());
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}

/// Binds recording publishers and channel-backed subscribers, keeping hold
/// of both so tests can inject traffic and inspect deliveries.
#[derive(Default)]
pub struct RecordingBinder {
    pub publishers: Vec<Rc<RecordingPublisher>>,
    pub senders: Vec<mpsc::Sender<Bytes>>,
}

impl Binder for RecordingBinder {
    fn bind(&mut self, port: &Port) -> Result<BoundPort, BindError> {
        let publisher = RecordingPublisher::new(format!("router/{}/pub_server", port.metric));
        let (tx, subscriber) = Subscriber::channel(16);

        self.publishers.push(publisher.clone());
        self.senders.push(tx);

        Ok(BoundPort {
            publisher,
            subscriber,
        })
    }
}

/// The firmware port's rule set from the production SBP router config,
/// trimmed to the ports that matter for settings traffic.
///
/// Port order: FIRMWARE, SETTINGS_DAEMON, SETTINGS_CLIENT, EXTERNAL,
/// FILEIO_FIRMWARE, SKYLARK, NAV_DAEMON, INTERNAL.
pub const FULL_CONFIG: &str = r#"
name: sbp_router
ports:
  - name: SBP_PORT_FIRMWARE
    metric: sbp/firmware
    pub_addr: ipc:///var/run/sockets/firmware.pub
    sub_addr: ipc:///var/run/sockets/firmware.sub
    forwarding_rules:
      - dst_port: SBP_PORT_SETTINGS_DAEMON
        filters:
          - action: ACCEPT
            prefix: [0x55, 0xae, 0x00]
          - action: ACCEPT
            prefix: [0x55, 0xa5, 0x00]
          - action: ACCEPT
            prefix: [0x55, 0xaf, 0x00]
          - action: REJECT
            prefix: []
      - dst_port: SBP_PORT_SETTINGS_CLIENT
        filters:
          - action: ACCEPT
            prefix: [0x55, 0xaf, 0x00]
          - action: REJECT
            prefix: []
      - dst_port: SBP_PORT_EXTERNAL
        filters:
          - action: REJECT
            prefix: [0x55, 0xae, 0x00]
          - action: ACCEPT
            prefix: []
      - dst_port: SBP_PORT_FILEIO_FIRMWARE
        filters:
          - action: ACCEPT
            prefix: [0x55, 0xac, 0x00]
          - action: REJECT
            prefix: []
      - dst_port: SBP_PORT_SKYLARK
        filters:
          - action: ACCEPT
            prefix: [0x55, 0x02, 0x01]
          - action: REJECT
            prefix: []
      - dst_port: SBP_PORT_NAV_DAEMON
        filters:
          - action: ACCEPT
            prefix: [0x55, 0x01, 0x02]
          - action: REJECT
            prefix: []
      - dst_port: SBP_PORT_INTERNAL
        filters:
          - action: ACCEPT
            prefix: []
  - name: SBP_PORT_SETTINGS_DAEMON
    metric: sbp/settings_daemon
    pub_addr: ipc:///var/run/sockets/settings_daemon.pub
    sub_addr: ipc:///var/run/sockets/settings_daemon.sub
    forwarding_rules: []
  - name: SBP_PORT_SETTINGS_CLIENT
    metric: sbp/settings_client
    pub_addr: ipc:///var/run/sockets/settings_client.pub
    sub_addr: ipc:///var/run/sockets/settings_client.sub
    forwarding_rules: []
  - name: SBP_PORT_EXTERNAL
    metric: sbp/external
    pub_addr: ipc:///var/run/sockets/external.pub
    sub_addr: ipc:///var/run/sockets/external.sub
    forwarding_rules: []
  - name: SBP_PORT_FILEIO_FIRMWARE
    metric: sbp/fileio_firmware
    pub_addr: ipc:///var/run/sockets/fileio_firmware.pub
    sub_addr: ipc:///var/run/sockets/fileio_firmware.sub
    forwarding_rules: []
  - name: SBP_PORT_SKYLARK
    metric: sbp/skylark
    pub_addr: ipc:///var/run/sockets/skylark.pub
    sub_addr: ipc:///var/run/sockets/skylark.sub
    forwarding_rules: []
  - name: SBP_PORT_NAV_DAEMON
    metric: sbp/nav_daemon
    pub_addr: ipc:///var/run/sockets/nav_daemon.pub
    sub_addr: ipc:///var/run/sockets/nav_daemon.sub
    forwarding_rules: []
  - name: SBP_PORT_INTERNAL
    metric: sbp/internal
    pub_addr: ipc:///var/run/sockets/internal.pub
    sub_addr: ipc:///var/run/sockets/internal.sub
    forwarding_rules: []
"#;
