use ip_scanner::{Endpoint, Protocol, ScanConfig, ScanErrorKind, Scanner};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/*
* Note: Raw sockets work only with root privileges.
*/
#[test]
#[ignore = "needs raw socket privileges"]
fn test_icmp_scan_of_localhost_with_raw_socket() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ScanConfig {
        endpoints: vec![Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)],
        thread_count: 1,
        timeout: Duration::from_secs(1),
        protocol: Protocol::Icmp,
        ..ScanConfig::default()
    };
    let mut scanner = Scanner::new(config);
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    scanner.set_on_finished(move |results| {
        let _ = tx.lock().unwrap().send(results.clone());
    });

    match scanner.start() {
        Ok(()) => {
            let results = rx.recv_timeout(Duration::from_secs(20)).unwrap();
            assert_eq!(1, results.total_tested);
            assert_eq!(1, results.valid());
        }
        Err(e) => {
            assert_eq!(ScanErrorKind::ProbeUnavailable, e.kind);
            assert!(!scanner.is_running());
        }
    }
}
