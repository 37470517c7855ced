#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use endpoint::Endpoint;
pub use icmp::v4::Ttl;
pub use probe::{ProbeFactory, ProbeStatus, ProbeStrategy, SystemProbeFactory, TcpConnectProbe};
pub use results::{FinishObserver, ProbeObserver, Progress, TestResults};
pub use scan_config::{IcmpConfig, ProbeConfig, Protocol, ScanConfig};
pub use scan_error::{GenericError, ScanError, ScanErrorKind, ScanResult};
pub use scanner::{partition, ScanState, Scanner};

mod endpoint;
mod icmp;
mod probe;
mod results;
mod scan_config;
mod scan_error;
mod scanner;
