use ip_scanner::{Endpoint, GenericError, Protocol, ScanConfig, Scanner};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(argh::FromArgs)]
/// scan - test which endpoints are reachable
struct Args {
    #[argh(switch)]
    /// send ICMP echo requests instead of TCP connects (needs raw socket privileges)
    icmp: bool,

    #[argh(option, short = 't', default = "10")]
    /// number of worker threads
    threads: usize,

    #[argh(option, default = "20000")]
    /// per-endpoint timeout in milliseconds
    timeout_ms: u64,

    #[argh(switch, short = 'v')]
    /// log debug output
    verbose: bool,

    #[argh(positional)]
    /// endpoints as ip:port, e.g. 127.0.0.1:22 or [::1]:80
    endpoints: Vec<String>,
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let endpoints = args.endpoints.iter().map(|arg| arg.parse::<Endpoint>()).collect::<Result<Vec<_>, _>>()?;
    let config = ScanConfig {
        endpoints,
        thread_count: args.threads,
        timeout: Duration::from_millis(args.timeout_ms),
        protocol: if args.icmp { Protocol::Icmp } else { Protocol::Tcp },
        ..ScanConfig::default()
    };

    let mut scanner = Scanner::new(config);
    scanner.set_on_probe(|endpoint, status| println!("{endpoint} {status}"));
    scanner.set_on_finished(|results| {
        println!(
            "--- {} tested, {} reachable, {} unreachable, {} errors",
            results.total_tested,
            results.valid(),
            results.bad,
            results.error
        );
    });

    scanner.start()?;
    if scanner.wait().is_err() {
        eprintln!("scan aborted");
    }
    Ok(())
}
