//! Conformance test launcher over a serial console.
//!
//! # Usage
//!
//! ```bash
//! ttyconform --serial /dev/ttyUSB0 --password secret
//! ttyconform --serial /dev/ttyUSB0 --suite lee --no-reports
//! GLEE_TESTS="ntp mqtt" ttyconform --serial /dev/ttyUSB0 --suite lee
//! ```
//!
//! The exit status is the remote runner's own, or -1 when the driver
//! itself failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, warn};
use tokio::sync::mpsc;

use ttyconform::orchestrator::OutputSink;
use ttyconform::{
    Orchestrator, RunOptions, RunReport, SerialConfig, SerialTransport, SessionBuilder,
    SuiteProfile, TarArchiver, ZmodemTool,
};

/// Reported for every failure of the driver itself.
const DRIVER_FAILURE: i32 = -1;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Suite {
    /// GEISA API conformance tests
    Api,
    /// GEISA Linux execution environment tests
    Lee,
}

#[derive(Parser, Debug)]
#[command(name = "ttyconform")]
#[command(about = "Run GEISA conformance tests on a board over its serial console")]
struct Args {
    /// Serial port of the board to run tests on
    #[arg(long)]
    serial: String,

    /// Baud rate of the serial port
    #[arg(long, default_value_t = 115200)]
    baudrate: u32,

    /// Username for the console login
    #[arg(long, default_value = "root")]
    user: String,

    /// Password for the console login
    #[arg(long, env = "TTYCONFORM_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Only run tests and display results, without generating reports
    #[arg(long)]
    no_reports: bool,

    /// Built-in suite to run
    #[arg(long, value_enum, default_value_t = Suite::Api)]
    suite: Suite,

    /// Suite profile file, overriding --suite
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Directory containing the suite sources
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Upper bound for the test run, in seconds
    #[arg(long, default_value_t = 4 * 60 * 60)]
    test_timeout: u64,

    /// Upper bound for each file transfer, in seconds
    #[arg(long, default_value_t = 600)]
    transfer_timeout: u64,

    /// Host ZMODEM send program
    #[arg(long, default_value = "sz")]
    sz: PathBuf,

    /// Host ZMODEM receive program
    #[arg(long, default_value = "rz")]
    rz: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // runner output is printed as it arrives in plain-output mode
    let (sink, printer) = if args.no_reports {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                println!("{}", line);
            }
        });
        (Some(tx), Some(printer))
    } else {
        (None, None)
    };

    let code = tokio::select! {
        result = run(&args, sink) => match result {
            Ok(report) => {
                if let Some(path) = &report.report {
                    println!("Report saved to {}", path.display());
                }
                report.exit_code
            }
            Err(e) => {
                error!("{}", e);
                DRIVER_FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            error!("Interrupted");
            DRIVER_FAILURE
        }
    };

    // The run future, and with it the port lock and the sink, is gone by now.
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    ExitCode::from(code as u8)
}

async fn run(args: &Args, sink: Option<OutputSink>) -> Result<RunReport, ttyconform::Error> {
    let profile = match &args.profile {
        Some(path) => SuiteProfile::from_toml_file(path)?,
        None => match args.suite {
            Suite::Api => SuiteProfile::api(),
            Suite::Lee => SuiteProfile::lee(),
        },
    };

    let options = RunOptions::new(&args.root)
        .reports(!args.no_reports)
        .test_timeout(Duration::from_secs(args.test_timeout))
        .transfer_timeout(Duration::from_secs(args.transfer_timeout))
        .forward_host_env(&profile.forward_env);

    let transport = SerialTransport::open(SerialConfig::new(&args.serial, args.baudrate))?;
    let mut session = SessionBuilder::new()
        .username(&args.user)
        .password(args.password.as_str())
        .build(transport)?;

    let mut orchestrator = Orchestrator::new(
        profile,
        TarArchiver::new(),
        ZmodemTool::with_programs(&args.sz, &args.rz),
        options,
    );
    if let Some(sink) = sink {
        orchestrator = orchestrator.with_output(sink);
    }
    let report = orchestrator.run(&mut session).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close {}: {}", args.serial, e);
    }
    report
}
