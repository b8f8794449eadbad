//! # ttyconform
//!
//! Drive a conformance test suite on an embedded Linux target through
//! nothing but its serial console.
//!
//! The target is reached over a raw, unframed byte stream. Everything the
//! driver knows about the remote side comes from matching prompts and
//! markers in that stream, and files move through ZMODEM tools that borrow
//! the same link for the duration of a transfer.
//!
//! ## Layers
//!
//! - [`transport`]: exclusive, non-blocking access to the serial device
//! - [`channel`]: deadline-bounded pattern matching over the raw bytes
//! - [`driver`]: login detection and command execution
//! - [`transfer`]: handing the link to an external transfer tool
//! - [`archive`]: packing local test directories
//! - [`orchestrator`]: the end-to-end conformance run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ttyconform::{
//!     Orchestrator, RunOptions, SerialConfig, SerialTransport, SessionBuilder, SuiteProfile,
//!     TarArchiver, ZmodemTool,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ttyconform::Error> {
//!     let transport = SerialTransport::open(SerialConfig::new("/dev/ttyUSB0", 115200))?;
//!     let mut session = SessionBuilder::new().username("root").build(transport)?;
//!
//!     let orchestrator = Orchestrator::new(
//!         SuiteProfile::api(),
//!         TarArchiver::new(),
//!         ZmodemTool::new(),
//!         RunOptions::new(".").reports(false),
//!     );
//!     let report = orchestrator.run(&mut session).await?;
//!     for line in &report.displayed {
//!         println!("{}", line);
//!     }
//!     std::process::exit(report.exit_code);
//! }
//! ```

pub mod archive;
pub mod channel;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod transfer;
pub mod transport;

// Re-export main types for convenience
pub use archive::{Archiver, TarArchiver};
pub use driver::{CommandOutput, Credentials, Session, SessionBuilder, SessionState};
pub use error::Error;
pub use orchestrator::{Orchestrator, OutputSink, RunOptions, RunReport, SuiteProfile};
pub use transfer::{BulkTransfer, ZmodemTool};
pub use transport::{SerialConfig, SerialTransport, Transport};
