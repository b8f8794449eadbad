//! Console session driver.
//!
//! The driver layer detects where the target's console is in the login
//! sequence, logs in when needed, and runs shell commands once a prompt
//! has been seen.

mod builder;
mod prompts;
pub(crate) mod response;
mod session;
mod state;

pub use builder::SessionBuilder;
pub use prompts::{LOGIN, LOGIN_INCORRECT, PASSWORD, READY, ShellPrompts};
pub use response::CommandOutput;
pub use session::{Session, line_marker};
pub use state::{Credentials, SessionState};
