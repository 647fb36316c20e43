pub mod command;
pub mod process;

pub use command::{CommandBackend, CommandInvoker, InvokeError};
pub use process::{ProcessError, ProcessInvoker};
