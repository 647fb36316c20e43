//! Newline-delimited JSON transport to a backend child process.
//!
//! Each request is one line `{"id", "command", "args"}` on the child's stdin
//! and is answered by exactly one line `{"id", "result"}` or `{"id", "error"}`
//! on its stdout. Requests are serialized; there is never more than one in
//! flight. Replies carrying an older id are discarded.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::command::{CommandInvoker, InvokeError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn backend process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("backend process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed response line {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("request ID mismatch: sent {sent}, got {received}")]
    IdMismatch { sent: u64, received: u64 },
    #[error("backend process closed its output")]
    Closed,
}

impl From<ProcessError> for InvokeError {
    fn from(error: ProcessError) -> Self {
        InvokeError::Transport(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    command: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
struct ProcessIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

#[derive(Debug)]
pub struct ProcessInvoker {
    io: Mutex<ProcessIo>,
}

impl ProcessInvoker {
    /// Starts `program` with piped stdio. The child is killed when the
    /// invoker is dropped.
    pub fn spawn<S, I, A>(program: S, args: I) -> Result<Self, ProcessError>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessError::Spawn)?;

        let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;

        Ok(Self {
            io: Mutex::new(ProcessIo {
                child,
                stdin,
                stdout: BufReader::new(stdout),
                next_id: 0,
            }),
        })
    }

    /// Closes the child's stdin and waits for it to exit.
    pub async fn shutdown(self) -> Result<ExitStatus, ProcessError> {
        let ProcessIo {
            mut child, stdin, ..
        } = self.io.into_inner();
        drop(stdin);
        Ok(child.wait().await?)
    }

    async fn exchange(&self, command: &str, args: Value) -> Result<Response, ProcessError> {
        let mut io = self.io.lock().await;
        io.next_id += 1;
        let id = io.next_id;

        let mut line = serde_json::to_string(&Request { id, command, args })
            .map_err(ProcessError::Encode)?;
        line.push('\n');
        debug!("-> #{id} {command}");
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        // Lines answering earlier requests (e.g. one whose caller gave up)
        // are skipped until this request's reply arrives.
        let response = loop {
            let mut reply = String::new();
            if io.stdout.read_line(&mut reply).await? == 0 {
                return Err(ProcessError::Closed);
            }
            let response: Response = serde_json::from_str(reply.trim_end()).map_err(|source| {
                ProcessError::Malformed {
                    line: reply.trim_end().to_string(),
                    source,
                }
            })?;

            match response.id.cmp(&id) {
                Ordering::Less => debug!("<- #{} (stale, skipped)", response.id),
                Ordering::Equal => break response,
                Ordering::Greater => {
                    return Err(ProcessError::IdMismatch {
                        sent: id,
                        received: response.id,
                    })
                }
            }
        };
        debug!("<- #{id}");
        Ok(response)
    }
}

#[async_trait]
impl CommandInvoker for ProcessInvoker {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        let response = self.exchange(command, args).await.map_err(|error| {
            warn!("{command} transport failure: {error}");
            InvokeError::from(error)
        })?;

        match response.error {
            Some(message) => Err(InvokeError::Command(message)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }
}
