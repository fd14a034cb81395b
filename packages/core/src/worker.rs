//! Worker identity used for registry bookkeeping.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{CoreError, QueueSet};

/// Identifier of one cooperative worker.
///
/// Rendered as `hostname:pid:queues:task`. Several workers share a process,
/// so the trailing task component keeps them apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId {
    hostname: String,
    pid: u32,
    queues: String,
    task: String,
}

impl WorkerId {
    /// Create an id for a worker of the current process.
    pub fn new(queues: &QueueSet) -> Self {
        Self {
            hostname: local_hostname(),
            pid: std::process::id(),
            queues: queues.to_string(),
            task: Ulid::new().to_string(),
        }
    }

    /// Parse an id previously rendered with `Display`.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let mut parts = s.splitn(4, ':');
        let (Some(hostname), Some(pid), Some(queues)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::InvalidWorkerId(s.to_string()));
        };
        let pid = pid
            .parse()
            .map_err(|_| CoreError::InvalidWorkerId(s.to_string()))?;

        Ok(Self {
            hostname: hostname.to_string(),
            pid,
            queues: queues.to_string(),
            task: parts.next().unwrap_or_default().to_string(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Comma separated queue names this worker polls.
    pub fn queues(&self) -> &str {
        &self.queues
    }

    /// Whether the worker belongs to this host.
    ///
    /// Always false when the host name cannot be read from the system, so a
    /// fallback name never matches workers of other hosts.
    pub fn is_local(&self) -> bool {
        system_hostname() == Some(self.hostname.as_str())
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.hostname, self.pid, self.queues)?;
        if !self.task.is_empty() {
            write!(f, ":{}", self.task)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for WorkerId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.to_string()
    }
}

/// Name used in ids of workers of this process.
///
/// Falls back to `localhost` when the system name is unavailable.
pub fn local_hostname() -> String {
    system_hostname().unwrap_or("localhost").to_string()
}

/// Host name reported by the operating system, read once.
pub fn system_hostname() -> Option<&'static str> {
    static HOSTNAME: OnceLock<Option<String>> = OnceLock::new();
    HOSTNAME.get_or_init(read_hostname).as_deref()
}

#[cfg(unix)]
fn read_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the pointer and length describe `buf`, which outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }

    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = std::str::from_utf8(&buf[..len]).ok()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(not(unix))]
fn read_hostname() -> Option<String> {
    None
}
