/*!
 * Core Types
 * Common types used across the engine
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job ID type, unique per registry
pub type JobId = u64;

/// OS-level process ID type (as used by `kill(2)`)
pub type OsPid = i32;

/// Output stream of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
