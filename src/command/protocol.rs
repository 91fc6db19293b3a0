// src/command/protocol.rs

//! Line protocol spoken to a subprocess over its stdin.
//!
//! Per rebuild the subprocess sees exactly two lines:
//!
//! ```text
//! IBAZEL_BUILD_STARTED
//! IBAZEL_BUILD_COMPLETED SUCCESS   (or FAILURE)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    BuildStarted,
    BuildSucceeded,
    BuildFailed,
}

impl ProtocolMessage {
    /// Completion message matching a build outcome.
    pub fn completed(success: bool) -> Self {
        if success {
            ProtocolMessage::BuildSucceeded
        } else {
            ProtocolMessage::BuildFailed
        }
    }

    /// Bytes written to stdin, newline included.
    pub fn as_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProtocolMessage::BuildStarted => "IBAZEL_BUILD_STARTED",
            ProtocolMessage::BuildSucceeded => "IBAZEL_BUILD_COMPLETED SUCCESS",
            ProtocolMessage::BuildFailed => "IBAZEL_BUILD_COMPLETED FAILURE",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_exact() {
        assert_eq!(ProtocolMessage::BuildStarted.as_line(), "IBAZEL_BUILD_STARTED\n");
        assert_eq!(
            ProtocolMessage::completed(true).as_line(),
            "IBAZEL_BUILD_COMPLETED SUCCESS\n"
        );
        assert_eq!(
            ProtocolMessage::completed(false).as_line(),
            "IBAZEL_BUILD_COMPLETED FAILURE\n"
        );
    }
}
