//! tmux-backed worker destinations.
//!
//! A destination is an opaque addressable sink with exactly two operations:
//! send text, send a confirm keystroke. Here the address is a tmux
//! `session:window` coordinate and both operations map onto `send-keys`; any
//! other delivery mechanism satisfying the two-operation contract can stand
//! in (tests use an in-memory recorder).

use crate::errors::DispatchError;
use std::process::Command;
use tracing::debug;

/// An addressable sink for worker instructions.
pub trait Destination {
    /// The opaque address, for logging and error messages.
    fn target(&self) -> &str;

    /// Deliver literal text to the sink.
    fn send_text(&self, text: &str) -> Result<(), DispatchError>;

    /// Deliver the confirm keystroke that submits previously sent text.
    fn send_confirm(&self) -> Result<(), DispatchError>;
}

/// Check that tmux is installed and on PATH.
pub fn check_tmux() -> Result<(), DispatchError> {
    match which::which("tmux") {
        Ok(path) => {
            debug!("Found tmux at: {:?}", path);
            Ok(())
        }
        Err(_) => Err(DispatchError::TmuxNotFound),
    }
}

/// A `session:window` coordinate in a running tmux server.
#[derive(Debug, Clone)]
pub struct TmuxDestination {
    target: String,
}

impl TmuxDestination {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn send_keys(&self, args: &[&str]) -> Result<(), DispatchError> {
        let output = Command::new("tmux")
            .arg("send-keys")
            .arg("-t")
            .arg(&self.target)
            .args(args)
            .output()
            .map_err(|source| DispatchError::DeliveryFailed {
                target: self.target.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DispatchError::Unreachable {
                target: self.target.clone(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Destination for TmuxDestination {
    fn target(&self) -> &str {
        &self.target
    }

    fn send_text(&self, text: &str) -> Result<(), DispatchError> {
        check_tmux()?;
        // -l sends the text literally instead of interpreting key names.
        self.send_keys(&["-l", text])?;
        debug!(target = self.target.as_str(), bytes = text.len(), "sent instruction text");
        Ok(())
    }

    fn send_confirm(&self) -> Result<(), DispatchError> {
        self.send_keys(&["Enter"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_preserved() {
        let dest = TmuxDestination::new("workflow:backend");
        assert_eq!(dest.target(), "workflow:backend");
    }
}
