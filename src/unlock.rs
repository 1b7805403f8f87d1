//! Token unlock capability
//!
//! Opening a container and submitting its secret are external operations;
//! the core only sees the [`TokenUnlocker`] / [`TokenSession`] traits.
//! [`CommandUnlocker`] drives an external helper program: `<helper> open
//! <container-id>` acquires the container, `<helper> submit <container-id>`
//! receives the secret on stdin.

use crate::error::{UnlockError, UnlockResult};
use std::io::Write;
use std::process::{Command, Stdio};

/// Helper program used when no `-provider` switch is given
pub const DEFAULT_HELPER: &str = "tokpin-helper";

/// An acquired container accepting a secret submission
pub trait TokenSession {
    /// Submit the plaintext secret to the container
    fn set_secret(&mut self, secret: &[u8]) -> UnlockResult<()>;
}

/// Capability for acquiring token containers
pub trait TokenUnlocker {
    type Session: TokenSession;

    /// Acquire a container by id; fails if the provider cannot open it
    fn open(&self, container_id: &str) -> UnlockResult<Self::Session>;
}

/// Unlocker backed by an external helper program
pub struct CommandUnlocker {
    program: String,
}

impl CommandUnlocker {
    pub fn new(program: impl Into<String>) -> Self {
        CommandUnlocker {
            program: program.into(),
        }
    }
}

impl TokenUnlocker for CommandUnlocker {
    type Session = HelperSession;

    fn open(&self, container_id: &str) -> UnlockResult<HelperSession> {
        let status = Command::new(&self.program)
            .arg("open")
            .arg(container_id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| UnlockError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(UnlockError::OpenFailed(container_id.to_string()));
        }

        Ok(HelperSession {
            program: self.program.clone(),
            container_id: container_id.to_string(),
        })
    }
}

/// A container opened through the helper program
pub struct HelperSession {
    program: String,
    container_id: String,
}

impl TokenSession for HelperSession {
    fn set_secret(&mut self, secret: &[u8]) -> UnlockResult<()> {
        let mut child = Command::new(&self.program)
            .arg("submit")
            .arg(&self.container_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| UnlockError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        // a helper that closes stdin early has rejected the secret
        let written = child
            .stdin
            .take()
            .map(|mut stdin| stdin.write_all(secret))
            .unwrap_or(Ok(()));

        let status = child.wait().map_err(|e| UnlockError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        if written.is_err() || !status.success() {
            return Err(UnlockError::SubmitFailed(self.container_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory fakes for exercising unlock flows without a helper binary

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Fake unlocker recording every submitted secret
    #[derive(Default)]
    pub struct FakeUnlocker {
        /// Containers that `open` succeeds for
        pub openable: Vec<String>,
        /// Whether sessions accept submitted secrets
        pub accept_secret: bool,
        /// (container id, secret) pairs seen by sessions
        pub submitted: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
    }

    pub struct FakeSession {
        container_id: String,
        accept: bool,
        submitted: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
    }

    impl TokenUnlocker for FakeUnlocker {
        type Session = FakeSession;

        fn open(&self, container_id: &str) -> UnlockResult<FakeSession> {
            if !self.openable.iter().any(|c| c == container_id) {
                return Err(UnlockError::OpenFailed(container_id.to_string()));
            }
            Ok(FakeSession {
                container_id: container_id.to_string(),
                accept: self.accept_secret,
                submitted: Rc::clone(&self.submitted),
            })
        }
    }

    impl TokenSession for FakeSession {
        fn set_secret(&mut self, secret: &[u8]) -> UnlockResult<()> {
            if !self.accept {
                return Err(UnlockError::SubmitFailed(self.container_id.clone()));
            }
            self.submitted
                .borrow_mut()
                .push((self.container_id.clone(), secret.to_vec()));
            Ok(())
        }
    }
}
