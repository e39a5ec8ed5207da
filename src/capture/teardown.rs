//! Spawned readers to stop when capture ends

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Child;

/// Handles of everything the capture run started
#[derive(Debug, Default)]
pub struct Teardown {
    children: Vec<Child>,
    stop_flags: Vec<Arc<AtomicBool>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_child(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Flag a reader thread polls; cleared on shutdown
    pub fn push_stop_flag(&mut self, running: Arc<AtomicBool>) {
        self.stop_flags.push(running);
    }

    pub fn len(&self) -> usize {
        self.children.len() + self.stop_flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kill and reap every child, and signal every reader thread to stop
    pub async fn shutdown(&mut self) {
        for flag in self.stop_flags.drain(..) {
            flag.store(false, Ordering::SeqCst);
        }

        for mut child in self.children.drain(..) {
            let pid = child.id();
            if let Err(e) = child.start_kill() {
                debug!("Reader {:?} already gone: {}", pid, e);
            }
            match child.wait().await {
                Ok(status) => debug!("Reader {:?} exited with {}", pid, status),
                Err(e) => debug!("Failed to reap reader {:?}: {}", pid, e),
            }
        }
    }
}
