//! Shutdown requests, decoupled from whatever triggers them.
//!
//! OS signals, tests and supervisors all go through [`ShutdownHandle::request`];
//! the emitter only ever sees the receiving [`ShutdownSignal`].

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Returns `true` only for the first request.
    pub fn request(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown has been requested. If every handle is dropped
    /// without a request, never resolves.
    pub async fn requested(&mut self) {
        let closed = self.rx.wait_for(|requested| *requested).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Forwards SIGINT and SIGTERM to `handle` until the process exits.
#[cfg(unix)]
pub async fn listen_for_termination(handle: ShutdownHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut interrupt, mut terminate) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

    loop {
        let name = tokio::select! {
            received = interrupt.recv() => match received {
                Some(()) => "SIGINT",
                None => return,
            },
            received = terminate.recv() => match received {
                Some(()) => "SIGTERM",
                None => return,
            },
        };
        forward(&handle, name);
    }
}

#[cfg(not(unix))]
pub async fn listen_for_termination(handle: ShutdownHandle) {
    loop {
        match tokio::signal::ctrl_c().await {
            Ok(()) => forward(&handle, "Ctrl-C"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C signal: {}", e);
                return;
            }
        }
    }
}

fn forward(handle: &ShutdownHandle, name: &str) {
    if handle.request() {
        tracing::info!("🛑 Received {}, initiating graceful shutdown", name);
    } else {
        tracing::debug!("Received {} while already shutting down, ignoring", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_is_idempotent() {
        let (handle, signal) = channel();
        assert!(!signal.is_requested());
        assert!(handle.request());
        assert!(!handle.request());
        assert!(signal.is_requested());
        assert!(handle.clone().is_requested());
    }

    #[tokio::test]
    async fn test_signal_resolves_after_request() {
        let (handle, mut signal) = channel();
        let waiter = tokio::spawn(async move { signal.requested().await });
        handle.request();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal should resolve")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_resolves() {
        let (handle, mut signal) = channel();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_secs(60), signal.requested()).await;
        assert!(waited.is_err());
    }
}
