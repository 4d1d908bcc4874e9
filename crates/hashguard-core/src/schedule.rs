use crossbeam_channel::{RecvTimeoutError, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// A background thread calling `tick` at a fixed interval until stopped
/// or dropped.
///
/// The first tick fires after `initial_delay`. Stopping waits for an
/// in-flight tick to return.
pub struct Ticker {
    name: String,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        mut tick: F,
    ) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut wait = initial_delay;
                loop {
                    match rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    wait = interval;
                }
                debug!("{} timer stopped", thread_name);
            })?;

        Ok(Self {
            name: name.to_string(),
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
