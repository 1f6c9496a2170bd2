use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

/// Receives human-readable status messages while a render is in progress.
pub trait ProgressListener: Send + Sync {
    fn progress_message_changed(&self, message: &str);
}

impl<F> ProgressListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn progress_message_changed(&self, message: &str) {
        self(message)
    }
}


/// Writes every progress message to the log.
pub struct LoggingProgressListener;

impl ProgressListener for LoggingProgressListener {
    fn progress_message_changed(&self, message: &str) {
        info!(progress = message, "Render progress changed.");
    }
}


/// Registry of progress listeners, safe to share between tasks.
///
/// Listeners are called synchronously on the notifying task, in registration order.
#[derive(Default)]
pub struct ProgressNotifier {
    listeners: Mutex<Vec<Arc<dyn ProgressListener>>>,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Removes the first registration of `listener`. Removing an unknown listener does nothing.
    pub fn remove_listener(&self, listener: &Arc<dyn ProgressListener>) {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(position) = listeners
            .iter()
            .position(|registered| same_listener(registered, listener))
        {
            listeners.remove(position);
        }
    }

    pub fn notify(&self, message: &str) {
        // Listeners run outside the lock, so they may (un)register listeners themselves.
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            listener.progress_message_changed(message);
        }
    }
}

fn same_listener(a: &Arc<dyn ProgressListener>, b: &Arc<dyn ProgressListener>) -> bool {
    // Compares data pointers only; vtable pointers of the same type may differ.
    std::ptr::eq(
        Arc::as_ptr(a) as *const u8,
        Arc::as_ptr(b) as *const u8,
    )
}
