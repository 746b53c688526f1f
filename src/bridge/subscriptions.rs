// Single-slot event subscriptions

use crate::jobs::JobEventSink;
use crate::models::{CompletionEvent, LogEvent, ProgressEvent};
use parking_lot::Mutex;
use std::sync::Arc;

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Holds at most one handler. Subscribing replaces the previous handler.
struct Slot<T> {
    handler: Mutex<Option<Handler<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }
}

impl<T> Slot<T> {
    /// Returns true when an existing handler was replaced
    fn replace(&self, handler: Handler<T>) -> bool {
        self.handler.lock().replace(handler).is_some()
    }

    fn clear(&self) -> bool {
        self.handler.lock().take().is_some()
    }

    fn deliver(&self, value: T) {
        // Clone out so the handler runs unlocked and may resubscribe
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(value);
        }
    }
}

#[derive(Default)]
pub struct Subscriptions {
    progress: Slot<ProgressEvent>,
    completion: Slot<CompletionEvent>,
    logs: Slot<LogEvent>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_progress(&self, handler: impl Fn(ProgressEvent) + Send + Sync + 'static) -> bool {
        self.progress.replace(Arc::new(handler))
    }

    pub fn subscribe_completion(
        &self,
        handler: impl Fn(CompletionEvent) + Send + Sync + 'static,
    ) -> bool {
        self.completion.replace(Arc::new(handler))
    }

    pub fn subscribe_logs(&self, handler: impl Fn(LogEvent) + Send + Sync + 'static) -> bool {
        self.logs.replace(Arc::new(handler))
    }

    pub fn unsubscribe_progress(&self) -> bool {
        self.progress.clear()
    }

    pub fn unsubscribe_completion(&self) -> bool {
        self.completion.clear()
    }

    pub fn unsubscribe_logs(&self) -> bool {
        self.logs.clear()
    }
}

impl JobEventSink for Subscriptions {
    fn on_progress(&self, event: ProgressEvent) {
        self.progress.deliver(event);
    }

    fn on_completion(&self, event: CompletionEvent) {
        self.completion.deliver(event);
    }

    fn on_log(&self, event: LogEvent) {
        self.logs.deliver(event);
    }
}
