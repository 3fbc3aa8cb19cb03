// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed display-surface destinations and the window creator.
//!
//! The window creator receives backtick creation directives, materializes a
//! typed window destination named `{type}:{name}`, registers it, and owns
//! it from then on. Typed windows keep a bounded backlog of delivered
//! messages so an external renderer can snapshot them; rendering itself is
//! not this crate's concern.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::{Message, Metadata, WindowType};
use crate::pool::PooledMessage;

use super::{DestKind, DestQueue, Destination, DEFAULT_FLUSH_WATERMARK, DEFAULT_QUEUE_CAPACITY};

pub const WINDOW_CREATOR_ID: &str = "window-creator";

/// Messages a typed window retains for snapshots.
pub const DEFAULT_WINDOW_BACKLOG: usize = 512;

/// One auxiliary display surface (logic / scope / term / plot / per-cog
/// debugger). Non-immediate: content accumulates and flushes on the
/// watermark or the router tick.
pub struct TypedWindowDest {
    id: String,
    window_type: WindowType,
    name: String,
    queue: DestQueue,
    backlog: Mutex<VecDeque<Message>>,
    backlog_cap: usize,
}

impl TypedWindowDest {
    pub fn new(window_type: WindowType, name: &str, watermark: usize, backlog_cap: usize) -> Self {
        Self {
            id: Self::window_id(window_type, name),
            window_type,
            name: name.to_owned(),
            queue: DestQueue::new(DEFAULT_QUEUE_CAPACITY, watermark),
            backlog: Mutex::new(VecDeque::new()),
            backlog_cap: backlog_cap.max(1),
        }
    }

    /// Stable id: window type plus lowercased name.
    pub fn window_id(window_type: WindowType, name: &str) -> String {
        format!("{}:{}", window_type.as_str(), name.to_ascii_lowercase())
    }

    /// Id of the debugger surface for a cog.
    pub fn debugger_id(cog_id: u32) -> String {
        Self::window_id(WindowType::Debugger, &format!("cog{cog_id}"))
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the retained messages, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    fn absorb(&self, message: Message) {
        let mut backlog = self.backlog.lock().unwrap_or_else(PoisonError::into_inner);
        if backlog.len() >= self.backlog_cap {
            backlog.pop_front();
        }
        backlog.push_back(message);
    }
}

impl Destination for TypedWindowDest {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DestKind {
        DestKind::TypedWindow
    }

    fn enqueue(&self, record: PooledMessage) {
        if self.queue.push(record) {
            self.flush();
        }
    }

    fn flush(&self) {
        for record in self.queue.drain_now() {
            if let Some(message) = record.message() {
                self.absorb(message);
            }
        }
    }

    fn drain(&self, ack: &mpsc::Sender<String>) {
        self.flush();
        let _ = ack.try_send(self.id.clone());
    }
}

/// Materializes typed windows from creation directives and owns them.
///
/// The registry only ever holds weak handles; this struct is the strong
/// owner, so dropping the creator tears the windows down with it.
pub struct WindowCreatorDest {
    registry: super::DestRegistry,
    windows: Mutex<HashMap<String, Arc<TypedWindowDest>>>,
    watermark: usize,
    backlog_cap: usize,
}

impl WindowCreatorDest {
    pub fn new(registry: super::DestRegistry) -> Self {
        Self {
            registry,
            windows: Mutex::new(HashMap::new()),
            watermark: DEFAULT_FLUSH_WATERMARK,
            backlog_cap: DEFAULT_WINDOW_BACKLOG,
        }
    }

    pub fn with_limits(mut self, watermark: usize, backlog_cap: usize) -> Self {
        self.watermark = watermark;
        self.backlog_cap = backlog_cap;
        self
    }

    /// Create (or fetch) the window for `window_type`/`name` and register it.
    pub fn ensure_window(&self, window_type: WindowType, name: &str) -> Arc<TypedWindowDest> {
        let id = TypedWindowDest::window_id(window_type, name);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = windows.get(&id) {
            return Arc::clone(existing);
        }
        let window =
            Arc::new(TypedWindowDest::new(window_type, name, self.watermark, self.backlog_cap));
        let as_dest: Arc<dyn Destination> = Arc::clone(&window) as Arc<dyn Destination>;
        self.registry.register(&as_dest);
        debug!(id, "window materialized");
        windows.insert(id, Arc::clone(&window));
        window
    }

    /// Open the per-cog debugger surface (driven by the embedder, not by a
    /// wire directive).
    pub fn open_debugger(&self, cog_id: u32) -> Arc<TypedWindowDest> {
        self.ensure_window(WindowType::Debugger, &format!("cog{cog_id}"))
    }

    pub fn window(&self, id: &str) -> Option<Arc<TypedWindowDest>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    pub fn window_count(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop a window; in-flight records addressed to it count as lost.
    pub fn close_window(&self, id: &str) {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    }
}

impl Destination for WindowCreatorDest {
    fn id(&self) -> &str {
        WINDOW_CREATOR_ID
    }

    fn kind(&self) -> DestKind {
        DestKind::WindowCreator
    }

    fn immediate(&self) -> bool {
        true
    }

    fn enqueue(&self, record: PooledMessage) {
        match record.meta() {
            Metadata::Backtick { directive, target: Some(name) } => {
                match WindowType::from_directive(&directive) {
                    Some(window_type) => {
                        let window = self.ensure_window(window_type, &name);
                        // Seed the new surface with its creation directive so
                        // a renderer can recover the window configuration.
                        if let Some(message) = record.message() {
                            window.absorb(message);
                        }
                    }
                    None => warn!(directive, "creation directive with unknown head"),
                }
            }
            other => debug!(?other, "window creator ignoring non-creation record"),
        }
        // Record drops here: the creator counts as one consumer.
    }

    fn flush(&self) {}

    fn drain(&self, ack: &mpsc::Sender<String>) {
        let _ = ack.try_send(WINDOW_CREATOR_ID.to_owned());
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
