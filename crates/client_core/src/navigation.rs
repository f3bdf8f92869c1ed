use std::sync::{Mutex, MutexGuard};

/// Route history the orchestrator drives.
pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);
    fn replace(&self, path: &str);
    fn current(&self) -> String;
    /// Steps back one entry; returns the new current route, if any.
    fn back(&self) -> Option<String>;
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

/// In-process history with browser semantics: pushing drops forward entries.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<History>,
}

impl MemoryNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![initial.into()],
                index: 0,
            }),
        }
    }

    pub fn forward(&self) -> Option<String> {
        let mut history = self.lock();
        if history.index + 1 >= history.entries.len() {
            return None;
        }
        history.index += 1;
        Some(history.entries[history.index].clone())
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn push(&self, path: &str) {
        let mut history = self.lock();
        if history.entries[history.index] == path {
            return;
        }
        let keep = history.index + 1;
        history.entries.truncate(keep);
        history.entries.push(path.to_string());
        history.index = keep;
    }

    fn replace(&self, path: &str) {
        let mut history = self.lock();
        let index = history.index;
        history.entries[index] = path.to_string();
    }

    fn current(&self) -> String {
        let history = self.lock();
        history.entries[history.index].clone()
    }

    fn back(&self) -> Option<String> {
        let mut history = self.lock();
        if history.index == 0 {
            return None;
        }
        history.index -= 1;
        Some(history.entries[history.index].clone())
    }
}
