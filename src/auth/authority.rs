use std::sync::RwLock;

/// In-memory mirror of the current access token.
///
/// Reads never touch durable storage, so the request path can call
/// [`TokenAuthority::current`] synchronously.
#[derive(Debug, Default)]
pub struct TokenAuthority {
    token: RwLock<Option<String>>,
}

impl TokenAuthority {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    pub fn current(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_none()
    }
}
