//! In-memory stores for development and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use super::{Message, MessageStore, NewMessage, StoreError, User, UserStore};
use crate::security::handshake::HandshakeUser;

/// Messages grouped by client credential.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<DashMap<String, Vec<Message>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-built message, e.g. one with a backdated `created_at`.
    pub fn insert(&self, message: Message) {
        self.inner
            .entry(message.client_id.clone())
            .or_default()
            .push(message);
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("message store offline".to_string()));
        }
        Ok(())
    }
}

impl MessageStore for InMemoryMessageStore {
    fn count_by_client(&self, client_id: &str) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(self
            .inner
            .get(client_id)
            .map(|msgs| msgs.len() as u64)
            .unwrap_or(0))
    }

    fn count_by_client_since(
        &self,
        client_id: &str,
        window: Duration,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let window = chrono::Duration::from_std(window)
            .map_err(|e| StoreError::Query(format!("invalid window: {}", e)))?;
        let since = Utc::now() - window;
        Ok(self
            .inner
            .get(client_id)
            .map(|msgs| msgs.iter().filter(|m| m.created_at > since).count() as u64)
            .unwrap_or(0))
    }

    fn create(&self, new: NewMessage) -> Result<Message, StoreError> {
        self.check_available()?;
        let now = Utc::now();
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: new.client_id,
            client_secret: new.client_secret,
            message: new.message,
            name: new.name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert(message.clone());
        Ok(message)
    }

    fn list_by_client(&self, client_id: &str) -> Result<Vec<Message>, StoreError> {
        self.check_available()?;
        let mut messages = self
            .inner
            .get(client_id)
            .map(|msgs| msgs.clone())
            .unwrap_or_default();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }
}

/// Users keyed by chat platform id.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<DashMap<i64, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn upsert(&self, profile: HandshakeUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let mut entry = self.inner.entry(profile.id).or_insert_with(|| User {
            id: profile.id,
            first_name: String::new(),
            last_name: String::new(),
            username: String::new(),
            language_code: String::new(),
            is_premium: false,
            created_at: now,
            updated_at: now,
        });
        let user = entry.value_mut();
        user.first_name = profile.first_name;
        user.last_name = profile.last_name;
        user.username = profile.username;
        user.language_code = profile.language_code;
        user.is_premium = profile.is_premium;
        user.updated_at = now;
        Ok(user.clone())
    }

    fn get(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.get(&id).map(|u| u.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(client_id: &str) -> NewMessage {
        NewMessage {
            client_id: client_id.to_string(),
            client_secret: "s".to_string(),
            message: "hello".to_string(),
            name: "n".to_string(),
        }
    }

    #[test]
    fn test_counts_per_client() {
        let store = InMemoryMessageStore::new();
        store.create(new_message("a")).unwrap();
        store.create(new_message("a")).unwrap();
        store.create(new_message("b")).unwrap();

        assert_eq!(store.count_by_client("a").unwrap(), 2);
        assert_eq!(store.count_by_client("b").unwrap(), 1);
        assert_eq!(store.count_by_client("c").unwrap(), 0);
    }

    #[test]
    fn test_window_excludes_old_messages() {
        let store = InMemoryMessageStore::new();
        let mut old = store.create(new_message("a")).unwrap();
        old.id = "old".to_string();
        old.created_at = Utc::now() - chrono::Duration::seconds(120);
        store.insert(old);

        assert_eq!(store.count_by_client("a").unwrap(), 2);
        assert_eq!(
            store
                .count_by_client_since("a", Duration::from_secs(60))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_unavailable() {
        let store = InMemoryMessageStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.count_by_client("a"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let store = InMemoryUserStore::new();
        let profile = HandshakeUser {
            id: 1,
            first_name: "Ada".to_string(),
            last_name: String::new(),
            username: "ada".to_string(),
            language_code: "en".to_string(),
            is_premium: false,
        };
        let first = store.upsert(profile.clone()).unwrap();
        let second = store
            .upsert(HandshakeUser {
                username: "lovelace".to_string(),
                ..profile
            })
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.username, "lovelace");
        assert_eq!(store.get(1).unwrap().unwrap().username, "lovelace");
        assert!(store.get(2).unwrap().is_none());
    }
}
