//! Chat display name resolution.
//!
//! A stored non-empty name always wins, so renames made elsewhere are never clobbered
//! and each chat costs at most one directory lookup. Otherwise the name is derived by
//! namespace:
//!
//! - group chats: sync hint display name, sync hint name, group directory, `Group <id>`
//! - everything else: contact hint, contact directory, message sender, local part
//!
//! Every step that fails or yields nothing falls through to the next, so the result is
//! never empty.

use tracing::{debug, warn};

use crate::address::{AddressKind, ChatAddress};
use crate::session::{SessionClient, SyncHint};
use crate::store::MessageStore;

/// Inputs available when naming a chat.
#[derive(Debug, Clone, Copy)]
pub struct NameRequest<'a> {
    pub address: &'a ChatAddress,
    pub hint: &'a SyncHint,
    /// Sender address of the message being ingested, when there is one.
    pub sender: Option<&'a str>,
}

impl<'a> NameRequest<'a> {
    pub fn new(address: &'a ChatAddress) -> Self {
        static NO_HINT: SyncHint = SyncHint::None;
        Self {
            address,
            hint: &NO_HINT,
            sender: None,
        }
    }

    pub fn with_hint(mut self, hint: &'a SyncHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_sender(mut self, sender: &'a str) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// Resolves display names from the store and the session directory.
pub struct ChatNameResolver<'a> {
    store: &'a MessageStore,
    session: &'a dyn SessionClient,
}

impl<'a> ChatNameResolver<'a> {
    pub fn new(store: &'a MessageStore, session: &'a dyn SessionClient) -> Self {
        Self { store, session }
    }

    /// Resolve a non-empty display name for the chat.
    pub async fn resolve(&self, request: NameRequest<'_>) -> String {
        let jid = request.address.to_string();
        match self.store.chat_name(&jid).await {
            Ok(Some(name)) => return name,
            Ok(None) => {}
            Err(e) => warn!(chat = %jid, error = %e, "Failed to read stored chat name"),
        }

        let name = match request.address.kind() {
            AddressKind::Group => self.group_name(request).await,
            AddressKind::Direct | AddressKind::Other => self.direct_name(request).await,
        };
        debug!(chat = %jid, name = %name, "Resolved chat name");
        name
    }

    async fn group_name(&self, request: NameRequest<'_>) -> String {
        if let SyncHint::Group { display_name, name } = request.hint {
            if let Some(hinted) = non_empty(display_name.as_deref()).or(non_empty(name.as_deref()))
            {
                return hinted.to_string();
            }
        }

        match self.session.group_name(request.address).await {
            Ok(Some(name)) if !name.is_empty() => return name,
            Ok(_) => {}
            Err(e) => warn!(chat = %request.address, error = %e, "Group lookup failed"),
        }

        format!("Group {}", request.address.local_part())
    }

    async fn direct_name(&self, request: NameRequest<'_>) -> String {
        if let SyncHint::Contact { full_name } = request.hint {
            if let Some(hinted) = non_empty(full_name.as_deref()) {
                return hinted.to_string();
            }
        }

        match self.session.contact_name(request.address).await {
            Ok(Some(name)) if !name.is_empty() => return name,
            Ok(_) => {}
            Err(e) => warn!(chat = %request.address, error = %e, "Contact lookup failed"),
        }

        if let Some(sender) = non_empty(request.sender) {
            return sender.to_string();
        }

        request.address.local_part().to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{EventHandler, SendReceipt, SessionError, SessionResult};
    use crate::store::MessageDb;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Directory stub with fixed answers and a lookup counter.
    #[derive(Default)]
    struct Directory {
        group: Option<String>,
        contact: Option<String>,
        fail: bool,
        lookups: AtomicUsize,
    }

    impl Directory {
        fn answer(&self, value: &Option<String>) -> SessionResult<Option<String>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SessionError::Transport("offline".to_string()));
            }
            Ok(value.clone())
        }
    }

    #[async_trait]
    impl SessionClient for Directory {
        fn is_connected(&self) -> bool {
            true
        }

        fn own_address(&self) -> Option<ChatAddress> {
            None
        }

        async fn group_name(&self, _group: &ChatAddress) -> SessionResult<Option<String>> {
            self.answer(&self.group)
        }

        async fn contact_name(&self, _contact: &ChatAddress) -> SessionResult<Option<String>> {
            self.answer(&self.contact)
        }

        async fn send_text(&self, _to: &ChatAddress, _text: &str) -> SessionResult<SendReceipt> {
            Err(SessionError::NotConnected)
        }

        async fn request_history_sync(&self, _count: u32) -> SessionResult<()> {
            Ok(())
        }

        fn register_handler(&self, _handler: Arc<dyn EventHandler>) {}
    }

    async fn store() -> MessageStore {
        MessageStore::new(MessageDb::in_memory().await.unwrap())
    }

    fn addr(raw: &str) -> ChatAddress {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_stored_name_wins_without_lookup() {
        let store = store().await;
        store
            .upsert_chat("123@g.us", "Trading Desk", Utc::now())
            .await
            .unwrap();
        let directory = Directory {
            group: Some("Renamed".to_string()),
            ..Default::default()
        };
        let resolver = ChatNameResolver::new(&store, &directory);

        let group = addr("123@g.us");
        let hint = SyncHint::Group {
            display_name: Some("Hinted".to_string()),
            name: None,
        };
        let name = resolver
            .resolve(NameRequest::new(&group).with_hint(&hint))
            .await;
        assert_eq!(name, "Trading Desk");
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_hint_order() {
        let store = store().await;
        let directory = Directory {
            group: Some("Directory".to_string()),
            ..Default::default()
        };
        let resolver = ChatNameResolver::new(&store, &directory);
        let group = addr("123@g.us");

        let both = SyncHint::Group {
            display_name: Some("Display".to_string()),
            name: Some("Plain".to_string()),
        };
        assert_eq!(
            resolver.resolve(NameRequest::new(&group).with_hint(&both)).await,
            "Display"
        );

        let name_only = SyncHint::Group {
            display_name: Some(String::new()),
            name: Some("Plain".to_string()),
        };
        assert_eq!(
            resolver
                .resolve(NameRequest::new(&group).with_hint(&name_only))
                .await,
            "Plain"
        );
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);

        assert_eq!(resolver.resolve(NameRequest::new(&group)).await, "Directory");
    }

    #[tokio::test]
    async fn test_group_fallback_on_lookup_failure() {
        let store = store().await;
        let directory = Directory {
            fail: true,
            ..Default::default()
        };
        let resolver = ChatNameResolver::new(&store, &directory);

        let group = addr("120363@g.us");
        assert_eq!(resolver.resolve(NameRequest::new(&group)).await, "Group 120363");
    }

    #[tokio::test]
    async fn test_direct_chat_order() {
        let store = store().await;
        let contact = addr("555@s.whatsapp.net");

        let directory = Directory {
            contact: Some("Ann Lee".to_string()),
            ..Default::default()
        };
        let resolver = ChatNameResolver::new(&store, &directory);
        let hint = SyncHint::Contact {
            full_name: Some("Ann From Sync".to_string()),
        };
        assert_eq!(
            resolver
                .resolve(NameRequest::new(&contact).with_hint(&hint))
                .await,
            "Ann From Sync"
        );
        assert_eq!(
            resolver
                .resolve(NameRequest::new(&contact).with_sender("555"))
                .await,
            "Ann Lee"
        );

        let empty = Directory::default();
        let resolver = ChatNameResolver::new(&store, &empty);
        assert_eq!(
            resolver
                .resolve(NameRequest::new(&contact).with_sender("555@s.whatsapp.net"))
                .await,
            "555@s.whatsapp.net"
        );
        assert_eq!(resolver.resolve(NameRequest::new(&contact)).await, "555");
    }

    #[tokio::test]
    async fn test_group_hint_ignored_for_direct_chat() {
        let store = store().await;
        let directory = Directory::default();
        let resolver = ChatNameResolver::new(&store, &directory);

        let contact = addr("555@s.whatsapp.net");
        let hint = SyncHint::Group {
            display_name: Some("Not A Group".to_string()),
            name: None,
        };
        let name = resolver
            .resolve(NameRequest::new(&contact).with_hint(&hint))
            .await;
        assert_eq!(name, "555");
    }

    #[tokio::test]
    async fn test_empty_stored_name_is_resolved_again() {
        let store = store().await;
        store
            .upsert_chat("555@s.whatsapp.net", "", Utc::now())
            .await
            .unwrap();
        let directory = Directory {
            contact: Some("Ann".to_string()),
            ..Default::default()
        };
        let resolver = ChatNameResolver::new(&store, &directory);

        let contact = addr("555@s.whatsapp.net");
        assert_eq!(resolver.resolve(NameRequest::new(&contact)).await, "Ann");
    }
}
