use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub user_id: Uuid,
}

impl SessionEvent {
    /// Whether listeners should load the profile again rather than just drop it.
    pub fn rederives_profile(&self) -> bool {
        !matches!(self.kind, SessionEventKind::SignedOut)
    }
}

#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, kind: SessionEventKind, user_id: Uuid) {
        // No receivers just means nobody is listening yet.
        let _ = self.sender.send(SessionEvent { kind, user_id });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let events = SessionEvents::new(8);
        let mut rx = events.subscribe();
        let user = Uuid::new_v4();
        events.publish(SessionEventKind::SignedIn, user);
        events.publish(SessionEventKind::SignedOut, user);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, SessionEventKind::SignedIn);
        assert!(first.rederives_profile());
        let second = rx.recv().await.unwrap();
        assert!(!second.rederives_profile());
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        SessionEvents::new(1).publish(SessionEventKind::UserUpdated, Uuid::new_v4());
    }
}
