use crate::application::ports::identity::IdentityProvider;
use std::sync::RwLock;
use tracing::info;

/// ログイン中のユーザーを保持する
#[derive(Default)]
pub struct SessionIdentity {
    current: RwLock<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(user_id: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn login(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!("User logged in: {}", user_id);
        if let Ok(mut current) = self.current.write() {
            *current = Some(user_id);
        }
    }

    pub fn logout(&self) {
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.current.read().ok().and_then(|current| current.clone())
    }
}
