use uuid::Uuid;

use crate::core::EntityId;
use crate::models::PublicUser;

/// Request-scoped identity of the authenticated caller.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub user: PublicUser,
    pub request_id: String,
}

impl ViewerContext {
    pub fn authenticated(user: PublicUser) -> Self {
        let request_id = format!("user-{}-{}", user.id, Uuid::new_v4());
        ViewerContext { user, request_id }
    }

    pub fn user_id(&self) -> EntityId {
        self.user.id
    }
}
