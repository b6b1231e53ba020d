// Entity records, request bodies and response views

pub mod notification;
pub mod post;
pub mod user;

pub use notification::{
    NewNotification, NotificationRecord, NotificationSender, NotificationType, NotificationView,
};
pub use post::{
    Comment, CommentRecord, CommentRequest, CommentView, CreatePostRequest, PostFilter, PostRecord,
    PostView,
};
pub use user::{
    LoginRequest, NewUser, PublicUser, SignupRequest, UpdateProfileRequest, UserEdges, UserRecord,
};

use serde::Serialize;

/// `{"message": ...}` body used by endpoints with nothing else to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
