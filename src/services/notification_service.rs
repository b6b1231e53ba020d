// NotificationService - the recipient's notification feed

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::core::{millis_to_datetime, EntityId};
use crate::error::AppResult;
use crate::infrastructure::Database;
use crate::models::{NotificationSender, NotificationView};

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Newest first, as they were before this call; everything returned is
    /// marked read afterwards.
    pub async fn list_and_mark_read(&self, recipient: EntityId) -> AppResult<Vec<NotificationView>> {
        let records = self.db.notifications_for(recipient).await?;

        let mut sender_ids: Vec<EntityId> = records.iter().map(|n| n.from_id).collect();
        sender_ids.sort_unstable();
        sender_ids.dedup();
        let senders: HashMap<EntityId, _> = self
            .db
            .find_users_by_ids(&sender_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let unread: Vec<EntityId> = records.iter().filter(|n| !n.read).map(|n| n.id).collect();

        let views = records
            .into_iter()
            .filter_map(|record| {
                let sender = senders.get(&record.from_id)?;
                Some(NotificationView {
                    id: record.id,
                    from: NotificationSender {
                        id: sender.id,
                        username: sender.username.clone(),
                        profile_img: sender.profile_img.clone(),
                    },
                    to: record.to_id,
                    kind: record.kind,
                    read: record.read,
                    created_at: millis_to_datetime(record.created_at),
                    updated_at: millis_to_datetime(record.updated_at),
                })
            })
            .collect();

        self.db.mark_notifications_read(recipient, &unread).await?;
        Ok(views)
    }

    pub async fn clear_all(&self, recipient: EntityId) -> AppResult<u64> {
        let deleted = self.db.delete_notifications_for(recipient).await?;
        info!("Cleared {} notifications for {}", deleted, recipient);
        Ok(deleted)
    }
}
