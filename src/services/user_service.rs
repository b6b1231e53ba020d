// UserService - profiles, suggestions, follow toggles and profile updates

use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::validation::{non_empty, validate_email, validate_password};
use crate::core::{current_time_millis, AssociationType, EdgeToggle, EntityId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::media::release_image;
use crate::infrastructure::{Database, ImageHost, PasswordService};
use crate::models::{NewNotification, NotificationType, PublicUser, UpdateProfileRequest, UserEdges};

const SUGGESTION_SAMPLE_SIZE: u32 = 10;
const SUGGESTION_LIMIT: usize = 4;

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    images: Arc<dyn ImageHost>,
    passwords: Arc<PasswordService>,
}

impl UserService {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageHost>, passwords: Arc<PasswordService>) -> Self {
        Self { db, images, passwords }
    }

    pub async fn profile(&self, username: &str) -> AppResult<PublicUser> {
        let record = self
            .db
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.db
            .public_user(record.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Up to four random users the actor does not follow yet.
    pub async fn suggested(&self, actor: EntityId) -> AppResult<Vec<PublicUser>> {
        let following = self.db.association_targets(actor, AssociationType::Following).await?;
        let sample = self.db.sample_users_excluding(actor, SUGGESTION_SAMPLE_SIZE).await?;

        let ids: Vec<EntityId> = sample
            .iter()
            .map(|user| user.id)
            .filter(|id| !following.contains(id))
            .take(SUGGESTION_LIMIT)
            .collect();

        let mut users = self.db.public_users(&ids).await?;
        Ok(ids.iter().filter_map(|id| users.remove(id)).collect())
    }

    #[instrument(skip(self))]
    pub async fn follow_unfollow(&self, actor: EntityId, target: EntityId) -> AppResult<EdgeToggle> {
        if actor == target {
            return Err(AppError::BadRequest("You can't follow yourself".to_string()));
        }
        if self.db.find_user_by_id(actor).await?.is_none() || self.db.find_user_by_id(target).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let notification = NewNotification {
            from: actor,
            to: target,
            kind: NotificationType::Follow,
        };
        let outcome = self
            .db
            .toggle_association(actor, AssociationType::Following, target, Some(notification))
            .await?;

        info!("User {} {:?} follow of {}", actor, outcome, target);
        Ok(outcome)
    }

    /// Applies the non-empty fields of `request`. Password changes need both
    /// the current and the new password; new images replace the hosted ones.
    #[instrument(skip(self, request))]
    pub async fn update_profile(&self, actor: EntityId, request: UpdateProfileRequest) -> AppResult<PublicUser> {
        let mut user = self
            .db
            .find_user_by_id(actor)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        match (non_empty(request.current_password), non_empty(request.new_password)) {
            (None, None) => {}
            (Some(current), Some(new)) => {
                if !self.passwords.verify(&current, &user.password_hash)? {
                    return Err(AppError::BadRequest("Invalid current password".to_string()));
                }
                validate_password(&new)?;
                user.password_hash = self.passwords.hash(&new)?;
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Current password and new password must be filled".to_string(),
                ))
            }
        }

        if let Some(email) = non_empty(request.email).map(|e| e.trim().to_string()) {
            if email != user.email {
                validate_email(&email)?;
                if self.db.find_user_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict("Email is already taken".to_string()));
                }
                user.email = email;
            }
        }
        if let Some(username) = non_empty(request.username).map(|u| u.trim().to_string()) {
            if username != user.username {
                if self.db.find_user_by_username(&username).await?.is_some() {
                    return Err(AppError::Conflict("Username is already taken".to_string()));
                }
                user.username = username;
            }
        }
        if let Some(full_name) = non_empty(request.full_name) {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(bio) = non_empty(request.bio) {
            user.bio = bio;
        }
        if let Some(link) = non_empty(request.link) {
            user.link = link;
        }

        let profile_img = non_empty(request.profile_img).filter(|p| *p != user.profile_img);
        let cover_img = non_empty(request.cover_img).filter(|p| *p != user.cover_img);

        let mut uploaded = Vec::new();
        let mut replaced = Vec::new();
        let saved: AppResult<()> = async {
            if let Some(payload) = profile_img {
                let url = self.images.upload(&payload).await?;
                uploaded.push(url.clone());
                replaced.push(std::mem::replace(&mut user.profile_img, url));
            }
            if let Some(payload) = cover_img {
                let url = self.images.upload(&payload).await?;
                uploaded.push(url.clone());
                replaced.push(std::mem::replace(&mut user.cover_img, url));
            }

            user.updated_at = current_time_millis();
            self.db.update_user(&user).await
        }
        .await;

        // images uploaded for a profile that was never saved are orphans
        if let Err(e) = saved {
            for url in &uploaded {
                release_image(self.images.as_ref(), url).await;
            }
            return Err(e);
        }

        for url in replaced {
            release_image(self.images.as_ref(), &url).await;
        }

        info!("Updated profile of {}", actor);
        let edges = self.db.user_edges(&[actor]).await?.remove(&actor).unwrap_or_else(UserEdges::default);
        Ok(PublicUser::from_record(user, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::LocalImageHost;
    use crate::models::NewUser;

    struct Fixture {
        service: UserService,
        db: Arc<Database>,
        media: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let mut config = Config::default();
        config.auth.password_hash_memory_kib = 1024;
        config.auth.password_hash_iterations = 1;
        let media = tempfile::tempdir().unwrap();
        config.media.dir = media.path().to_path_buf();

        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let passwords = Arc::new(PasswordService::new(&config.auth).unwrap());
        let images: Arc<dyn ImageHost> = Arc::new(LocalImageHost::new(&config.media));
        Fixture {
            service: UserService::new(db.clone(), images, passwords),
            db,
            media,
        }
    }

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    /// Stores the image, then registers `claim` so the profile write that
    /// follows loses the username race.
    struct ClaimingHost {
        inner: LocalImageHost,
        db: Arc<Database>,
        claim: String,
    }

    #[async_trait::async_trait]
    impl ImageHost for ClaimingHost {
        async fn upload(&self, payload: &str) -> AppResult<String> {
            let url = self.inner.upload(payload).await?;
            self.db
                .insert_user(NewUser {
                    full_name: self.claim.clone(),
                    username: self.claim.clone(),
                    email: format!("{}@example.com", self.claim),
                    password_hash: "hash".to_string(),
                })
                .await?;
            Ok(url)
        }

        async fn destroy(&self, public_id: &str) -> AppResult<()> {
            self.inner.destroy(public_id).await
        }
    }

    async fn add_user(fixture: &Fixture, name: &str, password: &str) -> EntityId {
        let password_hash = fixture.service.passwords.hash(password).unwrap();
        fixture
            .db
            .insert_user(NewUser {
                full_name: name.to_string(),
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;

        let err = fixture.service.follow_unfollow(alice, alice).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(fixture.db.association_targets(alice, AssociationType::Following).await.unwrap().is_empty());
        assert!(fixture.db.notifications_for(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_unknown_user() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;

        let err = fixture.service.follow_unfollow(alice, EntityId(999)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_suggestions_skip_followed_users() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;
        let bob = add_user(&fixture, "bob", "secret1").await;
        for name in ["carol", "dave", "erin", "frank", "grace"] {
            add_user(&fixture, name, "secret1").await;
        }
        fixture.service.follow_unfollow(alice, bob).await.unwrap();

        let suggested = fixture.service.suggested(alice).await.unwrap();
        assert_eq!(suggested.len(), 4);
        assert!(suggested.iter().all(|u| u.id != alice && u.id != bob));
    }

    #[tokio::test]
    async fn test_password_change_rules() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;

        let only_new = UpdateProfileRequest {
            new_password: Some("secret2".into()),
            ..Default::default()
        };
        let err = fixture.service.update_profile(alice, only_new).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Current password and new password must be filled"));

        let wrong_current = UpdateProfileRequest {
            current_password: Some("wrong".into()),
            new_password: Some("secret2".into()),
            ..Default::default()
        };
        let err = fixture.service.update_profile(alice, wrong_current).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Invalid current password"));

        let valid = UpdateProfileRequest {
            current_password: Some("secret1".into()),
            new_password: Some("secret2".into()),
            bio: Some("hello".into()),
            ..Default::default()
        };
        let user = fixture.service.update_profile(alice, valid).await.unwrap();
        assert_eq!(user.bio, "hello");

        let stored = fixture.db.find_user_by_id(alice).await.unwrap().unwrap();
        assert!(fixture.service.passwords.verify("secret2", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_username() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;
        add_user(&fixture, "bob", "secret1").await;

        let request = UpdateProfileRequest {
            username: Some("bob".into()),
            ..Default::default()
        };
        let err = fixture.service.update_profile(alice, request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // keeping the current username is not a conflict
        let request = UpdateProfileRequest {
            username: Some("alice".into()),
            full_name: Some("Alice A.".into()),
            ..Default::default()
        };
        let user = fixture.service.update_profile(alice, request).await.unwrap();
        assert_eq!(user.full_name, "Alice A.");
    }

    #[tokio::test]
    async fn test_username_race_releases_uploaded_images() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;
        let media = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.media.dir = media.path().to_path_buf();
        let images: Arc<dyn ImageHost> = Arc::new(ClaimingHost {
            inner: LocalImageHost::new(&config.media),
            db: fixture.db.clone(),
            claim: "carol".to_string(),
        });
        let service = UserService::new(fixture.db.clone(), images, fixture.service.passwords.clone());

        let request = UpdateProfileRequest {
            username: Some("carol".into()),
            profile_img: Some(PIXEL.into()),
            ..Default::default()
        };
        let err = service.update_profile(alice, request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(std::fs::read_dir(media.path()).unwrap().count(), 0);

        let stored = fixture.db.find_user_by_id(alice).await.unwrap().unwrap();
        assert_eq!(stored.username, "alice");
        assert!(stored.profile_img.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_cover_releases_new_profile_image() {
        let fixture = fixture().await;
        let alice = add_user(&fixture, "alice", "secret1").await;

        let request = UpdateProfileRequest {
            profile_img: Some(PIXEL.into()),
            cover_img: Some("not an image".into()),
            ..Default::default()
        };
        let err = fixture.service.update_profile(alice, request).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(std::fs::read_dir(fixture.media.path()).unwrap().count(), 0);
        assert!(fixture.db.find_user_by_id(alice).await.unwrap().unwrap().profile_img.is_empty());
    }
}
