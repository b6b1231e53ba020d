use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{Database, ImageHost, LocalImageHost, PasswordService, SessionIssuer},
    services::{AuthService, NotificationService, PostService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub sessions: Arc<SessionIssuer>,
    pub auth: AuthService,
    pub users: UserService,
    pub posts: PostService,
    pub notifications: NotificationService,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        // Initialize database
        let database = Database::connect(&config.database).await?;
        let images: Arc<dyn ImageHost> = Arc::new(LocalImageHost::new(&config.media));

        Self::from_parts(config, Arc::new(database), images)
    }

    /// Wire services over an already-open store and image host.
    pub fn from_parts(config: Config, db: Arc<Database>, images: Arc<dyn ImageHost>) -> AppResult<Self> {
        let passwords = Arc::new(PasswordService::new(&config.auth)?);
        let sessions = Arc::new(SessionIssuer::new(&config.auth));

        Ok(Self {
            auth: AuthService::new(db.clone(), passwords.clone()),
            users: UserService::new(db.clone(), images.clone(), passwords),
            posts: PostService::new(db.clone(), images, config.engagement.notify_self_likes),
            notifications: NotificationService::new(db.clone()),
            config: Arc::new(config),
            db,
            sessions,
        })
    }
}
