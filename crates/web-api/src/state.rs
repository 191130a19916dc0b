use std::sync::Arc;

use application::{
    AccountService, AccountServiceDependencies, Clock, JwtCodec, LocalEventBroadcaster,
    MessageService, MessageServiceDependencies, PresenceRegistry, SessionIssuer,
    SessionIssuerDependencies,
};
use config::AppConfig;
use infrastructure::{refresh_lifespan, Infrastructure};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionIssuer>,
    pub accounts: Arc<AccountService>,
    pub messages: Arc<MessageService>,
    pub presence: Arc<PresenceRegistry>,
    pub broadcaster: Arc<LocalEventBroadcaster>,
}

impl AppState {
    /// 用配置和已装配的存储构建所有服务
    pub fn build(config: &AppConfig, infra: &Infrastructure, clock: Arc<dyn Clock>) -> Self {
        let broadcaster = Arc::new(LocalEventBroadcaster::new(config.broadcast.capacity));

        let sessions = SessionIssuer::new(SessionIssuerDependencies {
            credential_store: infra.credential_store.clone(),
            token_store: infra.token_store.clone(),
            jwt: Arc::new(JwtCodec::new(&config.jwt)),
            clock: clock.clone(),
            refresh_token_lifespan: refresh_lifespan(config),
        });
        let accounts = AccountService::new(AccountServiceDependencies {
            credential_store: infra.credential_store.clone(),
            clock: clock.clone(),
        });
        let messages = MessageService::new(MessageServiceDependencies {
            credential_store: infra.credential_store.clone(),
            message_store: infra.message_store.clone(),
            broadcaster: broadcaster.clone(),
            clock,
        });

        Self {
            sessions: Arc::new(sessions),
            accounts: Arc::new(accounts),
            messages: Arc::new(messages),
            presence: Arc::new(PresenceRegistry::new(broadcaster.clone())),
            broadcaster,
        }
    }
}
