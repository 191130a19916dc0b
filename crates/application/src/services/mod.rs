mod account_service;
mod message_service;
mod session_issuer;


pub use account_service::{
    AccountService, AccountServiceDependencies, RegisterUserRequest, PERMISSION_CLAIM_TYPE,
    PERMISSION_ROLE_ADD, PERMISSION_ROLE_DELETE, PERMISSION_ROLE_EDIT, PERMISSION_ROLE_VIEW,
};
pub use message_service::{
    MessageService, MessageServiceDependencies, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT,
};
pub use session_issuer::{
    RefreshOutcome, RefreshRejection, SessionIssuer, SessionIssuerDependencies,
};
