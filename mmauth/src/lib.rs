pub mod browser;
pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod flow;
pub mod login_url;
pub mod pkce;

// Re-exports for convenience
pub use browser::{LinkOpener, SystemOpener};
pub use config::{BuildChannel, SsoConfig};
pub use error::SsoError;
pub use events::{UrlEventBus, UrlEventSource, UrlEventStream};
pub use exchange::{HttpTokenExchanger, SessionCredential, TokenExchanger};
pub use flow::{SsoDelegate, SsoFlow};
pub use login_url::build_login_url;
pub use pkce::CodeVerifier;
