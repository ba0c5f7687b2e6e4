//! Injected configuration for the SSO redirect flow.

/// Query key carrying the bearer token on a direct callback.
pub const QUERY_AUTH_TOKEN: &str = "MMAUTHTOKEN";
/// Query key carrying the CSRF token on a direct callback.
pub const QUERY_CSRF_TOKEN: &str = "MMCSRF";
/// Query key carrying a one-time challenge token to be exchanged server-side.
pub const QUERY_CHALLENGE_TOKEN: &str = "MMCHALLENGETOKEN";
/// Query key for the app callback URL added to the provider login URL.
pub const PARAM_REDIRECT_TO: &str = "redirect_to";
/// Query key for the PKCE challenge added to the provider login URL.
pub const PARAM_CODE_CHALLENGE: &str = "code_challenge";
/// Path appended to the scheme prefix to form the callback URL.
pub const CALLBACK_SUFFIX: &str = "callback";

/// Release channel. Decides which custom URL scheme the OS routes back into
/// the application; release and pre-release builds register different ones so
/// they can be installed side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildChannel {
    Release,
    Beta,
}

impl BuildChannel {
    /// Custom-scheme prefix used as the redirect target for this channel.
    pub fn redirect_prefix(self) -> &'static str {
        match self {
            BuildChannel::Release => "mmauth://",
            BuildChannel::Beta => "mmauth-beta://",
        }
    }
}

/// Configuration for one SSO login screen, resolved once at startup and
/// injected rather than read from ambient globals.
#[derive(Debug, Clone)]
pub struct SsoConfig {
    /// Provider authorization endpoint, possibly already carrying query
    /// parameters of its own.
    pub login_url: String,
    pub channel: BuildChannel,
    /// Error injected by the caller (e.g. a session-expired notice). Takes
    /// precedence over flow-generated errors and suppresses the auto attempt.
    pub initial_error: Option<String>,
}

impl SsoConfig {
    pub fn new(login_url: impl Into<String>, channel: BuildChannel) -> Self {
        Self {
            login_url: login_url.into(),
            channel,
            initial_error: None,
        }
    }

    pub fn with_initial_error(mut self, error: impl Into<String>) -> Self {
        self.initial_error = Some(error.into());
        self
    }

    /// Full callback URL the provider redirects to (`<scheme>callback`).
    pub fn redirect_url(&self) -> String {
        format!("{}{}", self.channel.redirect_prefix(), CALLBACK_SUFFIX)
    }
}
