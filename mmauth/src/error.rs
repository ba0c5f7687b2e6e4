use std::io;

/// Errors from the SSO redirect flow.
///
/// All of these are terminal for the current attempt only. None cross the
/// flow boundary as a panic; they are rendered to display text via
/// [`SsoError::user_message`] and the user retries from there.
#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    #[error("secure random generation failed: {0}")]
    RandomGeneration(String),

    #[error("login URL is not a valid URL: {0}")]
    InvalidLoginUrl(#[from] url::ParseError),

    #[error("no application available to open the login link")]
    NoBrowser,

    #[error("failed to open the login link: {0}")]
    BrowserLaunch(io::Error),

    #[error("callback did not carry a usable token pair")]
    TokenExtraction,

    #[error("challenge token exchange failed: {0}")]
    Exchange(String),
}

impl SsoError {
    /// Stable, user-facing description shown in place of the redirect notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            SsoError::NoBrowser => "No browser is installed to open the login page.",
            SsoError::BrowserLaunch(_) => "The login page could not be opened.",
            SsoError::TokenExtraction | SsoError::Exchange(_) => {
                "Login failed: the server did not return a session. Please try again."
            }
            SsoError::RandomGeneration(_) | SsoError::InvalidLoginUrl(_) => {
                "Login could not be started. Please try again."
            }
        }
    }
}
