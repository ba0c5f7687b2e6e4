use std::io;

use crate::error::SsoError;

/// Opens a URL in the platform browser. A seam for tests and for embedders
/// that route link-opening through their own shell.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), SsoError>;
}

/// Production opener backed by the operating system's default URL handler.
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), SsoError> {
        open::that(url).map_err(classify)
    }
}

/// The platform reports "no handler for this link" distinctly from every
/// other launch failure; the two get different user-facing messages.
fn classify(err: io::Error) -> SsoError {
    if err.kind() == io::ErrorKind::NotFound {
        SsoError::NoBrowser
    } else {
        SsoError::BrowserLaunch(err)
    }
}
