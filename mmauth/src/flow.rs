//! SSO redirect flow orchestration.
//!
//! One flow attempt at a time: generate a verifier, build the login URL, arm
//! the callback listener, open the external browser, then wait for the OS to
//! hand back a URL with the expected custom scheme. A new attempt (manual
//! retry or the deferred auto attempt) fully replaces the previous listener
//! registration and verifier before anything else happens, so a stale
//! verifier can never satisfy a later callback.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::LinkOpener;
use crate::config::{QUERY_AUTH_TOKEN, QUERY_CHALLENGE_TOKEN, QUERY_CSRF_TOKEN, SsoConfig};
use crate::error::SsoError;
use crate::events::{UrlEventSource, UrlEventStream};
use crate::exchange::{SessionCredential, TokenExchanger};
use crate::login_url::build_login_url;
use crate::pkce::CodeVerifier;

/// Delay between mounting (which arms the listener) and the automatic first
/// attempt. Gives the listener time to register before the browser opens and
/// keeps a screen mounted with a pre-existing error from flashing straight
/// into a new attempt.
const AUTO_ATTEMPT_DELAY: Duration = Duration::from_millis(1000);

/// Receiver for flow outcomes.
///
/// `on_login` fires at most once per flow; `on_error` replaces the
/// "redirecting" notice with display text and may fire once per attempt.
pub trait SsoDelegate: Send + Sync {
    fn on_login(&self, credential: SessionCredential);
    fn on_error(&self, message: String);
}

struct FlowState {
    /// Monotonic attempt counter; a listener only acts if its attempt is
    /// still the current one.
    attempt: u64,
    listener: Option<JoinHandle<()>>,
    error: Option<String>,
    /// True while `error` is the caller-injected message. It outranks
    /// flow-generated errors until a manual retry clears it.
    error_injected: bool,
    done: bool,
}

struct FlowInner {
    config: SsoConfig,
    events: Arc<dyn UrlEventSource>,
    opener: Arc<dyn LinkOpener>,
    exchanger: Arc<dyn TokenExchanger>,
    delegate: Arc<dyn SsoDelegate>,
    state: Mutex<FlowState>,
}

impl FlowInner {
    fn lock_state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver the credential if this attempt is still current. First
    /// terminal state wins; everything after is a no-op.
    fn complete(&self, attempt: u64, credential: SessionCredential) {
        {
            let mut state = self.lock_state();
            if state.done || state.attempt != attempt {
                return;
            }
            state.done = true;
            state.error = None;
            state.error_injected = false;
        }
        info!("SSO flow complete, handing session to the caller");
        self.delegate.on_login(credential);
    }

    fn fail_attempt(&self, attempt: u64, err: SsoError) {
        let message = err.user_message().to_string();
        {
            let mut state = self.lock_state();
            if state.done || state.attempt != attempt {
                return;
            }
            if state.error_injected {
                debug!(error = %err, attempt, "attempt failed, keeping caller-injected error");
                return;
            }
            state.error = Some(message.clone());
        }
        warn!(error = %err, attempt, "SSO attempt failed");
        self.delegate.on_error(message);
    }
}

/// Start a fresh attempt: new verifier, new login URL, new listener, browser.
/// Supersedes whatever attempt came before it.
fn begin_attempt(inner: &Arc<FlowInner>) {
    let attempt = {
        let mut state = inner.lock_state();
        if state.done {
            return;
        }
        state.attempt += 1;
        state.attempt
    };
    debug!(attempt, "beginning SSO attempt");

    let verifier = match CodeVerifier::generate() {
        Ok(v) => v,
        Err(e) => {
            inner.fail_attempt(attempt, e);
            return;
        }
    };
    let challenge = verifier.challenge();
    let login_url = match build_login_url(
        &inner.config.login_url,
        &inner.config.redirect_url(),
        &challenge,
    ) {
        Ok(u) => u,
        Err(e) => {
            inner.fail_attempt(attempt, e);
            return;
        }
    };

    // Listener must be armed before the browser is launched.
    arm_listener(inner, Some(verifier), attempt);

    debug!(attempt, "opening provider login URL in external browser");
    if let Err(e) = inner.opener.open(login_url.as_str()) {
        inner.fail_attempt(attempt, e);
    }
}

/// Replace the listener registration. The old registration is fully released
/// before the new one is armed; the new task captures its verifier
/// immutably, so later attempts cannot leak into it.
fn arm_listener(inner: &Arc<FlowInner>, verifier: Option<CodeVerifier>, attempt: u64) {
    {
        let mut state = inner.lock_state();
        if let Some(old) = state.listener.take() {
            old.abort();
        }
    }
    let stream = inner.events.subscribe();
    let handle = tokio::spawn(listen(Arc::clone(inner), stream, verifier, attempt));
    inner.lock_state().listener = Some(handle);
}

/// Per-attempt listener task. Ignores URLs outside the redirect prefix and
/// exits after the first match (first-wins on duplicate events).
async fn listen(
    inner: Arc<FlowInner>,
    mut stream: UrlEventStream,
    verifier: Option<CodeVerifier>,
    attempt: u64,
) {
    let prefix = inner.config.channel.redirect_prefix();
    while let Some(url) = stream.next().await {
        if !url.starts_with(prefix) {
            debug!(attempt, "ignoring URL event for another scheme");
            continue;
        }
        info!(attempt, "callback URL matched redirect prefix");
        match extract_credential(&url, verifier.as_ref(), &*inner.exchanger).await {
            Ok(credential) => inner.complete(attempt, credential),
            Err(e) => inner.fail_attempt(attempt, e),
        }
        return;
    }
}

/// Pull a session out of a matched callback URL: directly from the bearer
/// and CSRF query parameters, or by exchanging a one-time challenge token
/// with the verifier captured for this attempt.
async fn extract_credential(
    raw: &str,
    verifier: Option<&CodeVerifier>,
    exchanger: &dyn TokenExchanger,
) -> Result<SessionCredential, SsoError> {
    let parsed = Url::parse(raw).map_err(|_| SsoError::TokenExtraction)?;

    let mut bearer = None;
    let mut csrf = None;
    let mut challenge = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            QUERY_AUTH_TOKEN => bearer = Some(value.into_owned()),
            QUERY_CSRF_TOKEN => csrf = Some(value.into_owned()),
            QUERY_CHALLENGE_TOKEN => challenge = Some(value.into_owned()),
            _ => {}
        }
    }

    if let (Some(bearer), Some(csrf)) = (bearer, csrf) {
        if !bearer.is_empty() && !csrf.is_empty() {
            return Ok(SessionCredential {
                bearer_token: bearer,
                csrf_token: csrf,
            });
        }
    }

    match (challenge, verifier) {
        (Some(token), Some(verifier)) if !token.is_empty() => {
            debug!("callback carries a challenge token, exchanging");
            exchanger.exchange(&token, &verifier.encoded()).await
        }
        _ => Err(SsoError::TokenExtraction),
    }
}

/// One SSO login screen's worth of flow state.
///
/// Mounting arms the callback listener immediately and schedules the deferred
/// auto attempt (unless a pre-existing error was injected). Dropping the flow
/// tears everything down.
pub struct SsoFlow {
    inner: Arc<FlowInner>,
    auto_attempt: Mutex<Option<JoinHandle<()>>>,
}

impl SsoFlow {
    /// Must be called from within a tokio runtime; the listener and the auto
    /// attempt run as spawned tasks.
    pub fn mount(
        config: SsoConfig,
        events: Arc<dyn UrlEventSource>,
        opener: Arc<dyn LinkOpener>,
        exchanger: Arc<dyn TokenExchanger>,
        delegate: Arc<dyn SsoDelegate>,
    ) -> Self {
        let initial_error = config.initial_error.clone();
        let inner = Arc::new(FlowInner {
            config,
            events,
            opener,
            exchanger,
            delegate,
            state: Mutex::new(FlowState {
                attempt: 0,
                listener: None,
                error_injected: initial_error.is_some(),
                error: initial_error.clone(),
                done: false,
            }),
        });

        // Armed on mount, before any browser launch. Until the first attempt
        // runs there is no verifier, so only direct-token callbacks can
        // complete from this registration.
        arm_listener(&inner, None, 0);

        let auto_attempt = if initial_error.is_none() {
            let inner = Arc::clone(&inner);
            Some(tokio::spawn(async move {
                tokio::time::sleep(AUTO_ATTEMPT_DELAY).await;
                begin_attempt(&inner);
            }))
        } else {
            debug!("pre-existing login error present, skipping auto attempt");
            None
        };

        Self {
            inner,
            auto_attempt: Mutex::new(auto_attempt),
        }
    }

    /// Manual "try again": clears the displayed error, resets the network
    /// client, and starts a fresh attempt that supersedes any prior verifier
    /// and listener. Also cancels a still-pending auto attempt.
    pub fn retry(&self) {
        self.cancel_auto_attempt();
        {
            let mut state = self.inner.lock_state();
            if state.done {
                return;
            }
            state.error = None;
            state.error_injected = false;
        }
        self.inner.exchanger.reset();
        begin_attempt(&self.inner);
    }

    /// Currently displayed error text, if any.
    pub fn error_text(&self) -> Option<String> {
        self.inner.lock_state().error.clone()
    }

    /// True once the credential has been handed to the delegate.
    pub fn is_complete(&self) -> bool {
        self.inner.lock_state().done
    }

    /// Release the listener registration and any pending auto attempt. Safe
    /// to call more than once; also runs on drop. After teardown no URL event
    /// can complete the flow.
    pub fn teardown(&self) {
        self.cancel_auto_attempt();
        let mut state = self.inner.lock_state();
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
    }

    fn cancel_auto_attempt(&self) {
        let mut pending = self
            .auto_attempt
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(task) = pending.take() {
            task.abort();
        }
    }
}

impl Drop for SsoFlow {
    fn drop(&mut self) {
        self.teardown();
    }
}
