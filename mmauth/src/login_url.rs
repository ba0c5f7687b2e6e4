use url::Url;

use crate::config::{PARAM_CODE_CHALLENGE, PARAM_REDIRECT_TO};
use crate::error::SsoError;

/// Build the provider login URL for one attempt: keep whatever query the
/// endpoint already carries, then add the app callback URL and the PKCE
/// challenge. Keys are never duplicated, even if the input was already
/// decorated by a previous attempt.
pub fn build_login_url(
    login_url: &str,
    redirect_url: &str,
    challenge: &str,
) -> Result<Url, SsoError> {
    let mut url = Url::parse(login_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != PARAM_REDIRECT_TO && k != PARAM_CODE_CHALLENGE)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(PARAM_REDIRECT_TO, redirect_url)
        .append_pair(PARAM_CODE_CHALLENGE, challenge)
        .finish();
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_existing_query_parameters() {
        let url = build_login_url(
            "https://example.com/oauth/authorize?client_id=abc",
            "mmauth-beta://callback",
            "chal",
        )
        .unwrap();
        let q = url.query().unwrap();
        assert!(q.contains("client_id=abc"));
        assert!(q.contains("redirect_to=mmauth-beta%3A%2F%2Fcallback"));
        assert!(q.contains("code_challenge=chal"));
    }

    #[test]
    fn works_without_existing_query() {
        let url = build_login_url(
            "https://example.com/oauth/authorize",
            "mmauth://callback",
            "chal",
        )
        .unwrap();
        assert_eq!(
            url.query().unwrap(),
            "redirect_to=mmauth%3A%2F%2Fcallback&code_challenge=chal"
        );
    }

    #[test]
    fn never_duplicates_flow_parameters() {
        let first = build_login_url(
            "https://example.com/oauth/authorize?client_id=abc",
            "mmauth://callback",
            "one",
        )
        .unwrap();
        // A retry fed the already-decorated URL must replace, not append.
        let second = build_login_url(first.as_str(), "mmauth://callback", "two").unwrap();
        let q = second.query().unwrap();
        assert_eq!(q.matches("redirect_to=").count(), 1);
        assert_eq!(q.matches("code_challenge=").count(), 1);
        assert!(q.contains("code_challenge=two"));
        assert!(q.contains("client_id=abc"));
    }

    #[test]
    fn rejects_invalid_login_url() {
        let err = build_login_url("not a url", "mmauth://callback", "chal").unwrap_err();
        assert!(matches!(err, SsoError::InvalidLoginUrl(_)));
    }
}
