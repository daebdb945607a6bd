use url::Url;

use crate::error::OAuthError;
use crate::traits::Application;

/// Check a requested redirect URI against an application's registered ones.
///
/// Runs before a code is issued - never after a redirect has happened - so a
/// rejection here is what stands between us and an open redirect.
pub fn validate_redirect_uri(application: &Application, redirect_uri: &str) -> Result<(), OAuthError> {
    let parsed = Url::parse(redirect_uri).map_err(|_| {
        OAuthError::InvalidRequest("invalid redirect_uri: not a valid URL".to_string())
    })?;

    match parsed.scheme() {
        "https" => {} // always allowed
        "http" => {
            // http only for loopback (development)
            if let Some(host) = parsed.host_str() {
                if host != "localhost" && host != "127.0.0.1" && host != "[::1]" {
                    return Err(OAuthError::InvalidRequest(
                        "invalid redirect_uri: http only allowed for localhost".to_string(),
                    ));
                }
            }
        }
        scheme => {
            // custom schemes are how native apps get called back (myapp://),
            // but the script-ish ones are never legitimate
            if scheme == "javascript" || scheme == "data" || scheme == "vbscript" {
                return Err(OAuthError::InvalidRequest(format!(
                    "invalid redirect_uri: {scheme} scheme not allowed"
                )));
            }
        }
    }

    if application.redirect_uris.is_empty() {
        // applications predating redirect registration have nothing to match
        // against; allow but make noise
        tracing::warn!(
            "application '{}' has no registered redirect URIs, allowing '{}'",
            application.client_id,
            redirect_uri
        );
        return Ok(());
    }

    if application
        .redirect_uris
        .iter()
        .any(|registered| redirect_uri_matches(registered, redirect_uri))
    {
        Ok(())
    } else {
        Err(OAuthError::InvalidRequest(
            "invalid redirect_uri: not registered for this application".to_string(),
        ))
    }
}

/// Exact match, plus loopback port flexibility: a registered
/// `http://localhost/cb` matches any port during development.
fn redirect_uri_matches(registered: &str, requested: &str) -> bool {
    if registered == requested {
        return true;
    }

    if let (Ok(reg), Ok(req)) = (Url::parse(registered), Url::parse(requested)) {
        if reg.scheme() == req.scheme() {
            if let (Some(reg_host), Some(req_host)) = (reg.host_str(), req.host_str()) {
                if (reg_host == "localhost" || reg_host == "127.0.0.1")
                    && reg_host == req_host
                    && reg.path() == req.path()
                {
                    return true;
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn app(redirect_uris: &[&str]) -> Application {
        Application {
            id: Uuid::new_v4(),
            client_id: "client-test".to_string(),
            active: true,
            redirect_uris: redirect_uris.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn accepts_registered_https_uri() {
        let app = app(&["https://example.com/callback"]);
        assert!(validate_redirect_uri(&app, "https://example.com/callback").is_ok());
    }

    #[test]
    fn rejects_unregistered_uri() {
        let app = app(&["https://example.com/callback"]);
        let err = validate_redirect_uri(&app, "https://evil.example/callback").unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_script_schemes() {
        let app = app(&["https://example.com/callback"]);
        for uri in [
            "javascript:alert(1)",
            "data:text/html,hi",
            "vbscript:whatever",
        ] {
            assert!(validate_redirect_uri(&app, uri).is_err(), "{uri}");
        }
    }

    #[test]
    fn rejects_http_on_public_hosts() {
        let app = app(&["http://example.com/callback"]);
        assert!(validate_redirect_uri(&app, "http://example.com/callback").is_err());
    }

    #[test]
    fn allows_localhost_http_with_any_port() {
        let app = app(&["http://localhost/callback"]);
        assert!(validate_redirect_uri(&app, "http://localhost:8080/callback").is_ok());
        assert!(validate_redirect_uri(&app, "http://localhost:3000/callback").is_ok());
    }

    #[test]
    fn allows_custom_native_scheme() {
        let app = app(&["myapp://auth"]);
        assert!(validate_redirect_uri(&app, "myapp://auth").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let app = app(&["https://example.com/callback"]);
        assert!(validate_redirect_uri(&app, "not a url at all").is_err());
    }

    #[test]
    fn empty_registration_allows_with_warning() {
        let app = app(&[]);
        assert!(validate_redirect_uri(&app, "https://anything.example/cb").is_ok());
    }
}
