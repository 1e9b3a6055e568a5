use std::fmt;
use std::net::IpAddr;

use axum::http::Uri;

use super::StoreError;

/// How the client authenticates to the store.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static account key, used against a local emulator.
    Key(String),
    /// Identity supplied by the hosting environment.
    Ambient,
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Key(_) => "key",
            Credential::Ambient => "ambient",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Key(_) => f.write_str("Key(<redacted>)"),
            Credential::Ambient => f.write_str("Ambient"),
        }
    }
}

pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost") || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// Loopback endpoints get the static key; anything else uses the ambient identity.
pub fn select_credential(endpoint: &str, key: &str) -> Result<Credential, StoreError> {
    let uri: Uri = endpoint
        .parse()
        .map_err(|e| StoreError::BadRequest(format!("invalid store endpoint {endpoint:?}: {e}")))?;
    let host = uri
        .host()
        .ok_or_else(|| StoreError::BadRequest(format!("store endpoint {endpoint:?} has no host")))?;
    if is_loopback_host(host) {
        Ok(Credential::Key(key.to_string()))
    } else {
        Ok(Credential::Ambient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_endpoints_use_key() {
        for ep in ["http://localhost:8081", "https://127.0.0.1:8081/", "http://[::1]:8081", "http://127.9.9.9"] {
            assert_eq!(select_credential(ep, "k").unwrap(), Credential::Key("k".into()), "{ep}");
        }
    }

    #[test]
    fn remote_endpoints_use_ambient() {
        let c = select_credential("https://acct.documents.example.net:443/", "k").unwrap();
        assert_eq!(c, Credential::Ambient);
        assert_eq!(c.kind(), "ambient");
    }

    #[test]
    fn key_is_redacted_in_debug() {
        assert_eq!(format!("{:?}", Credential::Key("secret".into())), "Key(<redacted>)");
    }

    #[test]
    fn garbage_endpoint_is_rejected() {
        assert!(select_credential("not a url", "k").is_err());
    }
}
