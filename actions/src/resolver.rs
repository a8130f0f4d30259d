//! Canonicalization of the accepted Action URL encodings.
//!
//! Four encodings identify the same logical endpoint:
//!
//! - plain `https://...`
//! - `solana-action:https://...` (explicit protocol marker)
//! - `blink:https://...` (bare marker)
//! - `https://dial.to/?action=<encoded-or-raw>` (interstitial)
//!
//! Resolution applies the recognized rewrites in a fixed priority order
//! (protocol marker > interstitial > bare URL) and re-validates the
//! result. Interstitial unwrapping is bounded to one hop so a
//! `dial.to` link wrapping another `dial.to` link fails instead of
//! recursing forever.

use std::fmt;

use url::Url;

use crate::types::{ActionError, ErrorCode};

/// Explicit protocol marker prefix.
pub const ACTION_SCHEME: &str = "solana-action:";

/// Bare marker prefix.
pub const BLINK_MARKER: &str = "blink:";

/// Hosts serving the interstitial wrapper page.
const INTERSTITIAL_HOSTS: &[&str] = &["dial.to", "www.dial.to"];

/// A validated HTTPS endpoint URL with all wrapping removed.
///
/// Produced once per raw input; immutable thereafter. Loopback hosts may
/// use plain `http` so local development endpoints work; everything else
/// must be `https`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    url: Url,
}

impl CanonicalUrl {
    /// Validate a raw string as a canonical endpoint URL.
    pub fn parse(raw: &str) -> Result<Self, ActionError> {
        let url = Url::parse(raw).map_err(|e| {
            ActionError::new(
                ErrorCode::InvalidUrl,
                format!("failed to parse URL: {e}"),
                false,
            )
            .with_detail("url", raw)
        })?;

        match url.scheme() {
            "https" => {}
            "http" if is_loopback_host(&url) => {}
            other => {
                return Err(ActionError::new(
                    ErrorCode::InvalidUrl,
                    format!("expected an https URL, got scheme \"{other}\""),
                    false,
                )
                .with_detail("url", raw));
            }
        }

        if url.host_str().is_none() {
            return Err(ActionError::new(
                ErrorCode::InvalidUrl,
                "URL has no host",
                false,
            )
            .with_detail("url", raw));
        }

        Ok(Self { url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Endpoint host, used as the trust registry key.
    #[must_use]
    pub fn host(&self) -> &str {
        // Host presence is checked at construction.
        self.url.host_str().unwrap_or_default()
    }

    /// Resolve a possibly-relative `href` against this URL's origin.
    pub fn join(&self, href: &str) -> Result<String, ActionError> {
        let joined = self.url.join(href).map_err(|e| {
            ActionError::new(
                ErrorCode::Schema,
                format!("action href does not resolve against the endpoint: {e}"),
                false,
            )
            .with_detail("href", href)
        })?;
        Ok(joined.to_string())
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

/// Outcome of one pattern matcher: either a rewritten candidate or a
/// pass-through. Adding a new URL form means adding a matcher, not
/// another branch in the resolution loop.
enum Matched {
    Marker(String),
    Interstitial(String),
    NoMatch,
}

fn match_encoding(raw: &str) -> Result<Matched, ActionError> {
    if let Some(rest) = raw.strip_prefix(ACTION_SCHEME) {
        return Ok(Matched::Marker(rest.to_string()));
    }
    if let Some(rest) = raw.strip_prefix(BLINK_MARKER) {
        return Ok(Matched::Marker(rest.to_string()));
    }
    match_interstitial(raw)
}

fn match_interstitial(raw: &str) -> Result<Matched, ActionError> {
    let Ok(url) = Url::parse(raw) else {
        return Ok(Matched::NoMatch);
    };
    let Some(host) = url.host_str() else {
        return Ok(Matched::NoMatch);
    };
    if !INTERSTITIAL_HOSTS
        .iter()
        .any(|candidate| host.eq_ignore_ascii_case(candidate))
    {
        return Ok(Matched::NoMatch);
    }

    // query_pairs percent-decodes exactly once.
    let action = url
        .query_pairs()
        .find(|(key, _)| key == "action")
        .map(|(_, value)| value.into_owned());

    match action {
        Some(inner) if !inner.trim().is_empty() => Ok(Matched::Interstitial(inner)),
        _ => Err(ActionError::new(
            ErrorCode::InvalidUrl,
            "interstitial URL is missing its action parameter",
            false,
        )
        .with_detail("url", raw)),
    }
}

/// Resolve any accepted encoding into one [`CanonicalUrl`].
///
/// Idempotent across encodings: every form of the same logical endpoint
/// yields the identical canonical URL.
pub fn resolve(raw: &str) -> Result<CanonicalUrl, ActionError> {
    resolve_bounded(raw.trim(), false)
}

fn resolve_bounded(raw: &str, interstitial_seen: bool) -> Result<CanonicalUrl, ActionError> {
    match match_encoding(raw)? {
        // Marker stripping strictly shrinks the input, so this recursion
        // terminates even on pathological stacked markers.
        Matched::Marker(rest) => resolve_bounded(&rest, interstitial_seen),
        Matched::Interstitial(inner) => {
            if interstitial_seen {
                return Err(ActionError::new(
                    ErrorCode::InvalidUrl,
                    "interstitial URL wraps another interstitial URL",
                    false,
                )
                .with_detail("url", raw));
            }
            resolve_bounded(&inner, true)
        }
        Matched::NoMatch => CanonicalUrl::parse(raw),
    }
}
