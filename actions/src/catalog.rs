//! Static catalog of well-known action services.
//!
//! Maps human-friendly service identifiers to canonical endpoint
//! templates so callers can build an Action URL from a vault slug or a
//! token pair without knowing raw paths. Construction is pure string
//! templating; no network access. The built URL is handed to the
//! pipeline as an ordinary raw URL.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{ActionError, ErrorCode};

/// Coarse grouping used by the `services` listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Staking,
    Lending,
    Liquidity,
    Swap,
}

impl ServiceCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceCategory::Staking => "staking",
            ServiceCategory::Lending => "lending",
            ServiceCategory::Liquidity => "liquidity",
            ServiceCategory::Swap => "swap",
        }
    }
}

/// One catalog entry. `endpoint` is a template whose `{name}` segments
/// are filled from caller-supplied parameters. Endpoint quirks (an
/// amount pre-baked into the path rather than the POST body) live here,
/// keeping the protocol client protocol-pure.
#[derive(Debug, Clone, Copy)]
pub struct Service {
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: ServiceCategory,
    pub endpoint: &'static str,
}

/// Well-known services, in listing order.
pub const SERVICES: &[Service] = &[
    Service {
        id: "jito",
        display_name: "Jito",
        category: ServiceCategory::Staking,
        endpoint: "https://jito.dial.to/stake?amount={amount}",
    },
    Service {
        id: "sanctum",
        display_name: "Sanctum",
        category: ServiceCategory::Staking,
        endpoint: "https://sanctum.dial.to/trade/SOL-{lst}?amount={amount}",
    },
    Service {
        id: "kamino",
        display_name: "Kamino",
        category: ServiceCategory::Lending,
        endpoint: "https://kamino.dial.to/lend/{market}?amount={amount}",
    },
    Service {
        id: "meteora",
        display_name: "Meteora",
        category: ServiceCategory::Liquidity,
        endpoint: "https://meteora.dial.to/pool/{pool}?amount={amount}",
    },
    Service {
        id: "jupiter",
        display_name: "Jupiter",
        category: ServiceCategory::Swap,
        endpoint: "https://jup.ag/api/blinks/swap/{input}-{output}?amount={amount}",
    },
];

/// Look up a catalog entry by identifier.
#[must_use]
pub fn find(id: &str) -> Option<&'static Service> {
    SERVICES.iter().find(|s| s.id == id)
}

/// Build an Action URL for a catalog service.
///
/// Fails with [`ErrorCode::UnknownService`] for an unrecognized id and
/// [`ErrorCode::MissingTemplateParameter`] when a `{name}` segment has
/// no matching parameter.
pub fn build_url(id: &str, params: &BTreeMap<String, String>) -> Result<String, ActionError> {
    let service = find(id).ok_or_else(|| {
        ActionError::new(
            ErrorCode::UnknownService,
            format!("no catalog entry for service \"{id}\""),
            false,
        )
        .with_detail("service", id)
    })?;

    expand(service.endpoint, params)
}

fn expand(template: &str, params: &BTreeMap<String, String>) -> Result<String, ActionError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut in_query = false;

    while let Some(open) = rest.find('{') {
        let literal = &rest[..open];
        if literal.contains('?') {
            in_query = true;
        }
        out.push_str(literal);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(ActionError::new(
                ErrorCode::Internal,
                "malformed endpoint template",
                false,
            )
            .with_detail("template", template));
        };
        let name = &after[..close];
        let value = params.get(name).ok_or_else(|| {
            ActionError::new(
                ErrorCode::MissingTemplateParameter,
                format!("endpoint template requires parameter \"{name}\""),
                false,
            )
            .with_detail("parameter", name)
            .with_detail("template", template)
        })?;
        out.push_str(&encode_value(value, in_query));
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Percent-encode a parameter value so reserved characters (`&`, `#`,
/// `=`, spaces) cannot change the URL's structure. Query position uses
/// form encoding; path position keeps spaces as `%20`.
fn encode_value(value: &str, in_query: bool) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    if in_query {
        encoded
    } else {
        encoded.replace('+', "%20")
    }
}
