//! Structured sign-in challenge messages.
//!
//! The message the wallet signs carries four `Key: value` lines:
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account.
//! Domain: example.com
//! Address: 0x...
//! Chain ID: 1
//! Nonce: ...
//! ```
//!
//! Parsing is tolerant: keys are case-insensitive, whitespace around keys and
//! values is ignored, line order does not matter, and each field is extracted
//! on its own so a caller can report exactly which one is missing.

use super::Address;

const PREAMBLE: &str = "wants you to sign in with your Ethereum account.";

/// A fully parsed challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeFields {
    pub domain: String,
    pub address: Address,
    pub chain_id: u64,
    pub nonce: String,
}

/// Per-field parse result. A field that no line matched stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChallenge {
    pub domain: Option<String>,
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub nonce: Option<String>,
}

impl ParsedChallenge {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.domain.is_none() {
            missing.push("domain");
        }
        if self.address.is_none() {
            missing.push("address");
        }
        if self.chain_id.is_none() {
            missing.push("chain_id");
        }
        if self.nonce.is_none() {
            missing.push("nonce");
        }
        missing
    }

    /// Require all four fields.
    pub fn complete(self) -> Result<ChallengeFields, Vec<&'static str>> {
        match self {
            ParsedChallenge {
                domain: Some(domain),
                address: Some(address),
                chain_id: Some(chain_id),
                nonce: Some(nonce),
            } => Ok(ChallengeFields {
                domain,
                address,
                chain_id,
                nonce,
            }),
            partial => Err(partial.missing_fields()),
        }
    }
}

/// Lowercase a host and strip a trailing `:port`.
pub fn normalize_domain(raw: &str) -> String {
    let host = raw.trim().to_ascii_lowercase();
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            name.to_string()
        }
        _ => host,
    }
}

/// Render the canonical challenge message.
pub fn build(domain: &str, address: &Address, chain_id: u64, nonce: &str) -> String {
    let domain = normalize_domain(domain);
    format!(
        "{domain} {PREAMBLE}\n\
         Domain: {domain}\n\
         Address: {address}\n\
         Chain ID: {chain_id}\n\
         Nonce: {nonce}"
    )
}

fn is_nonce_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '=' | '_' | '-' | ':' | '+' | '/')
}

/// Extract whichever fields are present. The first valid line for a field wins.
pub fn parse(text: &str) -> ParsedChallenge {
    let mut parsed = ParsedChallenge::default();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key: String = key
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "domain" if parsed.domain.is_none() => {
                parsed.domain = Some(normalize_domain(value));
            }
            "address" if parsed.address.is_none() => {
                parsed.address = Address::parse(value).ok();
            }
            "chainid" if parsed.chain_id.is_none() => {
                if value.bytes().all(|b| b.is_ascii_digit()) {
                    parsed.chain_id = value.parse().ok();
                }
            }
            "nonce" if parsed.nonce.is_none() => {
                if value.chars().all(is_nonce_char) {
                    parsed.nonce = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    parsed
}
