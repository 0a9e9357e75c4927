//! Request signing.
//!
//! Every request carries a signature built from a three-stage HMAC-SHA256
//! chain. Each stage's digest is the key of the next stage:
//!
//! 1. key = token key, message = `method + path`
//! 2. key = digest 1, message = request date truncated to the hour
//!    (`2026-10-16T11`)
//! 3. key = digest 2, message = request body bytes, or nothing
//!
//! The third stage always runs. A request without a body is signed as
//! `HMAC(digest 2, "")`; the service verifies it the same way.
//!
//! The `Signature` header is the standard base64 encoding of digest 3.

use crate::config::Credential;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Display;

type HmacSha256 = Hmac<Sha256>;

/// Size of an HMAC-SHA256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Characters of the request date that are signed (date plus hour).
pub const SIGNED_DATE_LEN: usize = 13;

/// Scheme prefix of the `Authorization` header.
pub const AUTH_SCHEME: &str = "bhesignature";

pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_PREFER: &str = "prefer";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_REQUEST_DATE: &str = "RequestDate";
pub const HEADER_SIGNATURE: &str = "Signature";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Value of the `prefer` header (server-side wait in seconds).
pub const PREFER_WAIT: &str = "60";

/// One HMAC-SHA256 over `message` keyed with `key`.
#[must_use]
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Runs the HMAC chain and returns the digest of every stage, in order.
///
/// Stage `i` is keyed with the digest of stage `i - 1` (stage 0 with `key`).
#[must_use]
pub fn chain_stages<const N: usize>(key: &[u8], parts: [&[u8]; N]) -> [[u8; DIGEST_SIZE]; N] {
    let mut stages = [[0u8; DIGEST_SIZE]; N];
    for (i, part) in parts.iter().enumerate() {
        let digest = match i.checked_sub(1) {
            Some(prev) => hmac_sha256(&stages[prev], part),
            None => hmac_sha256(key, part),
        };
        stages[i] = digest;
    }
    stages
}

/// Formats a timestamp the way the `RequestDate` header expects:
/// RFC 3339 with microseconds and a numeric offset.
#[must_use]
pub fn format_request_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The current local time as a `RequestDate` value.
#[must_use]
pub fn request_date_now() -> String {
    format_request_date(&Local::now())
}

/// The part of a request date that goes into the signature.
#[must_use]
pub fn signed_date_prefix(request_date: &str) -> &str {
    request_date.get(..SIGNED_DATE_LEN).unwrap_or(request_date)
}

/// Inputs to one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub request_date: &'a str,
    pub body: Option<&'a [u8]>,
}

impl SigningInput<'_> {
    /// The three messages of the chain.
    #[must_use]
    pub fn message_parts(&self) -> [Vec<u8>; 3] {
        [
            format!("{}{}", self.method, self.path).into_bytes(),
            signed_date_prefix(self.request_date).as_bytes().to_vec(),
            self.body.map(<[u8]>::to_vec).unwrap_or_default(),
        ]
    }

    /// Raw signature digest.
    #[must_use]
    pub fn digest(&self, secret_key: &[u8]) -> [u8; DIGEST_SIZE] {
        let [method_path, date, body] = self.message_parts();
        let parts = [&method_path, &date, &body].map(Vec::as_slice);
        let [_, _, last] = chain_stages(secret_key, parts);
        last
    }

    /// Base64 signature as sent in the `Signature` header.
    #[must_use]
    pub fn signature(&self, secret_key: &[u8]) -> String {
        STANDARD.encode(self.digest(secret_key))
    }
}

/// A request with its signature and full header set. Built once per
/// attempt and never reused.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub request_date: String,
    pub body: Option<Vec<u8>>,
    pub signature: String,
    pub headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    /// Returns the value of a header by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Signs requests for one credential.
#[derive(Debug, Clone, Copy)]
pub struct RequestSigner<'a> {
    credential: &'a Credential,
    user_agent: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credential: &'a Credential, user_agent: &'a str) -> Self {
        Self {
            credential,
            user_agent,
        }
    }

    /// Signs a request stamped with the current time.
    #[must_use]
    pub fn sign(&self, method: &str, path: &str, body: Option<Vec<u8>>) -> SignedRequest {
        self.sign_at(method, path, body, request_date_now())
    }

    /// Signs a request with an explicit `RequestDate` value.
    #[must_use]
    pub fn sign_at(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
        request_date: String,
    ) -> SignedRequest {
        let signature = SigningInput {
            method,
            path,
            request_date: &request_date,
            body: body.as_deref(),
        }
        .signature(self.credential.secret_key.as_bytes());

        let headers = vec![
            (HEADER_USER_AGENT, self.user_agent.to_string()),
            (HEADER_PREFER, PREFER_WAIT.to_string()),
            (
                HEADER_AUTHORIZATION,
                format!("{AUTH_SCHEME} {}", self.credential.key_id),
            ),
            (HEADER_REQUEST_DATE, request_date.clone()),
            (HEADER_SIGNATURE, signature.clone()),
            (HEADER_CONTENT_TYPE, "application/json".to_string()),
        ];

        SignedRequest {
            method: method.to_string(),
            path: path.to_string(),
            request_date,
            body,
            signature,
            headers,
        }
    }
}
