//! Optional basic-auth gate at the edge. Grounded in the teacher's
//! `FromRequest`-guard pattern (`auth.rs`'s `ManageToken`), adapted from
//! bearer/API-key extraction to HTTP Basic, and from a plain `sha2` digest
//! compare to a constant-time one since this guard stands directly in front
//! of the password rather than a bearer token a client already holds.

use base64::Engine;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::AppConfig;
use crate::models::PasswordProtection;

/// Present on every request; denies the request in `from_request` if
/// `PASSWORD_PROTECTION` is configured and the `Authorization` header
/// doesn't match. A unit struct rather than a bool so routes can't forget
/// to require it — adding it as a parameter is the only way in.
pub struct BasicAuthGuard;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BasicAuthGuard {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<AppConfig>() {
            Some(c) => c,
            None => return Outcome::Error((Status::InternalServerError, "config not managed")),
        };

        let Some(expected) = &config.password_protection else {
            return Outcome::Success(BasicAuthGuard);
        };

        let header = request.headers().get_one("Authorization");
        if let Some(provided) = header.and_then(|h| parse_basic(h)) {
            if credentials_match(expected, &provided) {
                return Outcome::Success(BasicAuthGuard);
            }
        }
        Outcome::Error((Status::Unauthorized, "Missing or invalid credentials"))
    }
}

/// Parse `Authorization: Basic <base64(user:pass)>` into `(user, pass)`.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn credentials_match(expected: &PasswordProtection, provided: &(String, String)) -> bool {
    digest(&expected.user).ct_eq(&digest(&provided.0)).into()
        && digest(&expected.pass).ct_eq(&digest(&provided.1)).into()
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_decodes_user_and_pass() {
        let (user, pass) = parse_basic("Basic YWRtaW46c2VjcmV0").unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "secret");
    }

    #[test]
    fn parse_basic_rejects_non_basic_schemes() {
        assert!(parse_basic("Bearer abc123").is_none());
    }

    #[test]
    fn credentials_match_requires_both_user_and_pass() {
        let expected = PasswordProtection {
            user: "admin".into(),
            pass: "secret".into(),
        };
        assert!(credentials_match(&expected, &("admin".into(), "secret".into())));
        assert!(!credentials_match(&expected, &("admin".into(), "wrong".into())));
        assert!(!credentials_match(&expected, &("intruder".into(), "secret".into())));
    }
}
