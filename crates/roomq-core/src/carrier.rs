//! Token carriers: where an inbound token is read from and how the outbound
//! cookie looks.
//!
//! Precedence: the `noq_t` query parameter (first entry from the issuer)
//! wins over the room cookie (subsequent requests).

use std::fmt;

use crate::redirect::TOKEN_PARAM;

/// Default cookie name prefix; the room id is appended.
pub const DEFAULT_COOKIE_PREFIX: &str = "be_roomq_t_";
/// Cookie lifetime written on every validate (12h).
pub const DEFAULT_COOKIE_TTL_SECS: u64 = 12 * 60 * 60;

/// Cookie name for a room.
pub fn cookie_name(prefix: &str, room_id: &str) -> String {
    format!("{prefix}{room_id}")
}

/// `noq_t` value from the query string of `url`, percent-decoded.
pub fn token_from_url(url: &str) -> Option<String> {
    let head = url.split_once('#').map_or(url, |(h, _)| h);
    let (_, query) = head.split_once('?')?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    pairs
        .into_iter()
        .find(|(k, _)| k == TOKEN_PARAM)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Cookie value for `name` from a raw `Cookie` request header.
pub fn token_from_cookie_header(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the inbound token by carrier precedence.
pub fn inbound_token(current_url: &str, cookie_header: Option<&str>, cookie_name: &str) -> Option<String> {
    token_from_url(current_url)
        .or_else(|| cookie_header.and_then(|h| token_from_cookie_header(h, cookie_name)))
}

/// A pending `Set-Cookie` write for the host response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: &'static str,
    pub max_age_secs: u64,
    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
}

impl SetCookie {
    pub fn new(name: String, value: String, ttl_secs: u64, now: i64) -> Self {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Self {
            name,
            value,
            path: "/",
            max_age_secs: ttl_secs,
            expires_at: now.saturating_add(ttl),
        }
    }

    /// Header value suitable for `Set-Cookie`.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path={}",
            self.name, self.value, self.max_age_secs, self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_token_takes_precedence() {
        let name = cookie_name(DEFAULT_COOKIE_PREFIX, "room-1");
        assert_eq!(name, "be_roomq_t_room-1");
        let cookies = "a=1; be_roomq_t_room-1=from-cookie";

        let t = inbound_token("https://s/p?x=1&noq_t=from-query", Some(cookies), &name);
        assert_eq!(t.as_deref(), Some("from-query"));

        let t = inbound_token("https://s/p?x=1", Some(cookies), &name);
        assert_eq!(t.as_deref(), Some("from-cookie"));

        assert_eq!(inbound_token("https://s/p", None, &name), None);
    }

    #[test]
    fn query_token_is_decoded_and_exact() {
        assert_eq!(token_from_url("https://s/?noq_t=a%2Eb.c").as_deref(), Some("a.b.c"));
        assert_eq!(token_from_url("https://s/?xnoq_t=a"), None);
        assert_eq!(token_from_url("https://s/?noq_t="), None);
        assert_eq!(token_from_url("https://s/#?noq_t=a"), None);
    }

    #[test]
    fn cookie_lookup_ignores_other_rooms() {
        let h = "be_roomq_t_other=zzz;be_roomq_t_r=\"tok\"";
        assert_eq!(token_from_cookie_header(h, "be_roomq_t_r").as_deref(), Some("tok"));
        assert_eq!(token_from_cookie_header(h, "be_roomq_t_x"), None);
    }

    #[test]
    fn set_cookie_header() {
        let c = SetCookie::new("n".into(), "v".into(), DEFAULT_COOKIE_TTL_SECS, 1_000);
        assert_eq!(c.expires_at, 1_000 + 43_200);
        assert_eq!(c.header_value(), "n=v; Max-Age=43200; Path=/");
    }
}
