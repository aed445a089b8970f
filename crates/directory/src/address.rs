//! # Host Address Parser
//!
//! Turns free-form connection strings such as `user:pass@host:port` or
//! `ssh://user@host` into normalized address fields. Pure string handling,
//! no I/O.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use url::Url;

use crate::error::{DirectoryError, DirectoryResult};

/// Scheme assumed when the input carries none
pub const DEFAULT_SCHEME: &str = "ssh";

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddress {
    /// `host` or `host:port`, never with a scheme
    pub addr: String,
    /// Percent-decoded login user, empty when absent
    pub user: String,
    /// Percent-decoded password, empty when absent
    #[serde(skip_serializing)]
    pub password: String,
    /// Host part alone; IPv6 literals keep their brackets
    pub host: String,
    pub port: Option<u16>,
}

impl HostAddress {
    /// `host:port`, filling in `default_port` when the input had none
    pub fn addr_with_port(&self, default_port: u16) -> String {
        match self.port {
            Some(_) => self.addr.clone(),
            None => format!("{}:{}", self.host, default_port),
        }
    }

    pub fn password(&self) -> Option<&str> {
        (!self.password.is_empty()).then_some(self.password.as_str())
    }
}

/// Parse a connection string
///
/// `ssh://` is prepended when `raw` contains no `://`, so `parse(x)` and
/// `parse("ssh://" + x)` agree.
pub fn parse(raw: &str) -> DirectoryResult<HostAddress> {
    check_percent_escapes(raw)?;

    let with_scheme: Cow<'_, str> = if raw.contains("://") {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(format!("{DEFAULT_SCHEME}://{raw}"))
    };

    let url = Url::parse(&with_scheme).map_err(|e| DirectoryError::malformed(raw, e))?;

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(DirectoryError::malformed(raw, "missing host")),
    };
    // `Url::port` hides a special scheme's default port even when written out
    let port = url.port().or_else(|| {
        url.port_or_known_default()
            .filter(|known| written_port(&with_scheme) == Some(*known))
    });
    let addr = match port {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };

    let user = decode_component(raw, url.username())?;
    let password = match url.password() {
        Some(password) => decode_component(raw, password)?,
        None => String::new(),
    };

    Ok(HostAddress {
        addr,
        user,
        password,
        host,
        port,
    })
}

/// Normalize a bare `host[:port]` to `host:port`
///
/// User info is rejected here; it belongs in the host's `user` field.
pub fn normalize_addr(raw: &str, default_port: u16) -> DirectoryResult<String> {
    let parsed = parse(raw)?;
    if !parsed.user.is_empty() || !parsed.password.is_empty() {
        return Err(DirectoryError::malformed(
            raw,
            "address must not carry user credentials",
        ));
    }
    Ok(parsed.addr_with_port(default_port))
}

/// Port spelled out in the authority of `url`, if any
fn written_port(url: &str) -> Option<u16> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let port = match host_port.rfind(']') {
        Some(end) => host_port[end + 1..].strip_prefix(':')?,
        None => host_port.rsplit_once(':')?.1,
    };
    port.parse().ok()
}

fn decode_component(raw: &str, component: &str) -> DirectoryResult<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| DirectoryError::malformed(raw, format!("invalid percent-encoded text: {e}")))
}

// The url crate passes stray `%` through untouched
fn check_percent_escapes(raw: &str) -> DirectoryResult<()> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(DirectoryError::malformed(
                    raw,
                    format!("malformed percent escape at byte {i}"),
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
