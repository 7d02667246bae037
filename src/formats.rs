//! Checks behind the `format` keyword.

use crate::ecma::EcmaRegex;
use chrono::{DateTime, NaiveDate};
use json_pointer::JsonPointer;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use url::Url;

/// A compiled format assertion.
#[derive(Clone, Copy)]
pub(crate) struct FormatCheck(fn(&str) -> bool);

impl FormatCheck {
    pub(crate) fn holds(self, value: &str) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for FormatCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormatCheck")
    }
}

/// Look up the check for a format name. Unknown formats have none.
pub(crate) fn checker(name: &str) -> Option<FormatCheck> {
    let check: fn(&str) -> bool = match name {
        "date" => is_date,
        "date-time" => is_date_time,
        "time" => is_time,
        "duration" => is_duration,
        "email" => |s| is_email(s, false),
        "idn-email" => |s| is_email(s, true),
        "hostname" => |s| is_hostname(s, false),
        "idn-hostname" => |s| is_hostname(s, true),
        "ipv4" => |s| Ipv4Addr::from_str(s).is_ok(),
        "ipv6" => |s| Ipv6Addr::from_str(s).is_ok(),
        "uri" => |s| s.is_ascii() && is_iri(s),
        "iri" => is_iri,
        "uri-reference" => |s| s.is_ascii() && is_iri_reference(s),
        "iri-reference" => is_iri_reference,
        "uri-template" => is_uri_template,
        "json-pointer" => is_json_pointer,
        "relative-json-pointer" => is_relative_json_pointer,
        "regex" => |s| EcmaRegex::new(s).is_ok(),
        "uuid" => is_uuid,
        _ => return None,
    };
    Some(FormatCheck(check))
}

fn is_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
        && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_time(s: &str) -> bool {
    // Only the time part varies; borrow a fixed date to reuse the RFC 3339
    // parser.
    s.len() >= 9 && s.as_bytes()[2] == b':' && is_date_time(&format!("1970-01-01T{}", s))
}

fn is_duration(s: &str) -> bool {
    let rest = match s.strip_prefix('P') {
        Some(rest) if !rest.is_empty() => rest,
        _ => return false,
    };
    let (date, time) = match rest.find('T') {
        Some(at) => (&rest[..at], Some(&rest[at + 1..])),
        None => (rest, None),
    };
    if let Some(weeks) = date.strip_suffix('W') {
        return time.is_none() && !weeks.is_empty() && weeks.bytes().all(|b| b.is_ascii_digit());
    }
    let date_ok = components(date, &['Y', 'M', 'D']);
    let time_ok = match time {
        Some(time) => !time.is_empty() && components(time, &['H', 'M', 'S']),
        None => true,
    };
    date_ok && time_ok && (time.is_some() || !date.is_empty())
}

/// `1Y2M3D`-style runs: digits followed by designators, in order, each at
/// most once.
fn components(s: &str, designators: &[char]) -> bool {
    let mut next = 0;
    let mut digits = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits += 1;
            continue;
        }
        match designators[next..].iter().position(|&d| d == c) {
            Some(offset) if digits > 0 => {
                next += offset + 1;
                digits = 0;
            }
            _ => return false,
        }
    }
    digits == 0
}

fn is_email(s: &str, international: bool) -> bool {
    let at = match s.rfind('@') {
        Some(at) => at,
        None => return false,
    };
    let (local, domain) = (&s[..at], &s[at + 1..]);
    if local.is_empty()
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || local.chars().any(char::is_whitespace)
        || (!international && !local.is_ascii())
    {
        return false;
    }
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return match literal.strip_prefix("IPv6:") {
            Some(v6) => Ipv6Addr::from_str(v6).is_ok(),
            None => Ipv4Addr::from_str(literal).is_ok(),
        };
    }
    is_hostname(domain, international)
}

fn is_hostname(s: &str, international: bool) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| {
                    c.is_ascii_alphanumeric()
                        || c == '-'
                        || (international && !c.is_ascii() && c.is_alphanumeric())
                })
        })
}

fn is_iri(s: &str) -> bool {
    !s.chars().any(|c| c.is_whitespace() || c == '\\') && Url::parse(s).is_ok()
}

fn is_iri_reference(s: &str) -> bool {
    if s.chars().any(|c| c.is_whitespace() || c == '\\') {
        return false;
    }
    Url::parse("json-schema:///")
        .and_then(|base| base.join(s))
        .is_ok()
}

fn is_uri_template(s: &str) -> bool {
    let mut open = false;
    for c in s.chars() {
        match c {
            '{' if open => return false,
            '{' => open = true,
            '}' if !open => return false,
            '}' => open = false,
            _ => {}
        }
    }
    !open
}

fn is_json_pointer(s: &str) -> bool {
    s.is_empty()
        || (s.starts_with('/') && s.parse::<JsonPointer<String, Vec<String>>>().is_ok())
}

fn is_relative_json_pointer(s: &str) -> bool {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || (digits > 1 && s.starts_with('0')) {
        return false;
    }
    let rest = &s[digits..];
    rest == "#" || is_json_pointer(rest)
}

fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, value: &str) -> bool {
        checker(name).unwrap().holds(value)
    }

    #[test]
    fn dates_and_times() {
        assert!(check("date", "2020-02-29"));
        assert!(!check("date", "2021-02-29"));
        assert!(!check("date", "2020-2-29"));
        assert!(check("date-time", "1963-06-19T08:30:06.283185Z"));
        assert!(!check("date-time", "1963-06-19"));
        assert!(check("time", "08:30:06+01:00"));
        assert!(!check("time", "8:30:06Z"));
        assert!(check("duration", "P4DT12H30M5S"));
        assert!(check("duration", "P2W"));
        assert!(!check("duration", "PT"));
        assert!(!check("duration", "P1D2Y"));
    }

    #[test]
    fn network() {
        assert!(check("ipv4", "192.168.0.1"));
        assert!(!check("ipv4", "256.0.0.1"));
        assert!(check("ipv6", "::1"));
        assert!(check("hostname", "www.example.com"));
        assert!(!check("hostname", "-a.example.com"));
        assert!(check("email", "joe.bloggs@example.com"));
        assert!(!check("email", "joe..bloggs@example.com"));
        assert!(check("idn-hostname", "실례.테스트"));
        assert!(!check("hostname", "실례.테스트"));
    }

    #[test]
    fn references() {
        assert!(check("uri", "http://example.com/a?b#c"));
        assert!(!check("uri", "/relative"));
        assert!(check("uri-reference", "/relative#frag"));
        assert!(!check("uri-reference", "\\\\WINDOWS\\share"));
        assert!(check("uri-template", "http://example.com/{id}"));
        assert!(!check("uri-template", "http://example.com/{id"));
        assert!(check("json-pointer", "/foo/0"));
        assert!(check("json-pointer", ""));
        assert!(!check("json-pointer", "foo"));
        assert!(check("relative-json-pointer", "1/foo"));
        assert!(check("relative-json-pointer", "0#"));
        assert!(!check("relative-json-pointer", "01/a"));
    }

    #[test]
    fn misc() {
        assert!(check("uuid", "2eb8aa08-aa98-11ea-b4aa-73b441d16380"));
        assert!(!check("uuid", "2eb8aa08aa9811eab4aa73b441d16380"));
        assert!(check("regex", "^a+$"));
        assert!(check("regex", "^(?=.*[A-Z])\\d+$"));
        assert!(!check("regex", "(unclosed"));
        assert!(checker("unknown-format").is_none());
    }
}
