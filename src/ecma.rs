//! ECMA-262 regular expressions, as used by `pattern`, `patternProperties`
//! and the `regex` format.
//!
//! Patterns are rewritten where ECMA-262 and Rust syntax disagree, then
//! compiled with `fancy_regex`, which adds look-around and backreferences.

use fancy_regex::Regex;

const DIGIT: &str = "0-9";
const WORD: &str = "A-Za-z0-9_";
const SPACE: &str = "\\t\\n\\x{0B}\\x{0C}\\r \\x{A0}\\x{1680}\\x{2000}-\\x{200A}\\x{2028}\\x{2029}\\x{202F}\\x{205F}\\x{3000}\\x{FEFF}";
const NOT_LINE_TERMINATOR: &str = "[^\\n\\r\\x{2028}\\x{2029}]";

/// A compiled pattern that remembers the text it was written as.
#[derive(Debug, Clone)]
pub(crate) struct EcmaRegex {
    source: String,
    regex: Regex,
}

impl EcmaRegex {
    pub(crate) fn new(source: &str) -> Result<EcmaRegex, String> {
        let regex = Regex::new(&translate(source)?).map_err(|error| error.to_string())?;
        Ok(EcmaRegex {
            source: source.to_owned(),
            regex,
        })
    }

    /// Search anywhere in `text`. A search that gives up on its
    /// backtracking limit counts as no match.
    pub(crate) fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text).unwrap_or(false)
    }

    /// The pattern as written in the schema.
    pub(crate) fn as_str(&self) -> &str {
        &self.source
    }
}

fn class(escape: char) -> &'static str {
    match escape.to_ascii_lowercase() {
        'd' => DIGIT,
        'w' => WORD,
        _ => SPACE,
    }
}

/// Rewrite ECMA-262 syntax into the dialect `fancy_regex` reads.
fn translate(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "pattern ends with a backslash".to_owned())?;
                match escaped {
                    'd' | 'w' | 's' if in_class => out.push_str(class(escaped)),
                    'd' | 'w' | 's' => {
                        out.push('[');
                        out.push_str(class(escaped));
                        out.push(']');
                    }
                    // Rust classes nest, so this works inside a class too.
                    'D' | 'W' | 'S' => {
                        out.push_str("[^");
                        out.push_str(class(escaped));
                        out.push(']');
                    }
                    'b' if in_class => out.push_str("\\x{08}"),
                    'c' => match chars.next() {
                        Some(letter) if letter.is_ascii_alphabetic() => {
                            out.push_str(&format!("\\x{{{:X}}}", letter as u32 % 32));
                        }
                        _ => return Err("\\c must be followed by a letter".to_owned()),
                    },
                    'u' => out.push_str(&format!("\\x{{{}}}", unicode_escape(&mut chars)?)),
                    '/' => out.push('/'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                let negated = chars.peek() == Some(&'^');
                if negated {
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    // `[]` matches nothing and `[^]` matches anything.
                    chars.next();
                    in_class = false;
                    out.push_str(if negated { "[\\s\\S]" } else { "(?!)" });
                } else {
                    out.push_str(if negated { "[^" } else { "[" });
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            // Literal inside ECMA classes, operators inside Rust ones.
            '[' | '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '.' if !in_class => out.push_str(NOT_LINE_TERMINATOR),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// The hex digits of `\uXXXX` or `\u{X...}`, after the `u`.
fn unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, String> {
    let digits: String = if chars.peek() == Some(&'{') {
        chars.next();
        chars.by_ref().take_while(|c| *c != '}').collect()
    } else {
        chars.by_ref().take(4).collect()
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid unicode escape \\u{}", digits));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matches(pattern: &str, text: &str) -> bool {
        EcmaRegex::new(pattern).unwrap().is_match(text)
    }

    #[test]
    fn character_classes_are_ascii() {
        assert!(matches("^\\d+$", "0123"));
        assert!(!matches("^\\d+$", "\u{0663}"));
        assert!(matches("^\\w+$", "a_Z9"));
        assert!(!matches("^\\w$", "é"));
        assert!(matches("^[\\d.]+$", "1.5"));
        assert!(matches("^\\D$", "\u{0663}"));
        assert!(matches("^\\s$", "\u{FEFF}"));
        assert!(!matches("^\\S$", "\u{3000}"));
    }

    #[test]
    fn look_around_and_backreferences() {
        assert!(matches("^(?=.*[A-Z]).+$", "abC"));
        assert!(!matches("^(?=.*[A-Z]).+$", "abc"));
        assert!(matches("^(?!foo)", "bar"));
        assert!(matches("^(a+)b\\1$", "aabaa"));
        assert!(!matches("^(a+)b\\1$", "aaba"));
    }

    #[test]
    fn ecma_only_syntax() {
        assert!(matches("^\\u0041$", "A"));
        assert!(matches("^\\u{1F600}$", "\u{1F600}"));
        assert!(matches("^\\cJ$", "\n"));
        assert!(matches("^a\\/b$", "a/b"));
        assert!(matches("^[a[]$", "["));
        assert!(!matches("[]", "a"));
        assert!(matches("^[^]$", "\n"));
        assert!(!matches("^.$", "\u{2028}"));
    }

    #[test]
    fn keeps_the_written_pattern() {
        assert_eq!(EcmaRegex::new("^\\d$").unwrap().as_str(), "^\\d$");
        assert!(EcmaRegex::new("(unclosed").is_err());
        assert!(EcmaRegex::new("a\\").is_err());
    }
}
