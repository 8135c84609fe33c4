//! Glob Pattern Module
//!
//! Redis `KEYS`-style globs, translated to anchored regexes so the near cache
//! invalidates exactly the keys the far cache enumerates.
//!
//! Translation follows the Redis matcher:
//! - `*` any run of characters, `?` any single character
//! - `[abc]`, `[a-z]`, `[^a]`; only `^` negates, `!` is an ordinary member
//! - `[` with no closing `]` is a class running to the end of the pattern
//! - `\x` escapes `x`, inside or outside a class; a trailing `\` is literal

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

/// Compiled patterns kept before the cache is flushed.
const PATTERN_CACHE_CAPACITY: usize = 256;

fn pattern_cache() -> &'static RwLock<HashMap<String, Regex>> {
    static CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns true if `text` matches the glob `pattern`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    compiled(pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Compiled regex for `pattern`, cached across calls.
fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(re) = pattern_cache().read().get(pattern) {
        return Some(re.clone());
    }

    let re = match Regex::new(&glob_to_regex(pattern)) {
        Ok(re) => re,
        Err(e) => {
            debug!(pattern = %pattern, error = %e, "glob did not compile");
            return None;
        }
    };

    let mut cache = pattern_cache().write();
    if cache.len() >= PATTERN_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(pattern.to_string(), re.clone());
    Some(re)
}

/// Translates a Redis glob into an anchored regex source string.
pub fn glob_to_regex(pattern: &str) -> String {
    let p: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < p.len() {
        match p[i] {
            '*' => {
                while i + 1 < p.len() && p[i + 1] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let (class, next) = translate_class(&p, i + 1);
                out.push_str(&class);
                i = next;
                continue;
            }
            '\\' if i + 1 < p.len() => {
                i += 1;
                push_literal(&mut out, p[i]);
            }
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Translates the class body starting at `start` (just past `[`).
/// Returns the regex fragment and the index after the class.
fn translate_class(p: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let negate = p.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut ranges: Vec<(char, char)> = Vec::new();
    loop {
        match p.get(i) {
            None => break,
            Some(']') => {
                i += 1;
                break;
            }
            Some('\\') if i + 1 < p.len() => {
                ranges.push((p[i + 1], p[i + 1]));
                i += 2;
            }
            Some(&lo) if i + 2 < p.len() && p[i + 1] == '-' => {
                let hi = p[i + 2];
                ranges.push(if lo <= hi { (lo, hi) } else { (hi, lo) });
                i += 3;
            }
            Some(&c) => {
                ranges.push((c, c));
                i += 1;
            }
        }
    }

    let fragment = match (ranges.is_empty(), negate) {
        // `[]` matches nothing, `[^]` matches any one character
        (true, false) => "$.".to_string(),
        (true, true) => ".".to_string(),
        _ => {
            let mut class = String::from(if negate { "[^" } else { "[" });
            for (lo, hi) in ranges {
                if lo == hi {
                    class.push_str(&format!("\\x{{{:X}}}", lo as u32));
                } else {
                    class.push_str(&format!("\\x{{{:X}}}-\\x{{{:X}}}", lo as u32, hi as u32));
                }
            }
            class.push(']');
            class
        }
    };
    (fragment, i)
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
