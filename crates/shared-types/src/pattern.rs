//! # Wildcard Patterns
//!
//! Glob-style matching shared by the event bus (subscription patterns), the
//! store (key queries) and the telemetry collector (threshold and metric
//! filters).
//!
//! ```text
//! "sys:*"          matches  "sys:started", "sys:stopped"
//! "sys:*"          rejects  "syslog"
//! "latency.*.max"  matches  "latency.api.db.max"
//! "cpu.?"          matches  "cpu.0"
//! ```

/// Returns true if the pattern contains a wildcard metacharacter.
#[must_use]
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Match `name` against a glob `pattern`.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one character. Everything else matches literally.
#[must_use]
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0usize, 0usize);
    // Position of the last `*` seen and the name index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(c) if *c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n + 1;
                    backtrack = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match against an optional pattern; `None` matches everything.
#[must_use]
pub fn matches_filter(pattern: Option<&str>, name: &str) -> bool {
    pattern.map_or(true, |p| wildcard_match(p, name))
}
