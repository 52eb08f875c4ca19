//! Path-aware glob matching for product destinations.
//!
//! Patterns follow shell `fnmatch` rules with three extensions always on:
//! brace alternation (`{a,b}`), dotfile matching (`*` matches a leading
//! `.`), and path-aware wildcards (`*` and `?` never cross `/`, while a
//! leading `**/` segment matches zero or more directories). Patterns are
//! compiled once into an anchored [`Regex`].

use regex::Regex;

use crate::error::{Result, StevedoreError};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self> {
        let source = translate(pattern);
        let regex = Regex::new(&source).map_err(|source| StevedoreError::InvalidGlob {
            glob: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut brace_depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let segment_start = i == 0 || matches!(chars[i - 1], '/' | '{' | ',');
        match c {
            '*' if segment_start
                && chars.get(i + 1) == Some(&'*')
                && chars.get(i + 2) == Some(&'/') =>
            {
                out.push_str("(?:[^/]*/)*");
                i += 3;
                continue;
            }
            '*' => {
                // Runs of stars outside a `**/` segment behave like one star.
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            ',' if brace_depth > 0 => out.push('|'),
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push_str(&regex::escape(&next.to_string()));
                    i += 1;
                } else {
                    out.push_str(r"\\");
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    // Unbalanced braces are closed so the regex still compiles.
    for _ in 0..brace_depth {
        out.push(')');
    }
    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!' | '^')) {
        i += 1;
    }
    // A `]` right after the opening bracket is a literal member.
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn push_class(out: &mut String, body: &[char]) {
    let (negated, members) = match body.first() {
        Some('!' | '^') => (true, &body[1..]),
        _ => (false, body),
    };

    let mut escaped = String::new();
    for &c in members {
        match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }

    if negated {
        out.push_str(&format!("[^{escaped}/]"));
    } else {
        out.push_str(&format!("[{escaped}&&[^/]]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        Glob::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_star_stays_within_segment() {
        assert!(matches("*.json", "a.json"));
        assert!(!matches("*.json", "dir/a.json"));
        assert!(matches("png/*", "png/foo.json"));
        assert!(!matches("png/*", "png/deep/foo.json"));
    }

    #[test]
    fn test_double_star_matches_zero_or_more_dirs() {
        assert!(matches("**/*.json", "bar2.json"));
        assert!(matches("**/*.json", "bar/1.json"));
        assert!(matches("**/*.json", "a/b/c/1.json"));
        assert!(matches("src/**/*", "src/foo.json"));
        assert!(matches("src/**/*", "src/nested/foo.json"));
        assert!(!matches("src/**/*", "other/foo.json"));
        assert!(matches("**/foo.json", "png/foo.json"));
    }

    #[test]
    fn test_trailing_double_star_acts_like_star() {
        assert!(matches("jpeg/**", "jpeg/a.jpg"));
        assert!(!matches("jpeg/**", "jpeg/a/b.jpg"));
    }

    #[test]
    fn test_dotfiles_match() {
        assert!(matches("*", ".hidden"));
        assert!(matches("**/*", ".git/config"));
    }

    #[test]
    fn test_braces() {
        assert!(matches("files/*.{xml,yml,json}", "files/a.yml"));
        assert!(!matches("files/*.{xml,yml,json}", "files/a.txt"));
        assert!(matches("{lib,spec}/**/*.rb", "spec/open_spec.rb"));
        assert!(matches("a,b", "a,b"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(matches("file?.txt", "file1.txt"));
        assert!(!matches("file?.txt", "file/.txt"));
        assert!(matches("[abc].txt", "b.txt"));
        assert!(!matches("[abc].txt", "d.txt"));
        assert!(matches("[!abc].txt", "d.txt"));
        assert!(matches("[a-c]x", "bx"));
        assert!(matches("[", "["));
    }

    #[test]
    fn test_escapes_and_literals() {
        assert!(matches(r"\*.txt", "*.txt"));
        assert!(!matches(r"\*.txt", "a.txt"));
        assert!(matches("a+b(c).txt", "a+b(c).txt"));
    }
}
