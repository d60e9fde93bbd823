use crate::UrlError;
use regex::Regex;

/// A compiled shell-style URL glob
///
/// Supported syntax:
/// - `**` matches any run of characters, including `/`
/// - `*` matches any run of characters except `/`
/// - `?` matches a single character except `/`
/// - `{a,b}` matches either alternative
/// - `[abc]` / `[!abc]` character classes
///
/// Matching is case-insensitive and anchored at both ends.
#[derive(Debug, Clone)]
pub struct UrlGlob {
    pattern: String,
    regex: Regex,
}

impl UrlGlob {
    /// Compiles a glob pattern
    ///
    /// # Arguments
    ///
    /// * `pattern` - The glob, e.g. `https://example.com/blog/**`
    ///
    /// # Returns
    ///
    /// * `Ok(UrlGlob)` - The compiled glob
    /// * `Err(UrlError)` - The pattern has unbalanced braces or brackets
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::url::UrlGlob;
    ///
    /// let glob = UrlGlob::new("https://example.com/blog/*").unwrap();
    /// assert!(glob.is_match("https://example.com/blog/first-post"));
    /// assert!(!glob.is_match("https://example.com/blog/2024/first-post"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self, UrlError> {
        let source = glob_to_regex(pattern)?;
        let regex = Regex::new(&source)
            .map_err(|e| UrlError::InvalidGlob(format!("{}: {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Returns true if the URL matches this glob
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Returns the original pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Compiles a list of glob patterns
pub fn compile_globs(patterns: &[String]) -> Result<Vec<UrlGlob>, UrlError> {
    patterns.iter().map(|p| UrlGlob::new(p)).collect()
}

/// Returns true if any glob in the list matches the URL
pub fn matches_any(globs: &[UrlGlob], url: &str) -> bool {
    globs.iter().any(|g| g.is_match(url))
}

/// Translates a glob into an anchored, case-insensitive regex source
fn glob_to_regex(pattern: &str) -> Result<String, UrlError> {
    let mut out = String::from("(?i)^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut brace_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    out.push_str(".*");
                    i += 1;
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| {
                        UrlError::InvalidGlob(format!("unclosed '[' in '{}'", pattern))
                    })?;

                out.push('[');
                let mut class = &chars[i + 1..end];
                if class.first() == Some(&'!') {
                    out.push('^');
                    class = &class[1..];
                }
                for &ch in class {
                    if ch == '\\' || ch == '[' || ch == ']' || ch == '^' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
                i = end;
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if brace_depth > 0 {
        return Err(UrlError::InvalidGlob(format!(
            "unclosed '{{' in '{}'",
            pattern
        )));
    }

    out.push('$');
    Ok(out)
}
