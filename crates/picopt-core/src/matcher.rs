//! Asset filters
//!
//! User-supplied match specs (globs, regexes, predicate functions, or
//! lists of them) compile once, at configuration time, into a [`Matcher`]:
//! an ordered rule list evaluated left-to-right with early exit.
//!
//! Combination policy (fixed, deliberately): **first-match-wins OR** over
//! the filename rules, then a single size gate over the content length.
//! A filename matching no rule is rejected; a matching filename whose
//! size falls outside the policy is rejected too.

use regex::Regex;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Filename predicate function
pub type PredicateFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One user-supplied filter before compilation
#[derive(Clone)]
pub enum MatchSpec {
    /// A glob pattern (`"*.png"`, `"images/**/*.jpg"`); bare strings are globs
    Glob(String),
    /// A pre-compiled regular expression tested against the filename
    Regex(Regex),
    /// An arbitrary predicate of the filename
    Predicate(PredicateFn),
}

impl MatchSpec {
    /// Glob filter from a pattern string
    #[inline]
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Regex filter
    #[inline]
    #[must_use]
    pub fn regex(re: Regex) -> Self {
        Self::Regex(re)
    }

    /// Predicate filter
    #[inline]
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }
}

impl Debug for MatchSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glob(p) => f.debug_tuple("Glob").field(p).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Size gate over content length in bytes
///
/// The lower bound is exclusive and the upper bound inclusive: a file of
/// exactly `min` bytes is rejected, one of exactly `max` bytes accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SizePolicy {
    /// Exclusive lower bound
    pub min: u64,
    /// Inclusive upper bound
    pub max: u64,
}

impl SizePolicy {
    /// Build a policy from raw bounds
    #[inline]
    #[must_use]
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Test a content length against the bounds
    #[inline]
    #[must_use]
    pub fn admits(&self, len: u64) -> bool {
        len > self.min && len <= self.max
    }
}

impl Default for SizePolicy {
    /// `(0, u64::MAX]`: every non-empty file passes
    fn default() -> Self {
        Self {
            min: 0,
            max: u64::MAX,
        }
    }
}

/// A compiled filename rule
#[derive(Clone)]
enum Rule {
    Pattern(Regex),
    Predicate(PredicateFn),
}

impl Rule {
    fn matches(&self, filename: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(filename),
            Self::Predicate(f) => f(filename),
        }
    }
}

/// Compiled, stateless asset filter
///
/// Pure function of `(filename, content length)`; compiled once and
/// shared across every task in a cycle.
#[derive(Clone)]
pub struct Matcher {
    rules: Vec<Rule>,
    size: SizePolicy,
}

impl Matcher {
    /// Compile user specs into an ordered rule list
    ///
    /// An empty spec list means "match every filename" (the configuration
    /// default). Compilation happens here, not per-asset, so a malformed
    /// glob surfaces before any processing begins.
    ///
    /// # Errors
    /// [`MatchError::InvalidGlob`] when a glob pattern cannot be
    /// translated into a valid regex.
    pub fn compile(specs: &[MatchSpec], size: SizePolicy) -> Result<Self, MatchError> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let rule = match spec {
                MatchSpec::Glob(pattern) => {
                    let translated = glob_to_regex(pattern)?;
                    let re = Regex::new(&translated).map_err(|e| MatchError::InvalidGlob {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                    Rule::Pattern(re)
                }
                MatchSpec::Regex(re) => Rule::Pattern(re.clone()),
                MatchSpec::Predicate(f) => Rule::Predicate(Arc::clone(f)),
            };
            rules.push(rule);
        }
        Ok(Self { rules, size })
    }

    /// Test a filename and content length against the compiled rules
    ///
    /// Rules are tried in order; the first filename match wins, then the
    /// size gate decides. No rules means every filename matches.
    #[must_use]
    pub fn is_match(&self, filename: &str, content_len: u64) -> bool {
        let name_ok = self.rules.is_empty() || self.rules.iter().any(|r| r.matches(filename));
        name_ok && self.size.admits(content_len)
    }

    /// The size gate this matcher applies
    #[inline]
    #[must_use]
    pub fn size_policy(&self) -> SizePolicy {
        self.size
    }

    /// Number of compiled filename rules
    #[inline]
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("rules", &self.rules.len())
            .field("size", &self.size)
            .finish()
    }
}

/// Translate a glob pattern into an anchored regex string
///
/// Supported syntax: `*` (any run except `/`), `**` (any run including
/// `/`), `?` (single char except `/`), `[...]` character classes, and
/// `{a,b}` alternation. Everything else is matched literally.
fn glob_to_regex(pattern: &str) -> Result<String, MatchError> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    let mut brace_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` collapses so that `**/a.png` also matches `a.png`
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if matches!(inner, '\\' | '^') {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                if !closed {
                    return Err(MatchError::InvalidGlob {
                        pattern: pattern.to_string(),
                        reason: "unterminated character class".to_string(),
                    });
                }
                out.push(']');
            }
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' => {
                if brace_depth == 0 {
                    return Err(MatchError::InvalidGlob {
                        pattern: pattern.to_string(),
                        reason: "unbalanced closing brace".to_string(),
                    });
                }
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            c if "\\.+()|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    if brace_depth != 0 {
        return Err(MatchError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: "unterminated brace group".to_string(),
        });
    }

    out.push('$');
    Ok(out)
}

/// Errors from compiling match specs
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchError {
    /// Glob pattern could not be translated
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob {
        /// The offending pattern
        pattern: String,
        /// Why translation failed
        reason: String,
    },
}
