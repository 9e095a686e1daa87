//! Request authorization by ordered rule table.
//!
//! A [`RuleTable`] is an ordered list of `(method, path pattern, required
//! authority)` rules built once at startup. [`AuthorizationPolicy::decide`]
//! walks it top to bottom and applies the first rule whose method and path
//! match. A request that matches no rule is denied.
//!
//! ## Path patterns
//!
//! Patterns are ant-style and always start with `/`:
//!
//! | Pattern      | Matches                                   |
//! |--------------|-------------------------------------------|
//! | `/api/user`  | exactly `/api/user`                       |
//! | `/api/?`     | `/api/` plus one character, no `/`        |
//! | `/api/*`     | one segment below `/api/`                 |
//! | `/api/**`    | `/api` and anything below it              |
//! | `/**`        | every path                                |
//!
//! `**` must occupy a whole segment.

use std::fmt;

use beagle_core::error::BeagleError;
use beagle_core::settings::RuleSettings;
use http::Method;
use regex::Regex;

use crate::identity::Identity;

/// The outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request is refused.
    Deny,
}

/// Which HTTP methods a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    /// Every method.
    Any,
    /// One method.
    Exact(Method),
}

impl MethodMatcher {
    const KNOWN: [Method; 8] = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
    ];

    /// Parses `"ANY"`, `"*"` or an HTTP verb (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, BeagleError> {
        let upper = raw.trim().to_ascii_uppercase();
        if upper == "ANY" || upper == "*" {
            return Ok(Self::Any);
        }
        Self::KNOWN
            .iter()
            .find(|m| m.as_str() == upper)
            .map(|m| Self::Exact(m.clone()))
            .ok_or_else(|| {
                BeagleError::ConfigurationError(format!("unknown HTTP method in rule: '{raw}'"))
            })
    }

    /// Returns `true` if `method` is covered.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(m) => m == method,
        }
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Exact(m) => f.write_str(m.as_str()),
        }
    }
}

/// A compiled ant-style path pattern.
#[derive(Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles an ant-style pattern.
    pub fn parse(pattern: &str) -> Result<Self, BeagleError> {
        if !pattern.starts_with('/') {
            return Err(BeagleError::ConfigurationError(format!(
                "path pattern must start with '/': '{pattern}'"
            )));
        }

        let mut regex_str = String::from("^");
        for segment in pattern[1..].split('/') {
            if segment == "**" {
                regex_str.push_str("(?:/[^/]*)*");
                continue;
            }
            if segment.contains("**") {
                return Err(BeagleError::ConfigurationError(format!(
                    "'**' must be a whole path segment: '{pattern}'"
                )));
            }
            regex_str.push('/');
            for ch in segment.chars() {
                match ch {
                    '*' => regex_str.push_str("[^/]*"),
                    '?' => regex_str.push_str("[^/]"),
                    other => regex_str.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
        }
        regex_str.push('$');

        let regex = Regex::new(&regex_str).map_err(|e| {
            BeagleError::ConfigurationError(format!("invalid path pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if `path` matches the whole pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Returns `true` for `/**`, which matches every path.
    pub fn is_catch_all(&self) -> bool {
        self.pattern == "/**"
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathPattern {}

/// What a matching rule demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredAuthority {
    /// Anyone, authenticated or not.
    Anonymous,
    /// Any verified identity.
    Authenticated,
    /// A verified identity holding this role.
    Role(String),
}

impl RequiredAuthority {
    /// Parses `"ANONYMOUS"` (or `"ROLE_ANONYMOUS"`), `"AUTHENTICATED"`, or a
    /// role name.
    pub fn parse(raw: &str) -> Result<Self, BeagleError> {
        match raw.trim() {
            "" => Err(BeagleError::ConfigurationError(
                "rule authority must not be blank".to_string(),
            )),
            "ANONYMOUS" | "ROLE_ANONYMOUS" => Ok(Self::Anonymous),
            "AUTHENTICATED" => Ok(Self::Authenticated),
            role => Ok(Self::Role(role.to_string())),
        }
    }

    fn permits(&self, identity: Option<&Identity>) -> bool {
        match self {
            Self::Anonymous => true,
            Self::Authenticated => identity.is_some(),
            Self::Role(role) => identity.is_some_and(|i| i.has_authority(role)),
        }
    }
}

impl fmt::Display for RequiredAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("ANONYMOUS"),
            Self::Authenticated => f.write_str("AUTHENTICATED"),
            Self::Role(role) => f.write_str(role),
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    /// Methods this rule covers.
    pub method: MethodMatcher,
    /// Paths this rule covers.
    pub path: PathPattern,
    /// What the caller must hold.
    pub authority: RequiredAuthority,
}

impl AuthorizationRule {
    /// Parses a rule from its settings form.
    pub fn from_settings(settings: &RuleSettings) -> Result<Self, BeagleError> {
        Ok(Self {
            method: MethodMatcher::parse(&settings.method)?,
            path: PathPattern::parse(&settings.path)?,
            authority: RequiredAuthority::parse(&settings.authority)?,
        })
    }

    /// Returns `true` if this rule applies to the request line.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method) && self.path.matches(path)
    }

    fn is_catch_all(&self) -> bool {
        self.method == MethodMatcher::Any && self.path.is_catch_all()
    }
}

impl fmt::Display for AuthorizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.path.as_str(), self.authority)
    }
}

/// An ordered, immutable list of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<AuthorizationRule>,
}

impl RuleTable {
    /// Builds a table from already-parsed rules.
    ///
    /// An empty table is a configuration error. Rules that follow a catch-all
    /// (`ANY /**`) can never match and are reported with a warning, as is a
    /// table without any catch-all.
    pub fn new(rules: Vec<AuthorizationRule>) -> Result<Self, BeagleError> {
        if rules.is_empty() {
            return Err(BeagleError::ConfigurationError(
                "authorization rule table is empty".to_string(),
            ));
        }

        match rules.iter().position(AuthorizationRule::is_catch_all) {
            Some(idx) => {
                for shadowed in &rules[idx + 1..] {
                    tracing::warn!(
                        rule = %shadowed,
                        catch_all = %rules[idx],
                        "authorization rule is unreachable after the catch-all"
                    );
                }
            }
            None => tracing::warn!(
                "authorization rule table has no catch-all, unmatched requests are denied"
            ),
        }

        Ok(Self { rules })
    }

    /// Parses and validates a table from settings.
    pub fn from_settings(settings: &[RuleSettings]) -> Result<Self, BeagleError> {
        let rules = settings
            .iter()
            .map(AuthorizationRule::from_settings)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[AuthorizationRule] {
        &self.rules
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always `false` for a validated table.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// First-match-wins authorization over a [`RuleTable`].
///
/// Pure and lock-free; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    table: RuleTable,
}

impl AuthorizationPolicy {
    /// Creates a policy over the given table.
    pub const fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// Parses the table from settings and wraps it in a policy.
    pub fn from_settings(settings: &[RuleSettings]) -> Result<Self, BeagleError> {
        RuleTable::from_settings(settings).map(Self::new)
    }

    /// Returns the rule table.
    pub const fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Returns the first rule matching the request line.
    pub fn matching_rule(&self, method: &Method, path: &str) -> Option<&AuthorizationRule> {
        self.table.rules.iter().find(|rule| rule.matches(method, path))
    }

    /// Decides whether `identity` (absent for anonymous callers) may perform
    /// `method` on `path`.
    pub fn decide(&self, method: &Method, path: &str, identity: Option<&Identity>) -> Decision {
        match self.matching_rule(method, path) {
            Some(rule) if rule.authority.permits(identity) => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}
