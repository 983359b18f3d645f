use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One declarative way to locate a control, tried in priority order.
///
/// Strategies are data, not code: the same list drives a browser page, a
/// mobile session, or a scripted test driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Attribute-based native query, e.g. `input[type='email']`.
    Attr(String),
    /// Role plus visible-text heuristic, e.g. a button whose text contains
    /// "Next".
    RoleText { role: String, text: String },
    /// Class-name or path expression, the mobile analog of an attribute
    /// query.
    ClassOrPath(String),
    /// Represents an unparseable strategy string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Attr(q) => write!(f, "attr:{q}"),
            Strategy::RoleText { role, text } => write!(f, "role:{role}|text:{text}"),
            Strategy::ClassOrPath(p) => write!(f, "class:{p}"),
            Strategy::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Strategy {
    fn from(s: &str) -> Self {
        // role:button|text:Next is the preferred precise format
        if let Some(rest) = s.strip_prefix("role:") {
            if let Some((role, text_part)) = rest.split_once('|') {
                let text = text_part.strip_prefix("text:").unwrap_or(text_part);
                return Strategy::RoleText {
                    role: role.trim().to_string(),
                    text: text.trim().to_string(),
                };
            }
            return Strategy::RoleText {
                role: rest.trim().to_string(),
                text: String::new(),
            };
        }

        match s {
            _ if s.starts_with("attr:") => Strategy::Attr(s["attr:".len()..].to_string()),
            _ if s.starts_with("class:") => Strategy::ClassOrPath(s["class:".len()..].to_string()),
            _ if s.starts_with('/') => Strategy::ClassOrPath(s.to_string()),
            // Bare bracket queries read as attribute selectors
            _ if s.contains('[') => Strategy::Attr(s.to_string()),
            _ => Strategy::Invalid(format!(
                "Unknown strategy format: \"{s}\". Use 'attr:', 'role:<role>|text:<text>', or 'class:' prefixes."
            )),
        }
    }
}

/// Scripted last-resort descriptor: enumerate visible controls in document
/// order and keyword-match their descriptive attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicScan {
    /// Roles eligible for the scan (empty = any role).
    pub roles: Vec<String>,
    /// Semantic keyword set matched against name/id/label/placeholder/text.
    pub keywords: Vec<String>,
}

impl HeuristicScan {
    pub fn new<R, K>(roles: R, keywords: K) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn role_matches(&self, role: &str) -> bool {
        self.roles.is_empty() || self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Ordered strategies for one logical target, plus the optional scripted
/// fallback that runs after every native strategy is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyList {
    /// Logical target name, used in logs and error messages.
    pub target: String,
    pub strategies: Vec<Strategy>,
    pub fallback: Option<HeuristicScan>,
    /// Per-strategy wait before moving on to the next one.
    pub strategy_timeout: Duration,
}

pub(crate) const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(5);

impl StrategyList {
    pub fn new(target: impl Into<String>, strategies: Vec<Strategy>) -> Self {
        Self {
            target: target.into(),
            strategies,
            fallback: None,
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    /// Build a list from shorthand strings, e.g.
    /// `StrategyList::parse("email input", &["attr:input[type='email']"])`.
    pub fn parse(target: impl Into<String>, strategies: &[&str]) -> Self {
        Self::new(
            target,
            strategies.iter().map(|s| Strategy::from(*s)).collect(),
        )
    }

    pub fn with_fallback(mut self, scan: HeuristicScan) -> Self {
        self.fallback = Some(scan);
        self
    }

    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }
}

/// Semantic keyword sets for the scripted fallback, keyed by the kind of
/// control the flow needs. Derived from the attribute vocabulary the target
/// UI has used across observed revisions.
pub static EMAIL_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["email", "member", "alias", "correo"]);

pub static PASSWORD_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["password", "passwd", "pwd", "contraseña"]);

pub static YEAR_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["year", "birth", "año"]);

pub static FIRST_NAME_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["firstname", "first name", "first", "nombre"]);

pub static LAST_NAME_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["lastname", "last name", "last", "apellido"]);

/// Proceed-control vocabulary across the target's localization.
pub static PROCEED_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "next",
        "continue",
        "create",
        "signup",
        "submit",
        "siguiente",
        "continuar",
        "crear",
    ]
});

/// Sustained-presence challenge vocabulary for the same-surface branch.
pub static CHALLENGE_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["press", "hold", "challenge", "human", "presione", "mantenga"]);

pub(crate) fn input_roles() -> Vec<String> {
    vec!["input".into(), "textbox".into(), "edit".into()]
}

pub(crate) fn button_roles() -> Vec<String> {
    vec!["button".into(), "submit".into(), "link".into()]
}
