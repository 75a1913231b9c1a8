//! Modifier registry and chain resolution.
//!
//! A Sigma field key like `CommandLine|base64|contains` names a chain of
//! modifiers. A valid chain is zero or more *value modifiers* (which rewrite
//! the literal) followed by at most one *comparator* (which decides how the
//! literal is compared), the comparator being last. A trailing `all` switches
//! the item's values from OR to AND.
//!
//! The registry is three immutable tables: comparators for the
//! case-insensitive mode, comparators for the case-sensitive mode, and the
//! value modifiers shared by both.

use std::fmt;

use base64::Engine as Base64Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::error::{EvalError, Result};

/// Field searched by a regex stage on a field-less (keyword) value.
pub const RAW_FIELD: &str = "_raw";

/// Modifier that ANDs an item's values instead of ORing them.
const ALL_MODIFIER: &str = "all";

// =============================================================================
// Case mode
// =============================================================================

/// Case handling of literals, fixed for one translation.
///
/// Field names are always lower-cased; the mode decides whether literal values
/// are lower-cased too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseMode {
    /// Values are lower-cased (the Sigma default).
    #[default]
    Insensitive,
    /// Values are emitted as written.
    Sensitive,
}

impl CaseMode {
    fn comparators(self) -> &'static [(&'static str, Comparator)] {
        match self {
            CaseMode::Insensitive => INSENSITIVE_COMPARATORS,
            CaseMode::Sensitive => SENSITIVE_COMPARATORS,
        }
    }

    /// Comparator used when a chain names none.
    pub fn default_comparator(self) -> Comparator {
        Comparator {
            op: CompareOp::Equals,
            fold_value: self == CaseMode::Insensitive,
        }
    }

    /// Look up a named comparator in this mode's table.
    pub fn comparator(self, name: &str) -> Option<Comparator> {
        self.comparators()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }
}

// =============================================================================
// Comparators
// =============================================================================

/// The comparison a fragment expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    Contains,
    EndsWith,
    StartsWith,
    Regex,
    Cidr,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Modifier name of this operation (`"equals"` for the implicit default).
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Equals => "equals",
            CompareOp::Contains => "contains",
            CompareOp::EndsWith => "endswith",
            CompareOp::StartsWith => "startswith",
            CompareOp::Regex => "re",
            CompareOp::Cidr => "cidr",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    /// Wildcard placement for the string-matching operations.
    fn wildcard(self, literal: &str) -> Option<String> {
        match self {
            CompareOp::Equals => Some(literal.to_string()),
            CompareOp::Contains => Some(format!("*{literal}*")),
            CompareOp::EndsWith => Some(format!("*{literal}")),
            CompareOp::StartsWith => Some(format!("{literal}*")),
            _ => None,
        }
    }

    fn numeric_symbol(self) -> Option<&'static str> {
        match self {
            CompareOp::Gt => Some(">"),
            CompareOp::Gte => Some(">="),
            CompareOp::Lt => Some("<"),
            CompareOp::Lte => Some("<="),
            _ => None,
        }
    }
}

/// A comparison operation plus whether it lower-cases the literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Comparator {
    pub op: CompareOp,
    pub fold_value: bool,
}

const fn cmp(op: CompareOp, fold_value: bool) -> Comparator {
    Comparator { op, fold_value }
}

static INSENSITIVE_COMPARATORS: &[(&str, Comparator)] = &[
    ("contains", cmp(CompareOp::Contains, true)),
    ("endswith", cmp(CompareOp::EndsWith, true)),
    ("startswith", cmp(CompareOp::StartsWith, true)),
    ("re", cmp(CompareOp::Regex, false)),
    ("cidr", cmp(CompareOp::Cidr, false)),
    ("gt", cmp(CompareOp::Gt, false)),
    ("gte", cmp(CompareOp::Gte, false)),
    ("lt", cmp(CompareOp::Lt, false)),
    ("lte", cmp(CompareOp::Lte, false)),
];

static SENSITIVE_COMPARATORS: &[(&str, Comparator)] = &[
    ("contains", cmp(CompareOp::Contains, false)),
    ("endswith", cmp(CompareOp::EndsWith, false)),
    ("startswith", cmp(CompareOp::StartsWith, false)),
    ("re", cmp(CompareOp::Regex, false)),
    ("cidr", cmp(CompareOp::Cidr, false)),
    ("gt", cmp(CompareOp::Gt, false)),
    ("gte", cmp(CompareOp::Gte, false)),
    ("lt", cmp(CompareOp::Lt, false)),
    ("lte", cmp(CompareOp::Lte, false)),
];

impl Comparator {
    /// Render one comparison of `field` against `value`.
    ///
    /// `field` is `None` for keyword values, which search the whole event.
    pub fn render(&self, field: Option<&str>, value: &str) -> Result<Fragment> {
        // A field-less `null` places no constraint.
        if self.op == CompareOp::Equals && field.is_none() && value == "null" {
            return Ok(Fragment::Empty);
        }

        let mut literal = escape_backslashes(value);
        if self.fold_value {
            literal = literal.to_lowercase();
        }
        let field = field.map(str::to_lowercase);

        if self.op == CompareOp::Regex {
            return Ok(Fragment::Regex {
                field: field.unwrap_or_else(|| RAW_FIELD.to_string()),
                pattern: literal,
            });
        }

        let text = match (field, self.op.wildcard(&literal)) {
            (Some(field), Some(pattern)) => format!("{field}=\"{pattern}\""),
            (None, Some(pattern)) => format!("\"{pattern}\""),
            (Some(field), None) => match self.op.numeric_symbol() {
                Some(symbol) => format!("{field} {symbol} \"{literal}\""),
                None => format!("{field}=\"{literal}\""),
            },
            (None, None) => {
                return Err(EvalError::InvalidModifiers(format!(
                    "'{}' needs a field, keyword values cannot use it",
                    self.op.name()
                )));
            }
        };
        Ok(Fragment::Predicate(text))
    }
}

// =============================================================================
// Value modifiers
// =============================================================================

/// A transform applied to the literal before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueModifier {
    /// Standard base64 of the value bytes.
    Base64,
    /// UTF-16LE bytes of the value.
    Wide,
}

static VALUE_MODIFIERS: &[(&str, ValueModifier)] = &[
    ("base64", ValueModifier::Base64),
    ("wide", ValueModifier::Wide),
];

impl ValueModifier {
    /// Look up a value modifier by name.
    pub fn from_name(name: &str) -> Option<Self> {
        VALUE_MODIFIERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, m)| *m)
    }

    pub fn apply(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            ValueModifier::Base64 => BASE64_STANDARD.encode(bytes).into_bytes(),
            ValueModifier::Wide => to_utf16le_bytes(bytes),
        }
    }
}

/// Convert bytes to UTF-16LE representation (wide string).
fn to_utf16le_bytes(bytes: &[u8]) -> Vec<u8> {
    let s = String::from_utf8_lossy(bytes);
    let mut wide = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        wide.extend_from_slice(&unit.to_le_bytes());
    }
    wide
}

/// Reinterpret modifier output as text, one char per byte.
///
/// Every byte maps to the code point of the same value, so the original
/// bytes can always be recovered from the text.
fn bytes_to_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Double every backslash so the literal survives quoting.
pub fn escape_backslashes(input: &str) -> String {
    input.replace('\\', "\\\\")
}

// =============================================================================
// Fragments
// =============================================================================

/// The output of one comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// No constraint.
    Empty,
    /// A search predicate such as `field="value"`.
    Predicate(String),
    /// A regex pipeline stage, `| regex field="pattern"`.
    Regex { field: String, pattern: String },
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Empty => Ok(()),
            Fragment::Predicate(text) => write!(f, "{text}"),
            Fragment::Regex { field, pattern } => write!(f, " | regex {field}=\"{pattern}\""),
        }
    }
}

// =============================================================================
// Chain resolution
// =============================================================================

/// A validated modifier chain, reusable for any number of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierChain {
    value_modifiers: Vec<ValueModifier>,
    comparator: Comparator,
    match_all: bool,
}

impl ModifierChain {
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value_modifiers(&self) -> &[ValueModifier] {
        &self.value_modifiers
    }

    /// Whether the item's values must all match (trailing `all`).
    pub fn match_all(&self) -> bool {
        self.match_all
    }

    /// Apply the value modifiers left to right, then the comparator.
    ///
    /// Modifier output is a byte image of the encoded value and is never
    /// case-folded.
    pub fn bridge(&self, field: Option<&str>, value: &str) -> Result<Fragment> {
        if self.value_modifiers.is_empty() {
            return self.comparator.render(field, value);
        }

        let bytes = self
            .value_modifiers
            .iter()
            .fold(value.as_bytes().to_vec(), |bytes, m| m.apply(&bytes));
        let comparator = Comparator {
            fold_value: false,
            ..self.comparator
        };
        comparator.render(field, &bytes_to_text(&bytes))
    }
}

/// Resolve modifier names into a chain for the given case mode.
///
/// Fails with [`EvalError::UnknownModifier`] for a name in neither table and
/// [`EvalError::InvalidModifierOrder`] for a comparator that is not last.
pub fn resolve_chain<S: AsRef<str>>(modifiers: &[S], case_mode: CaseMode) -> Result<ModifierChain> {
    let mut names: Vec<&str> = modifiers.iter().map(AsRef::as_ref).collect();
    let match_all = names.last() == Some(&ALL_MODIFIER);
    if match_all {
        names.pop();
    }

    let mut value_modifiers = Vec::new();
    let mut comparator = None;
    let last = names.len().saturating_sub(1);

    for (i, name) in names.iter().enumerate() {
        if let Some(c) = case_mode.comparator(name) {
            if i < last {
                return Err(EvalError::InvalidModifierOrder(name.to_string()));
            }
            comparator = Some(c);
        } else if let Some(m) = ValueModifier::from_name(name) {
            value_modifiers.push(m);
        } else if *name == ALL_MODIFIER {
            return Err(EvalError::InvalidModifierOrder(name.to_string()));
        } else {
            return Err(EvalError::UnknownModifier(name.to_string()));
        }
    }

    Ok(ModifierChain {
        value_modifiers,
        comparator: comparator.unwrap_or_else(|| case_mode.default_comparator()),
        match_all,
    })
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Property-based tests
// =============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const COMPARATOR_NAMES: &[&str] = &[
        "contains", "endswith", "startswith", "re", "cidr", "gt", "gte", "lt", "lte",
    ];
    const KNOWN_NAMES: &[&str] = &[
        "contains", "endswith", "startswith", "re", "cidr", "gt", "gte", "lt", "lte", "base64",
        "wide", "all",
    ];

    fn case_mode() -> impl Strategy<Value = CaseMode> {
        prop_oneof![Just(CaseMode::Insensitive), Just(CaseMode::Sensitive)]
    }

    fn value_modifiers() -> impl Strategy<Value = Vec<&'static str>> {
        prop::collection::vec(prop::sample::select(vec!["base64", "wide"]), 0..=2)
    }

    // -------------------------------------------------------------------------
    // 1. Resolution and application are deterministic
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn chain_is_deterministic(
            mut chain in value_modifiers(),
            comparator in prop::sample::select(COMPARATOR_NAMES.to_vec()),
            mode in case_mode(),
            value in "[ -~]{0,16}",
        ) {
            chain.push(comparator);
            let first = resolve_chain(&chain, mode).unwrap();
            let second = resolve_chain(&chain, mode).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                first.bridge(Some("Field"), &value).unwrap(),
                second.bridge(Some("Field"), &value).unwrap()
            );
        }
    }

    // -------------------------------------------------------------------------
    // 2. A comparator followed by anything is rejected
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn comparator_not_last_is_rejected(
            prefix in value_modifiers(),
            comparator in prop::sample::select(COMPARATOR_NAMES.to_vec()),
            suffix in prop::collection::vec(
                prop::sample::select(vec!["contains", "re", "gt", "base64", "wide"]),
                1..=2,
            ),
            mode in case_mode(),
        ) {
            let mut chain = prefix;
            chain.push(comparator);
            chain.extend(suffix);
            let err = resolve_chain(&chain, mode).unwrap_err();
            prop_assert!(
                matches!(err, EvalError::InvalidModifierOrder(ref m) if m == comparator),
                "chain {:?} gave {}", chain, err
            );
        }
    }

    // -------------------------------------------------------------------------
    // 3. Names outside the registry are always unknown
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn unknown_names_are_rejected(
            prefix in value_modifiers(),
            name in "[a-z_]{1,12}",
            mode in case_mode(),
        ) {
            prop_assume!(!KNOWN_NAMES.contains(&name.as_str()));
            let mut chain: Vec<String> = prefix.into_iter().map(String::from).collect();
            chain.push(name.clone());
            let err = resolve_chain(&chain, mode).unwrap_err();
            prop_assert!(matches!(err, EvalError::UnknownModifier(ref m) if *m == name));
        }
    }

    // -------------------------------------------------------------------------
    // 4. Escaping doubles exactly the backslashes
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn escaping_doubles_backslashes(input in r"[a-zA-Z\\:]{0,20}") {
            let escaped = escape_backslashes(&input);
            let backslashes = input.matches('\\').count();
            prop_assert_eq!(escaped.len(), input.len() + backslashes);
            prop_assert_eq!(escaped.replace(r"\\", r"\"), input);
        }
    }

    // -------------------------------------------------------------------------
    // 5. Wide output decodes back to the original characters
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn wide_round_trips(
            value in "[a-zA-Z0-9 \u{c0}-\u{d6}\u{e9}\u{fc}\u{1c4}\u{410}-\u{44f}]{0,12}",
            mode in case_mode(),
        ) {
            let chain = resolve_chain(&["wide"], mode).unwrap();
            let Fragment::Predicate(text) = chain.bridge(Some("f"), &value).unwrap() else {
                panic!("expected predicate");
            };
            let literal = text
                .strip_prefix("f=\"")
                .and_then(|t| t.strip_suffix('"'))
                .unwrap();
            let bytes: Vec<u8> = literal.chars().map(|c| c as u8).collect();
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            prop_assert_eq!(String::from_utf16(&units).unwrap(), value);
        }
    }
}
