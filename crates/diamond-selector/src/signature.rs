//! Signature canonicalization
//!
//! Turns human-readable function signatures into the canonical
//! `name(type1,type2)` form that selectors are hashed from.
//!
//! Accepted input is the loose fragment syntax used by deployment tooling:
//! - `transfer(address,uint256)`
//! - `function transfer(address to, uint amount) external returns (bool)`
//! - `facetAddress(bytes4 _functionSelector)`
//! - `diamondCut(tuple(address,uint8,bytes4[])[],address,bytes)`

use std::fmt;

/// Keywords that may follow a parameter type and carry no type information
const PARAMETER_KEYWORDS: &[&str] = &["memory", "calldata", "storage", "indexed", "payable"];

/// Why a signature could not be canonicalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseReason {
    /// Blank signature
    Empty,

    /// No parameter list
    MissingParenthesis,

    /// Parentheses or brackets do not balance
    UnbalancedParenthesis,

    /// Function name is not an identifier
    InvalidName(String),

    /// Blank entry in a parameter list
    EmptyParameter,

    /// Type is not a recognised ABI type
    UnknownType(String),

    /// Malformed array suffix
    InvalidArraySuffix(String),

    /// Token that cannot appear at this position
    UnexpectedToken(String),
}

impl fmt::Display for ParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty signature"),
            Self::MissingParenthesis => write!(f, "missing parameter list"),
            Self::UnbalancedParenthesis => write!(f, "unbalanced parentheses"),
            Self::InvalidName(name) => write!(f, "invalid function name '{name}'"),
            Self::EmptyParameter => write!(f, "empty parameter"),
            Self::UnknownType(ty) => write!(f, "unknown type '{ty}'"),
            Self::InvalidArraySuffix(suffix) => write!(f, "invalid array suffix '{suffix}'"),
            Self::UnexpectedToken(token) => write!(f, "unexpected token '{token}'"),
        }
    }
}

/// A signature that could not be canonicalized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot canonicalize '{signature}': {reason}")]
pub struct InterfaceParseError {
    /// Signature as supplied
    pub signature: String,

    /// What went wrong
    pub reason: ParseReason,
}

impl InterfaceParseError {
    /// Create a new parse error
    #[inline]
    #[must_use]
    pub fn new(signature: impl Into<String>, reason: ParseReason) -> Self {
        Self {
            signature: signature.into(),
            reason,
        }
    }
}

/// Canonicalize a function signature
///
/// Drops the `function` keyword, parameter names, data locations and
/// anything after the parameter list, normalizes type aliases
/// (`uint` → `uint256`) and removes all whitespace.
///
/// # Errors
/// Returns [`InterfaceParseError`] if the signature is malformed or uses an
/// unknown type.
///
/// # Example
/// ```
/// use diamond_selector::canonicalize;
///
/// let canonical = canonicalize("function mint(address to, uint amount) external").unwrap();
/// assert_eq!(canonical, "mint(address,uint256)");
/// ```
pub fn canonicalize(signature: &str) -> Result<String, InterfaceParseError> {
    let fail = |reason| InterfaceParseError::new(signature, reason);

    let trimmed = signature.trim();
    if trimmed.is_empty() {
        return Err(fail(ParseReason::Empty));
    }

    let body = strip_keyword(trimmed, "function").unwrap_or(trimmed);
    let open = body
        .find('(')
        .ok_or_else(|| fail(ParseReason::MissingParenthesis))?;

    let name = body[..open].trim();
    if !is_identifier(name) {
        return Err(fail(ParseReason::InvalidName(name.to_string())));
    }

    let close = matching_paren(body, open).ok_or_else(|| fail(ParseReason::UnbalancedParenthesis))?;

    // Modifiers and return clauses are not part of the selector
    let trailing = &body[close + 1..];
    if !trailing.is_empty() && !trailing.starts_with(char::is_whitespace) {
        return Err(fail(ParseReason::UnexpectedToken(trailing.trim().to_string())));
    }

    let params = canonical_list(&body[open + 1..close]).map_err(fail)?;
    Ok(format!("{name}({})", params.join(",")))
}

/// Strip a leading keyword that is followed by whitespace
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace)
        .then(|| rest.trim_start())
}

/// Index of the parenthesis closing the one at `open`
fn matching_paren(input: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in input[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Canonicalize a comma-separated parameter list (without parentheses)
fn canonical_list(inner: &str) -> Result<Vec<String>, ParseReason> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner)?
        .into_iter()
        .map(canonical_param)
        .collect()
}

/// Split on commas that are not nested in parentheses or brackets
fn split_top_level(input: &str) -> Result<Vec<&str>, ParseReason> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in input.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ParseReason::UnbalancedParenthesis)?;
            }
            ',' if depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseReason::UnbalancedParenthesis);
    }
    parts.push(&input[start..]);
    Ok(parts)
}

/// Canonicalize one parameter: its type, with any name or keywords dropped
fn canonical_param(param: &str) -> Result<String, ParseReason> {
    let param = param.trim();
    if param.is_empty() {
        return Err(ParseReason::EmptyParameter);
    }

    let tuple_body = param
        .strip_prefix("tuple")
        .map(str::trim_start)
        .filter(|rest| rest.starts_with('('))
        .or_else(|| param.starts_with('(').then_some(param));

    let (ty, rest) = if let Some(body) = tuple_body {
        let close = matching_paren(body, 0).ok_or(ParseReason::UnbalancedParenthesis)?;
        let components = canonical_list(&body[1..close])?;
        let after = &body[close + 1..];
        let suffix_len = after
            .find(|c: char| !matches!(c, '[' | ']') && !c.is_ascii_digit())
            .unwrap_or(after.len());
        let suffix = canonical_suffix(&after[..suffix_len])?;
        (format!("({}){suffix}", components.join(",")), &after[suffix_len..])
    } else {
        let end = param.find(char::is_whitespace).unwrap_or(param.len());
        let token = &param[..end];
        let bracket = token.find('[').unwrap_or(token.len());
        let base = normalize_elementary(&token[..bracket])?;
        let suffix = canonical_suffix(&token[bracket..])?;
        (format!("{base}{suffix}"), &param[end..])
    };

    check_trailing_words(rest)?;
    Ok(ty)
}

/// Validate and normalize a run of array suffixes such as `[][3]`
fn canonical_suffix(suffix: &str) -> Result<String, ParseReason> {
    let invalid = || ParseReason::InvalidArraySuffix(suffix.to_string());
    let mut out = String::with_capacity(suffix.len());
    let mut rest = suffix;

    while !rest.is_empty() {
        let inner_start = rest.strip_prefix('[').ok_or_else(invalid)?;
        let close = inner_start.find(']').ok_or_else(invalid)?;
        let length = &inner_start[..close];
        if length.is_empty() {
            out.push_str("[]");
        } else {
            let n = parse_width(length).filter(|n| *n > 0).ok_or_else(invalid)?;
            out.push_str(&format!("[{n}]"));
        }
        rest = &inner_start[close + 1..];
    }

    Ok(out)
}

/// Words after a type may only be keywords or a single parameter name
fn check_trailing_words(rest: &str) -> Result<(), ParseReason> {
    let mut names = 0;
    for word in rest.split_whitespace() {
        if PARAMETER_KEYWORDS.contains(&word) {
            continue;
        }
        if !is_identifier(word) {
            return Err(ParseReason::UnexpectedToken(word.to_string()));
        }
        names += 1;
        if names > 1 {
            return Err(ParseReason::UnexpectedToken(word.to_string()));
        }
    }
    Ok(())
}

/// Resolve aliases and validate an elementary type
fn normalize_elementary(base: &str) -> Result<String, ParseReason> {
    let canonical = match base {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        "fixed" => "fixed128x18",
        "ufixed" => "ufixed128x18",
        other => other,
    };

    if is_elementary(canonical) {
        Ok(canonical.to_string())
    } else {
        Err(ParseReason::UnknownType(base.to_string()))
    }
}

fn is_elementary(ty: &str) -> bool {
    if matches!(ty, "address" | "bool" | "string" | "bytes" | "function") {
        return true;
    }
    if let Some(bits) = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int")) {
        return parse_width(bits).is_some_and(is_integer_width);
    }
    if let Some(len) = ty.strip_prefix("bytes") {
        return parse_width(len).is_some_and(|n| (1..=32).contains(&n));
    }
    if let Some(spec) = ty.strip_prefix("ufixed").or_else(|| ty.strip_prefix("fixed")) {
        return spec.split_once('x').is_some_and(|(m, n)| {
            parse_width(m).is_some_and(is_integer_width)
                && (n == "0" || parse_width(n).is_some_and(|n| n <= 80))
        });
    }
    false
}

fn is_integer_width(bits: u32) -> bool {
    (8..=256).contains(&bits) && bits % 8 == 0
}

/// Decimal without sign or leading zeros
fn parse_width(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `[A-Za-z_$][A-Za-z0-9_$]*`
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
