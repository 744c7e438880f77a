//! Static function lookup for typed languages
//!
//! Java and C++ drivers are planned before anything runs: the user source is
//! scanned for definitions of the requested function, and an ordered table of
//! invocation strategies decides how the JSON arguments are bound to the
//! declared parameters.

use std::fmt;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::driver::DriverError;

/// Source language of a scanned definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Java,
    Cpp,
}

/// Declared type of a parameter or return value, as far as drivers care
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Int,
    Long,
    Double,
    Float,
    Bool,
    Char,
    Str,
    /// `java.lang.Object`: accepts any JSON value
    Object,
    /// Java wrapper type (`Integer`, `Long`, ...)
    Boxed(Box<ValueType>),
    /// `T[]`, `T...` or `std::vector<T>`
    Array(Box<ValueType>),
    /// `java.util.List<T>` and its supertypes
    List(Box<ValueType>),
    Void,
    Unsupported(String),
}

impl ValueType {
    /// Parse a declared type as written in the source
    pub fn parse(dialect: Dialect, raw: &str) -> Self {
        Self::parse_normalized(dialect, &normalize_type(dialect, raw))
    }

    fn parse_normalized(dialect: Dialect, ty: &str) -> Self {
        if dialect == Dialect::Java
            && let Some(base) = ty.strip_suffix("...").or_else(|| ty.strip_suffix("[]"))
        {
            return ValueType::Array(Box::new(Self::parse_normalized(dialect, base)));
        }

        if let Some((outer, inner)) = split_generic(ty) {
            return match (dialect, outer) {
                (Dialect::Java, "List" | "ArrayList" | "Collection" | "Iterable") => {
                    ValueType::List(Box::new(Self::parse_normalized(dialect, inner)))
                }
                (Dialect::Cpp, "vector") => {
                    ValueType::Array(Box::new(Self::parse_normalized(dialect, inner)))
                }
                _ => ValueType::Unsupported(ty.to_owned()),
            };
        }

        let boxed = |inner: ValueType| ValueType::Boxed(Box::new(inner));
        match dialect {
            Dialect::Java => match ty {
                "int" => ValueType::Int,
                "long" => ValueType::Long,
                "double" => ValueType::Double,
                "float" => ValueType::Float,
                "boolean" => ValueType::Bool,
                "char" => ValueType::Char,
                "Integer" => boxed(ValueType::Int),
                "Long" => boxed(ValueType::Long),
                "Double" => boxed(ValueType::Double),
                "Float" => boxed(ValueType::Float),
                "Boolean" => boxed(ValueType::Bool),
                "Character" => boxed(ValueType::Char),
                "String" | "CharSequence" => ValueType::Str,
                "Object" => ValueType::Object,
                "void" => ValueType::Void,
                other => ValueType::Unsupported(other.to_owned()),
            },
            Dialect::Cpp => match ty {
                "int" | "signed" | "unsigned" | "unsigned int" | "short" | "int32_t"
                | "uint32_t" => ValueType::Int,
                "long" | "long int" | "long long" | "long long int" | "unsigned long"
                | "unsigned long long" | "int64_t" | "uint64_t" | "size_t" => ValueType::Long,
                "double" | "long double" => ValueType::Double,
                "float" => ValueType::Float,
                "bool" => ValueType::Bool,
                "char" => ValueType::Char,
                "string" => ValueType::Str,
                "void" => ValueType::Void,
                other => ValueType::Unsupported(other.to_owned()),
            },
        }
    }

    /// Whether a JSON value can be written as a literal of this type
    pub fn accepts(&self, dialect: Dialect, value: &Value) -> bool {
        match self {
            ValueType::Int => value
                .as_i64()
                .is_some_and(|n| i32::try_from(n).is_ok()),
            ValueType::Long => value.as_i64().is_some(),
            ValueType::Double | ValueType::Float => value.is_number(),
            ValueType::Bool => value.is_boolean(),
            ValueType::Char => value.as_str().is_some_and(|s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => match dialect {
                        Dialect::Java => (c as u32) <= 0xFFFF,
                        Dialect::Cpp => c.is_ascii(),
                    },
                    _ => false,
                }
            }),
            ValueType::Str => value.is_string(),
            ValueType::Object => !value.is_object(),
            ValueType::Boxed(inner) => value.is_null() || inner.accepts(dialect, value),
            ValueType::Array(inner) | ValueType::List(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.accepts(dialect, item))),
            ValueType::Void | ValueType::Unsupported(_) => false,
        }
    }

    /// Java spelling of the type, used for array creation and generic arguments
    pub fn java_name(&self) -> String {
        match self {
            ValueType::Int => "int".to_owned(),
            ValueType::Long => "long".to_owned(),
            ValueType::Double => "double".to_owned(),
            ValueType::Float => "float".to_owned(),
            ValueType::Bool => "boolean".to_owned(),
            ValueType::Char => "char".to_owned(),
            ValueType::Str => "String".to_owned(),
            ValueType::Object => "Object".to_owned(),
            ValueType::Boxed(inner) => match inner.as_ref() {
                ValueType::Int => "Integer".to_owned(),
                ValueType::Bool => "Boolean".to_owned(),
                ValueType::Char => "Character".to_owned(),
                ValueType::Long => "Long".to_owned(),
                ValueType::Double => "Double".to_owned(),
                ValueType::Float => "Float".to_owned(),
                other => other.java_name(),
            },
            ValueType::Array(inner) => format!("{}[]", inner.java_name()),
            ValueType::List(inner) => format!("java.util.List<{}>", inner.java_name()),
            ValueType::Void => "void".to_owned(),
            ValueType::Unsupported(raw) => raw.clone(),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Declared type with qualifiers and references stripped
    pub raw_type: String,
    pub ty: ValueType,
}

/// A function or method definition found in the user source
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub dialect: Dialect,
    pub name: String,
    /// Enclosing class or struct, if any
    pub owner: Option<String>,
    pub is_static: bool,
    pub return_type: ValueType,
    pub params: Vec<Param>,
}

/// Ways of binding positional JSON arguments to a declared method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStrategy {
    /// One parameter per argument, each typed
    ExactArity,
    /// A single array/list parameter receiving every argument
    ArrayTyped,
    /// A single `Object` parameter receiving the argument (or all of them)
    SingleObject,
}

/// Strategies in the order they are tried
pub const STRATEGIES: [InvocationStrategy; 3] = [
    InvocationStrategy::ExactArity,
    InvocationStrategy::ArrayTyped,
    InvocationStrategy::SingleObject,
];

impl fmt::Display for InvocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvocationStrategy::ExactArity => "exact-arity",
            InvocationStrategy::ArrayTyped => "array-typed",
            InvocationStrategy::SingleObject => "single-object",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{strategy}: {reason}")]
pub struct NotFound {
    pub strategy: InvocationStrategy,
    pub reason: String,
}

/// A parameter paired with the JSON value it receives
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub param: Param,
    pub value: Value,
}

/// How the driver will call the user's method
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPlan {
    pub strategy: InvocationStrategy,
    pub method: MethodSignature,
    pub bindings: Vec<Binding>,
}

impl InvocationStrategy {
    pub fn plan(
        self,
        candidates: &[MethodSignature],
        args: &[Value],
    ) -> Result<InvocationPlan, NotFound> {
        match self {
            InvocationStrategy::ExactArity => exact_arity(candidates, args),
            InvocationStrategy::ArrayTyped => array_typed(candidates, args),
            InvocationStrategy::SingleObject => single_object(candidates, args),
        }
    }
}

fn exact_arity(candidates: &[MethodSignature], args: &[Value]) -> Result<InvocationPlan, NotFound> {
    candidates
        .iter()
        .find(|method| {
            method.params.len() == args.len()
                && method
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| param.ty.accepts(method.dialect, arg))
        })
        .map(|method| InvocationPlan {
            strategy: InvocationStrategy::ExactArity,
            method: method.clone(),
            bindings: method
                .params
                .iter()
                .zip(args)
                .map(|(param, arg)| Binding {
                    param: param.clone(),
                    value: arg.clone(),
                })
                .collect(),
        })
        .ok_or_else(|| NotFound {
            strategy: InvocationStrategy::ExactArity,
            reason: format!(
                "no definition takes {} argument(s) of the given types",
                args.len()
            ),
        })
}

fn array_typed(candidates: &[MethodSignature], args: &[Value]) -> Result<InvocationPlan, NotFound> {
    let packed = Value::Array(args.to_vec());
    candidates
        .iter()
        .find(|method| match method.params.as_slice() {
            [param] => matches!(param.ty, ValueType::Array(_) | ValueType::List(_))
                && param.ty.accepts(method.dialect, &packed),
            _ => false,
        })
        .map(|method| InvocationPlan {
            strategy: InvocationStrategy::ArrayTyped,
            method: method.clone(),
            bindings: vec![Binding {
                param: method.params[0].clone(),
                value: packed.clone(),
            }],
        })
        .ok_or_else(|| NotFound {
            strategy: InvocationStrategy::ArrayTyped,
            reason: "no single array parameter accepts all arguments".to_owned(),
        })
}

fn single_object(
    candidates: &[MethodSignature],
    args: &[Value],
) -> Result<InvocationPlan, NotFound> {
    let value = match args {
        [single] => single.clone(),
        _ => Value::Array(args.to_vec()),
    };
    candidates
        .iter()
        .find(|method| match method.params.as_slice() {
            [param] => param.ty == ValueType::Object && param.ty.accepts(method.dialect, &value),
            _ => false,
        })
        .map(|method| InvocationPlan {
            strategy: InvocationStrategy::SingleObject,
            method: method.clone(),
            bindings: vec![Binding {
                param: method.params[0].clone(),
                value: value.clone(),
            }],
        })
        .ok_or_else(|| NotFound {
            strategy: InvocationStrategy::SingleObject,
            reason: "no single Object parameter".to_owned(),
        })
}

/// Find `name` in `source` and pick the first strategy that can call it
pub fn resolve(
    dialect: Dialect,
    source: &str,
    name: &str,
    args: &[Value],
) -> Result<InvocationPlan, DriverError> {
    let candidates = find_methods(dialect, source, name);
    if candidates.is_empty() {
        return Err(DriverError::FunctionNotFound(name.to_owned()));
    }

    let mut reasons = Vec::with_capacity(STRATEGIES.len());
    for strategy in STRATEGIES {
        match strategy.plan(&candidates, args) {
            Ok(plan) => {
                debug!(%strategy, owner = ?plan.method.owner, "resolved invocation");
                return Ok(plan);
            }
            Err(not_found) => reasons.push(not_found.to_string()),
        }
    }

    Err(DriverError::NotInvocable {
        name: name.to_owned(),
        reason: reasons.join("; "),
    })
}

/// Find every definition (not declaration or call) of `name`
pub fn find_methods(dialect: Dialect, source: &str, name: &str) -> Vec<MethodSignature> {
    if name.is_empty() {
        return Vec::new();
    }

    let masked = mask_source(dialect, source);
    let blocks = type_blocks(dialect, &masked);
    let bytes = masked.as_bytes();

    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = masked[from..].find(name) {
        let start = from + offset;
        let end = start + name.len();
        from = end;

        let bounded_left = start == 0 || !is_ident_byte(bytes[start - 1]);
        let bounded_right = end == bytes.len() || !is_ident_byte(bytes[end]);
        if !(bounded_left && bounded_right) {
            continue;
        }

        if let Some(signature) = parse_definition(dialect, &masked, start, end, &blocks) {
            found.push(signature);
        }
    }
    found
}

fn parse_definition(
    dialect: Dialect,
    masked: &str,
    start: usize,
    end: usize,
    blocks: &[TypeBlock],
) -> Option<MethodSignature> {
    let bytes = masked.as_bytes();

    let open = end + masked[end..].len() - masked[end..].trim_start().len();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let close = find_matching(bytes, open, b'(', b')')?;

    // Only definitions: the parameter list must be followed by a body
    let tail_len = masked[close + 1..].find(['{', ';', '}', '(', '='])?;
    let body = close + 1 + tail_len;
    if bytes[body] != b'{' || !is_definition_tail(dialect, masked[close + 1..body].trim()) {
        return None;
    }

    let mut head_end = start;
    let mut owner = None;
    let before = masked[..start].trim_end();
    if let Some(qualified) = before.strip_suffix("::") {
        let ident_start = trailing_ident_start(qualified);
        owner = Some(qualified[ident_start..].to_owned()).filter(|s| !s.is_empty());
        head_end = ident_start;
    }

    let head_start = masked[..head_end]
        .rfind([';', '{', '}', ')'])
        .map_or(0, |i| i + 1);
    let head = strip_access_labels(&masked[head_start..head_end]);
    let (is_static, return_text) = split_modifiers(dialect, &head);
    if return_text.is_empty() || is_statement_keyword(&return_text) {
        return None;
    }

    let params = split_top_level(&masked[open + 1..close])
        .into_iter()
        .filter(|p| !p.trim().is_empty() && p.trim() != "void")
        .map(|p| parse_param(dialect, &p))
        .collect();

    let owner = owner.or_else(|| {
        blocks
            .iter()
            .filter(|block| block.open < start && start < block.close)
            .max_by_key(|block| block.open)
            .map(|block| block.name.clone())
    });

    Some(MethodSignature {
        dialect,
        name: masked[start..end].to_owned(),
        owner,
        is_static,
        return_type: ValueType::parse(dialect, &return_text),
        params,
    })
}

fn is_definition_tail(dialect: Dialect, tail: &str) -> bool {
    if tail.is_empty() {
        return true;
    }
    match dialect {
        Dialect::Java => tail.starts_with("throws"),
        Dialect::Cpp => tail
            .split_whitespace()
            .all(|word| matches!(word, "const" | "noexcept" | "override" | "final")),
    }
}

fn is_statement_keyword(text: &str) -> bool {
    let last = text.split_whitespace().last().unwrap_or_default();
    matches!(
        last,
        "return" | "new" | "else" | "throw" | "case" | "do" | "if" | "while" | "for" | "switch"
    ) || text.contains(['=', '+', '!'])
}

const JAVA_MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "strictfp",
    "default",
];

const CPP_MODIFIERS: &[&str] = &[
    "static", "inline", "virtual", "constexpr", "explicit", "friend", "extern",
];

fn split_modifiers(dialect: Dialect, head: &str) -> (bool, String) {
    let modifiers = match dialect {
        Dialect::Java => JAVA_MODIFIERS,
        Dialect::Cpp => CPP_MODIFIERS,
    };
    let mut is_static = false;
    let mut rest = Vec::new();
    for word in head.split_whitespace() {
        if word == "static" {
            is_static = true;
        } else if modifiers.contains(&word) || word.starts_with('@') || word.starts_with("[[") {
            continue;
        } else {
            rest.push(word);
        }
    }
    (is_static, rest.join(" "))
}

/// Drop C++ `public:`-style labels so they don't read as part of a type
fn strip_access_labels(head: &str) -> String {
    let bytes = head.as_bytes();
    let mut cut = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let prev_colon = i > 0 && bytes[i - 1] == b':';
        let next_colon = bytes.get(i + 1) == Some(&b':');
        if b == b':' && !prev_colon && !next_colon {
            cut = i + 1;
        }
    }
    head[cut..].to_owned()
}

fn parse_param(dialect: Dialect, text: &str) -> Param {
    let mut text = text.trim().to_owned();
    if dialect == Dialect::Cpp
        && let Some(eq) = text.find('=')
    {
        text.truncate(eq);
    }
    let text = text.trim();

    let name_start = trailing_ident_start(text);
    let (type_text, name) = if name_start > 0 && !text[..name_start].trim().ends_with("::") {
        (&text[..name_start], &text[name_start..])
    } else {
        (text, "")
    };

    let raw_type = normalize_type(dialect, type_text);
    Param {
        name: name.to_owned(),
        ty: ValueType::parse_normalized(dialect, &raw_type),
        raw_type,
    }
}

fn normalize_type(dialect: Dialect, raw: &str) -> String {
    let mut text = raw.to_owned();
    match dialect {
        Dialect::Java => {
            if let Ok(annotation) = Regex::new(r"@[\w.]+(\s*\([^)]*\))?") {
                text = annotation.replace_all(&text, " ").into_owned();
            }
            if let Ok(final_kw) = Regex::new(r"\bfinal\b") {
                text = final_kw.replace_all(&text, " ").into_owned();
            }
            text = text.replace("java.util.", "").replace("java.lang.", "");
        }
        Dialect::Cpp => {
            if let Ok(qualifiers) = Regex::new(r"\b(const|volatile|struct|typename)\b") {
                text = qualifiers.replace_all(&text, " ").into_owned();
            }
            text = text.replace('&', " ").replace("std::", "");
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let chars: Vec<char> = collapsed.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = i.checked_sub(1).and_then(|j| chars.get(j)).copied();
            let next = chars.get(i + 1).copied();
            let punct = |ch: Option<char>| matches!(ch, Some('<' | '>' | ',' | '[' | ']' | '.'));
            if punct(prev) || punct(next) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn split_generic(ty: &str) -> Option<(&str, &str)> {
    let open = ty.find('<')?;
    let inner = ty.strip_suffix('>')?;
    Some((&ty[..open], &inner[open + 1..]))
}

fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

struct TypeBlock {
    name: String,
    open: usize,
    close: usize,
}

fn type_blocks(dialect: Dialect, masked: &str) -> Vec<TypeBlock> {
    let pattern = match dialect {
        Dialect::Java => r"\b(?:class|interface|enum|record)\s+([A-Za-z_$][\w$]*)",
        Dialect::Cpp => r"\b(?:class|struct)\s+([A-Za-z_]\w*)",
    };
    let Ok(re) = Regex::new(pattern) else {
        return Vec::new();
    };

    let bytes = masked.as_bytes();
    re.captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_owned();
            let rel = masked[whole.end()..].find(['{', ';'])?;
            let open = whole.end() + rel;
            if bytes[open] != b'{' {
                return None;
            }
            let close = find_matching(bytes, open, b'{', b'}')?;
            Some(TypeBlock { name, open, close })
        })
        .collect()
}

fn find_matching(bytes: &[u8], open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open_at) {
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Byte offset where the identifier ending `text` starts (`text.len()` if none)
fn trailing_ident_start(text: &str) -> usize {
    text.char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        .last()
        .map_or(text.len(), |(i, _)| i)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Blank out comments, string/char literals and (for C++) preprocessor lines,
/// keeping byte offsets and newlines intact
pub(crate) fn mask_source(dialect: Dialect, source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Literal(u8),
    }

    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut line_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => {
                if b == b'/' && next == Some(b'/') {
                    state = State::LineComment;
                } else if b == b'/' && next == Some(b'*') {
                    state = State::BlockComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                } else if b == b'"' || b == b'\'' {
                    state = State::Literal(b);
                } else if b == b'#' && line_start && dialect == Dialect::Cpp {
                    state = State::LineComment;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
            }
            State::Literal(quote) => {
                if b == b'\\' && next.is_some() {
                    out.extend_from_slice(if next == Some(b'\n') { b" \n" } else { b"  " });
                    i += 2;
                    continue;
                }
                if b == quote {
                    state = State::Code;
                    out.push(b' ');
                    i += 1;
                    continue;
                }
            }
        }

        let masked = state != State::Code || b == b'"' || b == b'\'';
        out.push(if masked && b != b'\n' { b' ' } else { b });
        if b == b'\n' {
            line_start = true;
        } else if !b.is_ascii_whitespace() {
            line_start = false;
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
