use std::fmt::Write as _;

use regex::Regex;
use serde_json::Value;

use crate::driver::signature::{self, Dialect, ValueType};
use crate::driver::{Driver, DriverError, SourceFile, float_literal};

const DEFAULT_SOLUTION_FILE: &str = "Solution.java";
const ENTRY_FILE: &str = "JudgeDriver.java";

const TEMPLATE: &str = r#"public final class JudgeDriver {
    private JudgeDriver() {
    }

    private static Object invoke() throws Throwable {
        {{INVOKE}}
    }

    public static void main(String[] argv) {
        java.io.PrintStream resultStream = System.out;
        System.setOut(System.err);
        Object result;
        try {
            result = invoke();
        } catch (Throwable t) {
            t.printStackTrace(System.err);
            System.err.flush();
            System.exit(1);
            return;
        }
        StringBuilder out = new StringBuilder();
        write(out, result);
        resultStream.println(out);
        resultStream.flush();
        System.exit(0);
    }

    private static void write(StringBuilder out, Object value) {
        if (value == null) {
            out.append("null");
        } else if (value instanceof String || value instanceof Character) {
            quote(out, value.toString());
        } else if (value instanceof Boolean) {
            out.append(value);
        } else if (value instanceof Double || value instanceof Float) {
            double d = ((Number) value).doubleValue();
            if (Double.isNaN(d) || Double.isInfinite(d)) {
                out.append("null");
            } else {
                out.append(Double.toString(d));
            }
        } else if (value instanceof Number) {
            out.append(value.toString());
        } else if (value.getClass().isArray()) {
            int length = java.lang.reflect.Array.getLength(value);
            out.append('[');
            for (int i = 0; i < length; i++) {
                if (i > 0) {
                    out.append(',');
                }
                write(out, java.lang.reflect.Array.get(value, i));
            }
            out.append(']');
        } else if (value instanceof java.util.Map) {
            out.append('{');
            boolean first = true;
            for (java.util.Map.Entry<?, ?> entry : ((java.util.Map<?, ?>) value).entrySet()) {
                if (!first) {
                    out.append(',');
                }
                first = false;
                quote(out, String.valueOf(entry.getKey()));
                out.append(':');
                write(out, entry.getValue());
            }
            out.append('}');
        } else if (value instanceof Iterable) {
            out.append('[');
            boolean first = true;
            for (Object item : (Iterable<?>) value) {
                if (!first) {
                    out.append(',');
                }
                first = false;
                write(out, item);
            }
            out.append(']');
        } else {
            quote(out, value.toString());
        }
    }

    private static void quote(StringBuilder out, String s) {
        out.append('"');
        for (int i = 0; i < s.length(); i++) {
            char c = s.charAt(i);
            switch (c) {
                case '"': out.append("\\\""); break;
                case '\\': out.append("\\\\"); break;
                case '\n': out.append("\\n"); break;
                case '\r': out.append("\\r"); break;
                case '\t': out.append("\\t"); break;
                default:
                    if (c < 0x20) {
                        out.append(String.format("\\u%04x", (int) c));
                    } else {
                        out.append(c);
                    }
            }
        }
        out.append('"');
    }
}
"#;

pub(crate) fn synthesize(source: &str, name: &str, args: &[Value]) -> Result<Driver, DriverError> {
    let plan = signature::resolve(Dialect::Java, source, name, args)?;
    let owner = plan
        .method
        .owner
        .clone()
        .ok_or_else(|| DriverError::NotInvocable {
            name: name.to_owned(),
            reason: "method is not declared inside a class".to_owned(),
        })?;

    let arguments: Vec<String> = plan
        .bindings
        .iter()
        .map(|binding| literal(&binding.param.ty, &binding.value))
        .collect();
    let receiver = if plan.method.is_static {
        owner
    } else {
        format!("new {owner}()")
    };
    let call = format!("{receiver}.{name}({})", arguments.join(", "));
    let invoke = if plan.method.return_type == ValueType::Void {
        format!("{call};\n        return null;")
    } else {
        format!("return {call};")
    };

    Ok(Driver {
        entry_file: ENTRY_FILE.to_owned(),
        files: vec![
            SourceFile::new(solution_file_name(source), source),
            SourceFile::new(ENTRY_FILE, TEMPLATE.replace("{{INVOKE}}", &invoke)),
        ],
        setup_marker: None,
    })
}

/// javac requires a public top-level class to live in a file of the same name
fn solution_file_name(source: &str) -> String {
    let masked = signature::mask_source(Dialect::Java, source);
    Regex::new(
        r"(?m)^\s*public\s+(?:(?:final|abstract|sealed|non-sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_$][\w$]*)",
    )
    .ok()
    .and_then(|re| re.captures(&masked))
    .and_then(|caps| caps.get(1))
    .map_or_else(
        || DEFAULT_SOLUTION_FILE.to_owned(),
        |class| format!("{}.java", class.as_str()),
    )
}

/// Java expression of type `ty` holding `value`
fn literal(ty: &ValueType, value: &Value) -> String {
    match (ty, value) {
        (ValueType::Int, Value::Number(n)) => n.to_string(),
        (ValueType::Long, Value::Number(n)) => format!("{n}L"),
        (ValueType::Double, Value::Number(n)) => float_literal(n.as_f64().unwrap_or_default()),
        (ValueType::Float, Value::Number(n)) => {
            format!("{}f", float_literal(n.as_f64().unwrap_or_default()))
        }
        (ValueType::Bool, Value::Bool(b)) => b.to_string(),
        (ValueType::Char, Value::String(s)) => char_literal(s),
        (ValueType::Str, Value::String(s)) => string_literal(s),
        (ValueType::Object, value) => object_literal(value),
        (ValueType::Boxed(_), Value::Null) => "null".to_owned(),
        (ValueType::Boxed(inner), value) => literal(inner, value),
        (ValueType::Array(inner), Value::Array(items)) => {
            format!("new {}{}", ty.java_name(), array_initializer(inner, items))
        }
        (ValueType::List(inner), Value::Array(items)) => {
            list_literal(&inner.java_name(), items, |item| literal(inner, item))
        }
        _ => "null".to_owned(),
    }
}

/// `{a, b}` form, nested for multi-dimensional arrays
fn array_initializer(element: &ValueType, items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match (element, item) {
            (ValueType::Array(inner), Value::Array(nested)) => array_initializer(inner, nested),
            _ => literal(element, item),
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn list_literal(element: &str, items: &[Value], render: impl Fn(&Value) -> String) -> String {
    if items.is_empty() {
        return format!("new java.util.ArrayList<{element}>()");
    }
    let parts: Vec<String> = items.iter().map(render).collect();
    format!(
        "new java.util.ArrayList<{element}>(java.util.Arrays.<{element}>asList({}))",
        parts.join(", ")
    )
}

fn object_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => format!("Boolean.valueOf({b})"),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => format!("Integer.valueOf({i})"),
            Some(i) => format!("Long.valueOf({i}L)"),
            None => format!(
                "Double.valueOf({})",
                float_literal(n.as_f64().unwrap_or_default())
            ),
        },
        Value::String(s) => string_literal(s),
        Value::Array(items) => list_literal("Object", items, object_literal),
        Value::Object(_) => "null".to_owned(),
    }
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        push_escaped(&mut out, c, '"');
    }
    out.push('"');
    out
}

fn char_literal(s: &str) -> String {
    let mut out = String::from("'");
    for c in s.chars() {
        push_escaped(&mut out, c, '\'');
    }
    out.push('\'');
    out
}

/// javac translates `\u` escapes before lexing, so control characters use
/// octal escapes instead
fn push_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || c == '\u{7f}' => {
            let _ = write!(out, "\\{:03o}", c as u32);
        }
        c => out.push(c),
    }
}
