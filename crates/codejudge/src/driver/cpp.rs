use std::fmt::Write as _;

use serde_json::Value;

use crate::driver::signature::{self, Dialect, ValueType};
use crate::driver::{Driver, DriverError, SourceFile, float_literal};

const SOLUTION_FILE: &str = "solution.cpp";
const ENTRY_FILE: &str = "main.cpp";

const PRELUDE: &str = r#"#include <bits/stdc++.h>
using namespace std;

#define main judge_user_main
#include "solution.cpp"
#undef main

namespace judge_io {

inline void emit_string(std::ostream& os, const std::string& s) {
    os << '"';
    for (unsigned char c : s) {
        switch (c) {
            case '"': os << "\\\""; break;
            case '\\': os << "\\\\"; break;
            case '\n': os << "\\n"; break;
            case '\r': os << "\\r"; break;
            case '\t': os << "\\t"; break;
            default:
                if (c < 0x20) {
                    char buf[8];
                    std::snprintf(buf, sizeof buf, "\\u%04x", c);
                    os << buf;
                } else {
                    os << c;
                }
        }
    }
    os << '"';
}

inline void emit(std::ostream& os, bool v) { os << (v ? "true" : "false"); }
inline void emit(std::ostream& os, char v) { emit_string(os, std::string(1, v)); }
inline void emit(std::ostream& os, const std::string& v) { emit_string(os, v); }
inline void emit(std::ostream& os, const char* v) { emit_string(os, v); }

template <typename T>
typename std::enable_if<std::is_integral<T>::value>::type emit(std::ostream& os, T v) {
    os << +v;
}

template <typename T>
typename std::enable_if<std::is_floating_point<T>::value>::type emit(std::ostream& os, T v) {
    if (!std::isfinite(v)) {
        os << "null";
        return;
    }
    std::ostringstream s;
    s << std::setprecision(15) << v;
    os << s.str();
}

template <typename T> void emit(std::ostream& os, const std::vector<T>& v);
template <typename A, typename B> void emit(std::ostream& os, const std::pair<A, B>& p);

template <typename T> void emit(std::ostream& os, const std::vector<T>& v) {
    os << '[';
    bool first = true;
    for (const auto& item : v) {
        if (!first) os << ',';
        first = false;
        emit(os, static_cast<const T&>(item));
    }
    os << ']';
}

template <typename A, typename B> void emit(std::ostream& os, const std::pair<A, B>& p) {
    os << '[';
    emit(os, p.first);
    os << ',';
    emit(os, p.second);
    os << ']';
}

}  // namespace judge_io

int main() {
    std::streambuf* judge_out = std::cout.rdbuf(std::cerr.rdbuf());
    try {
{{INVOKE}}
    } catch (const std::exception& e) {
        std::cout.rdbuf(judge_out);
        std::cerr << "terminate called after throwing: " << e.what() << std::endl;
        return 1;
    } catch (...) {
        std::cout.rdbuf(judge_out);
        std::cerr << "terminate called after throwing a non-standard exception" << std::endl;
        return 1;
    }
    return 0;
}
"#;

pub(crate) fn synthesize(source: &str, name: &str, args: &[Value]) -> Result<Driver, DriverError> {
    let plan = signature::resolve(Dialect::Cpp, source, name, args)?;

    let mut body = String::new();
    let mut arguments = Vec::with_capacity(plan.bindings.len());
    for (i, binding) in plan.bindings.iter().enumerate() {
        let local = format!("judge_arg{i}");
        let _ = writeln!(
            body,
            "        {} {local} = {};",
            binding.param.raw_type,
            initializer(&binding.param.ty, &binding.value)
        );
        arguments.push(local);
    }

    let arguments = arguments.join(", ");
    let call = match (&plan.method.owner, plan.method.is_static) {
        (Some(owner), true) => format!("{owner}::{name}({arguments})"),
        (Some(owner), false) => {
            let _ = writeln!(body, "        {owner} judge_instance;");
            format!("judge_instance.{name}({arguments})")
        }
        (None, _) => format!("{name}({arguments})"),
    };

    if plan.method.return_type == ValueType::Void {
        let _ = writeln!(body, "        {call};");
        body.push_str("        std::cout.rdbuf(judge_out);\n");
        body.push_str("        std::cout << \"null\" << std::endl;");
    } else {
        let _ = writeln!(body, "        auto judge_result = {call};");
        body.push_str("        std::cout.rdbuf(judge_out);\n");
        body.push_str("        judge_io::emit(std::cout, judge_result);\n");
        body.push_str("        std::cout << std::endl;");
    }

    Ok(Driver {
        entry_file: ENTRY_FILE.to_owned(),
        files: vec![
            SourceFile::new(SOLUTION_FILE, source),
            SourceFile::new(ENTRY_FILE, PRELUDE.replace("{{INVOKE}}", &body)),
        ],
        setup_marker: None,
    })
}

/// Initializer for a local of type `ty`; vectors use brace lists so nested
/// and empty values need no type spelled out
fn initializer(ty: &ValueType, value: &Value) -> String {
    match (ty, value) {
        (ValueType::Int, Value::Number(n)) => n.to_string(),
        (ValueType::Long, Value::Number(n)) => format!("{n}LL"),
        (ValueType::Double, Value::Number(n)) => float_literal(n.as_f64().unwrap_or_default()),
        (ValueType::Float, Value::Number(n)) => {
            format!("{}f", float_literal(n.as_f64().unwrap_or_default()))
        }
        (ValueType::Bool, Value::Bool(b)) => b.to_string(),
        (ValueType::Char, Value::String(s)) => quoted(s, '\''),
        (ValueType::Str, Value::String(s)) => quoted(s, '"'),
        (ValueType::Array(inner), Value::Array(items)) => {
            let parts: Vec<String> = items.iter().map(|item| initializer(inner, item)).collect();
            format!("{{{}}}", parts.join(", "))
        }
        _ => "{}".to_owned(),
    }
}

/// Byte-wise literal; non-printable and non-ASCII bytes become three-digit
/// octal escapes so a following digit is never absorbed
fn quoted(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for byte in s.bytes() {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' | b'\'' if byte as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out.push(quote);
    out
}
