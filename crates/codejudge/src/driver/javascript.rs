use serde_json::Value;

use crate::driver::{
    Driver, DriverError, SETUP_FAILURE_EXIT_CODE, SourceFile, quoted_json, setup_marker,
};

const SOLUTION_FILE: &str = "solution.js";
const ENTRY_FILE: &str = "driver.js";

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "let", "static", "await",
];

const TEMPLATE: &str = r#"'use strict';
const fs = require('fs');
const path = require('path');

const FUNCTION_NAME = '{{NAME}}';
const SETUP_FAILURE = {{SETUP_FAILURE}};
const SETUP_MARKER = '{{SETUP_MARKER}}';
const shadowed = globalThis[FUNCTION_NAME];

const resultStream = process.stdout;
console.log = console.error;
console.info = console.error;
console.debug = console.error;

function describe(err) {
  return err && err.stack ? String(err.stack) : String(err);
}

function fail(code, message) {
  process.stderr.write(message + '\n', () => process.exit(code));
}

function setupFailure(message) {
  fail(SETUP_FAILURE, message + '\n' + SETUP_MARKER);
}

function encode(value) {
  const text = JSON.stringify(value === undefined ? null : value, (key, item) => {
    if (typeof item === 'bigint') return Number(item);
    if (item instanceof Set) return Array.from(item);
    if (item instanceof Map) return Object.fromEntries(item);
    return item;
  });
  return text === undefined ? 'null' : text;
}

function load() {
  const source = fs.readFileSync(path.join(__dirname, '{{SOLUTION}}'), 'utf8');
  const userModule = { exports: {} };
  let factory;
  try {
    factory = new Function('module', 'exports', 'require', '__filename', '__dirname',
      source + '\n;return [{{DIRECT}}, typeof Solution === "function" ? Solution : undefined];');
  } catch (err) {
    setupFailure(describe(err));
    return null;
  }
  const [direct, SolutionClass] = factory(
    userModule, userModule.exports, require, path.join(__dirname, '{{SOLUTION}}'), __dirname);
  return { direct, SolutionClass, exported: userModule.exports };
}

function resolve(scope) {
  if (typeof scope.direct === 'function' && scope.direct !== shadowed) {
    return { fn: scope.direct, self: undefined };
  }
  const exported = scope.exported;
  if (exported && typeof exported[FUNCTION_NAME] === 'function') {
    return { fn: exported[FUNCTION_NAME], self: exported };
  }
  if (typeof exported === 'function' && exported.name === FUNCTION_NAME) {
    return { fn: exported, self: undefined };
  }
  if (typeof globalThis[FUNCTION_NAME] === 'function' && globalThis[FUNCTION_NAME] !== shadowed) {
    return { fn: globalThis[FUNCTION_NAME], self: globalThis };
  }
  if (typeof scope.SolutionClass === 'function') {
    const instance = new scope.SolutionClass();
    if (instance && typeof instance[FUNCTION_NAME] === 'function') {
      return { fn: instance[FUNCTION_NAME], self: instance };
    }
  }
  return null;
}

let target;
try {
  const scope = load();
  if (scope === null) return;
  target = resolve(scope);
} catch (err) {
  fail(1, describe(err));
  return;
}

if (target === null) {
  setupFailure("function '" + FUNCTION_NAME + "' not found");
} else {
  const args = JSON.parse({{ARGS}});
  Promise.resolve()
    .then(() => target.fn.apply(target.self, args))
    .then(
      (result) => resultStream.write(encode(result) + '\n', () => process.exit(0)),
      (err) => fail(1, describe(err)),
    );
}
"#;

pub(crate) fn synthesize(source: &str, name: &str, args: &[Value]) -> Result<Driver, DriverError> {
    let direct = if is_plain_identifier(name) {
        format!("typeof {name} === \"function\" ? {name} : undefined")
    } else {
        "undefined".to_owned()
    };

    let marker = setup_marker();
    let entry = TEMPLATE
        .replace("{{NAME}}", name)
        .replace("{{SETUP_FAILURE}}", &SETUP_FAILURE_EXIT_CODE.to_string())
        .replace("{{SETUP_MARKER}}", &marker)
        .replace("{{SOLUTION}}", SOLUTION_FILE)
        .replace("{{DIRECT}}", &direct)
        .replace("{{ARGS}}", &quoted_json(args)?);

    Ok(Driver {
        entry_file: ENTRY_FILE.to_owned(),
        files: vec![
            SourceFile::new(SOLUTION_FILE, source),
            SourceFile::new(ENTRY_FILE, entry),
        ],
        setup_marker: Some(marker),
    })
}

/// Whether `name` can appear as a bare identifier expression
fn is_plain_identifier(name: &str) -> bool {
    name.chars().next().is_some_and(|c| !c.is_ascii_digit()) && !RESERVED.contains(&name)
}
