use serde_json::Value;

use crate::driver::{
    Driver, DriverError, SETUP_FAILURE_EXIT_CODE, SourceFile, quoted_json, setup_marker,
};

const SOLUTION_FILE: &str = "solution.py";
const ENTRY_FILE: &str = "driver.py";

const TEMPLATE: &str = r#"import builtins
import json
import os
import sys
import traceback

FUNCTION_NAME = "{{NAME}}"
SETUP_FAILURE = {{SETUP_FAILURE}}
SETUP_MARKER = "{{SETUP_MARKER}}"
HERE = os.path.dirname(os.path.abspath(__file__))

result_stream = sys.stdout
sys.stdout = sys.stderr
sys.setrecursionlimit(20000)
sys.path.insert(0, HERE)


def fail(code, message=None):
    if message:
        sys.stderr.write(message + "\n")
    sys.stderr.flush()
    os._exit(code)


def setup_failure(message=None):
    if message:
        sys.stderr.write(message + "\n")
    sys.stderr.write(SETUP_MARKER + "\n")
    fail(SETUP_FAILURE)


def encode_default(value):
    if isinstance(value, (set, frozenset, tuple)):
        return list(value)
    if hasattr(value, "tolist"):
        return value.tolist()
    if hasattr(value, "__dict__"):
        return vars(value)
    return str(value)


shadowed = getattr(builtins, FUNCTION_NAME, None)
namespace = {"__name__": "solution", "__file__": os.path.join(HERE, "{{SOLUTION}}")}

try:
    with open(namespace["__file__"], encoding="utf-8") as handle:
        code = compile(handle.read(), "{{SOLUTION}}", "exec")
except SyntaxError:
    traceback.print_exc(limit=0)
    setup_failure()

try:
    exec(code, namespace)
except BaseException:
    traceback.print_exc()
    fail(1)


def resolve():
    target = namespace.get(FUNCTION_NAME)
    if callable(target):
        return target
    target = getattr(builtins, FUNCTION_NAME, None)
    if callable(target) and target is not shadowed:
        return target
    solution = namespace.get("Solution")
    if isinstance(solution, type):
        method = getattr(solution(), FUNCTION_NAME, None)
        if callable(method):
            return method
    return None


try:
    function = resolve()
except BaseException:
    traceback.print_exc()
    fail(1)

if function is None:
    setup_failure("function '%s' not found" % FUNCTION_NAME)

args = json.loads({{ARGS}})

try:
    result = function(*args)
except BaseException:
    traceback.print_exc()
    fail(1)

sys.stdout = result_stream
sys.stdout.write(json.dumps(result, default=encode_default) + "\n")
sys.stdout.flush()
"#;

pub(crate) fn synthesize(source: &str, name: &str, args: &[Value]) -> Result<Driver, DriverError> {
    let marker = setup_marker();
    let entry = TEMPLATE
        .replace("{{NAME}}", name)
        .replace("{{SETUP_FAILURE}}", &SETUP_FAILURE_EXIT_CODE.to_string())
        .replace("{{SETUP_MARKER}}", &marker)
        .replace("{{SOLUTION}}", SOLUTION_FILE)
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
