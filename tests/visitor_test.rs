use pyrisk::utils::LineIndex;
use pyrisk::visitor::{ExtractVisitor, ImportKind};
use rustpython_parser::{parse, Mode};
use std::path::PathBuf;

macro_rules! visit_code {
    ($code:expr, $visitor:ident) => {
        let tree = parse($code, Mode::Module, "test.py").expect("Failed to parse");
        let line_index = LineIndex::new($code);
        let mut $visitor = ExtractVisitor::new(PathBuf::from("."), &line_index);

        if let rustpython_ast::Mod::Module(module) = tree {
            for stmt in &module.body {
                $visitor.visit_stmt(stmt);
            }
        }
    };
}

#[test]
fn test_simple_function() {
    let code = r#"
def my_function():
    pass
"#;
    visit_code!(code, visitor);

    assert_eq!(visitor.functions.len(), 1);
    let func = &visitor.functions[0];
    assert_eq!(func.name, "my_function");
    assert_eq!(func.line, 2);
    assert!(!func.is_async);
    assert!(func.calls.is_empty());
}

#[test]
fn test_async_function() {
    let code = r#"
async def poll():
    await check_status()
"#;
    visit_code!(code, visitor);

    assert_eq!(visitor.functions.len(), 1);
    let func = &visitor.functions[0];
    assert!(func.is_async);
    assert_eq!(func.calls, vec!["check_status"]);
}

#[test]
fn test_import_order_preserved() {
    let code = r#"
import zlib
import os
from typing import List
import os
import abc
"#;
    visit_code!(code, visitor);

    let modules: Vec<&str> = visitor.imports.iter().map(|i| i.module.as_str()).collect();
    // Declaration order, duplicates kept.
    assert_eq!(modules, vec!["zlib", "os", "typing", "os", "abc"]);
}

#[test]
fn test_direct_import_alias() {
    let code = r#"
import numpy as np
"#;
    visit_code!(code, visitor);

    let record = &visitor.imports[0];
    assert_eq!(record.kind, ImportKind::Direct);
    assert_eq!(record.module, "numpy");
    assert_eq!(record.alias.as_deref(), Some("np"));
}

#[test]
fn test_from_import_names() {
    let code = r#"
from collections import defaultdict, Counter as C
"#;
    visit_code!(code, visitor);

    let record = &visitor.imports[0];
    assert_eq!(record.kind, ImportKind::From);
    assert_eq!(record.module, "collections");
    assert_eq!(record.names.len(), 2);
    assert_eq!(record.names[0].name, "defaultdict");
    assert_eq!(record.names[0].alias, None);
    assert_eq!(record.names[1].name, "Counter");
    assert_eq!(record.names[1].alias.as_deref(), Some("C"));
}

#[test]
fn test_annotated_parameter() {
    let code = r#"
def process(data: List[str]):
    return data
"#;
    visit_code!(code, visitor);

    let func = &visitor.functions[0];
    assert_eq!(func.params.len(), 1);
    assert_eq!(func.params[0].name, "data");
    assert_eq!(func.params[0].annotation.as_deref(), Some("List[str]"));
}

#[test]
fn test_parameter_kinds() {
    let code = r#"
def f(a, b: int = 0, *rest, key=None, **extra):
    pass
"#;
    visit_code!(code, visitor);

    let names: Vec<&str> = visitor.functions[0]
        .params
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "rest", "key", "extra"]);
}

#[test]
fn test_qualified_call_chain() {
    let code = r#"
def deep():
    a.b.c.method(1)
"#;
    visit_code!(code, visitor);

    let func = &visitor.functions[0];
    assert_eq!(func.calls, vec!["method"]);
    assert!(func.qualified_calls.contains("a.b.c.method"));
}

#[test]
fn test_call_of_call_not_resolved() {
    let code = r#"
def tricky():
    factory()()
"#;
    visit_code!(code, visitor);

    // The outer call has a call receiver and contributes nothing; the inner
    // call to factory is still recorded.
    let func = &visitor.functions[0];
    assert_eq!(func.calls, vec!["factory"]);
    assert!(func.qualified_calls.is_empty());
}

#[test]
fn test_chained_method_calls() {
    let code = r#"
def chained():
    client.connect().send(data)
"#;
    visit_code!(code, visitor);

    // `send` rides on a call receiver so only `connect` resolves.
    let func = &visitor.functions[0];
    assert_eq!(func.calls, vec!["connect"]);
    assert!(func.qualified_calls.contains("client.connect"));
}

#[test]
fn test_nested_function_attribution() {
    let code = r#"
def outer():
    setup()
    def inner():
        teardown()
    inner()
"#;
    visit_code!(code, visitor);

    assert_eq!(visitor.functions.len(), 2);
    let outer = visitor.functions.iter().find(|f| f.name == "outer").unwrap();
    let inner = visitor.functions.iter().find(|f| f.name == "inner").unwrap();

    // `teardown` belongs to the nearest enclosing definition, not `outer`.
    assert_eq!(outer.calls, vec!["setup", "inner"]);
    assert_eq!(inner.calls, vec!["teardown"]);
}

#[test]
fn test_calls_in_comprehension_and_lambda() {
    let code = r#"
def transform(rows):
    cleaned = [scrub(r) for r in rows]
    key = lambda r: weight(r)
    return sorted(cleaned, key=key)
"#;
    visit_code!(code, visitor);

    let func = &visitor.functions[0];
    assert!(func.calls.contains(&"scrub".to_string()));
    assert!(func.calls.contains(&"weight".to_string()));
    assert!(func.calls.contains(&"sorted".to_string()));
}

#[test]
fn test_module_level_calls_dropped() {
    let code = r#"
configure()

def f():
    pass
"#;
    visit_code!(code, visitor);

    assert!(visitor.functions[0].calls.is_empty());
}

#[test]
fn test_methods_recorded_as_functions() {
    let code = r#"
class Service:
    def start(self):
        self.log.info("starting")

    async def stop(self):
        pass
"#;
    visit_code!(code, visitor);

    assert_eq!(visitor.functions.len(), 2);
    let start = &visitor.functions[0];
    assert_eq!(start.name, "start");
    assert_eq!(start.calls, vec!["info"]);
    assert!(start.qualified_calls.contains("self.log.info"));
    assert!(visitor.functions[1].is_async);
}

#[test]
fn test_decorators_rendered() {
    let code = r#"
@staticmethod
@app.route('/health')
def health():
    pass
"#;
    visit_code!(code, visitor);

    let func = &visitor.functions[0];
    assert_eq!(
        func.decorators,
        vec!["staticmethod".to_string(), "app.route('/health')".to_string()]
    );
}

#[test]
fn test_calls_in_match_statement() {
    let code = r#"
def route(command, url):
    match classify(command):
        case "fetch" if allowed(url):
            return requests.get(url)
        case _:
            return None
"#;
    visit_code!(code, visitor);

    // Subject, guard, and case bodies are all traversed.
    let func = &visitor.functions[0];
    for expected in ["classify", "allowed", "get"] {
        assert!(
            func.calls.contains(&expected.to_string()),
            "missing {expected}"
        );
    }
    assert!(func.qualified_calls.contains("requests.get"));
}

#[test]
fn test_calls_in_parameter_defaults() {
    let code = r#"
def outer():
    def inner(conn=open_connection(), *, limit=max_limit()):
        pass
    cb = lambda x, scale=default_scale(): x * scale
"#;
    visit_code!(code, visitor);

    let outer = visitor.functions.iter().find(|f| f.name == "outer").unwrap();
    let inner = visitor.functions.iter().find(|f| f.name == "inner").unwrap();

    // Defaults evaluate in the enclosing scope, so the calls belong to
    // `outer`, not to the function they parameterize.
    for expected in ["open_connection", "max_limit", "default_scale"] {
        assert!(
            outer.calls.contains(&expected.to_string()),
            "missing {expected}"
        );
    }
    assert!(inner.calls.is_empty());
}

#[test]
fn test_calls_in_control_flow() {
    let code = r#"
def branchy(flag):
    if check(flag):
        for item in fetch_items():
            handle(item)
    else:
        try:
            fallback()
        except ValueError:
            recover()
"#;
    visit_code!(code, visitor);

    let calls = &visitor.functions[0].calls;
    for expected in ["check", "fetch_items", "handle", "fallback", "recover"] {
        assert!(calls.contains(&expected.to_string()), "missing {expected}");
    }
}
