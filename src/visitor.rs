use crate::resolver;
use crate::risk::RiskVerdict;
use crate::utils::{render_expr, LineIndex};
use rustpython_ast::{self as ast, Expr, Stmt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Whether an import was written as `import x` or `from x import ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Direct,
    From,
}

/// One name pulled in by a `from x import ...` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A structured fact about one import statement.
///
/// Records are emitted in source declaration order and never deduplicated;
/// `import a, b` produces one `Direct` record per listed module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub kind: ImportKind,
    /// Dotted module name (`urllib.request`).
    pub module: String,
    /// Binding alias for a direct import (`import numpy as np`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Named symbols for a from-import, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<ImportedName>,
}

/// One declared parameter of a function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    /// Annotation rendered as source-equivalent text (`List[str]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Everything extracted about one function definition.
///
/// Nested definitions are independent records; calls made inside nested
/// scopes, comprehensions, and lambdas are attributed to the nearest
/// enclosing function on the visit stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub params: Vec<ParameterRecord>,
    /// 1-indexed declaration line.
    pub line: usize,
    /// Raw call names in call-site order; attribute calls are reduced to the
    /// rightmost attribute (`response.json()` -> `json`).
    pub calls: Vec<String>,
    /// Dotted receiver-chain targets (`requests.get`, `a.b.c.method`).
    /// Consumed by risk scoring only.
    pub qualified_calls: BTreeSet<String>,
    /// Decorator expressions rendered as text, in declaration order.
    pub decorators: Vec<String>,
    pub is_async: bool,
    /// Assigned by the orchestrator once extraction completes; always `Some`
    /// on records it returns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskVerdict>,
}

/// Result of walking a call's receiver chain.
enum Receiver {
    /// Chain bottoms out in a plain name: the collected dotted segments.
    Named(Vec<String>),
    /// Chain bottoms out in another call expression (`f()(...)`); the outer
    /// call is not resolved. Known limitation, not an error.
    Call,
    /// Some other receiver shape (subscript, literal, ...).
    Opaque,
}

/// The extraction visitor: one forward pass over a parsed module.
///
/// Collects ordered imports and ordered function records, and consults the
/// local-dependency resolver for every import encountered. A fresh visitor
/// is created per analysis call; nothing here survives across files.
pub struct ExtractVisitor<'a> {
    /// Imports in source declaration order.
    pub imports: Vec<ImportRecord>,
    /// Function records in declaration order, nested definitions included.
    pub functions: Vec<FunctionRecord>,
    /// Resolved local-dependency paths, absolute.
    pub dependencies: BTreeSet<PathBuf>,
    /// Directory containing the analyzed file, for dependency resolution.
    base_dir: PathBuf,
    /// Helper for line number mapping.
    line_index: &'a LineIndex,
    /// Indices into `functions` for the currently open definitions.
    func_stack: Vec<usize>,
}

impl<'a> ExtractVisitor<'a> {
    pub fn new(base_dir: PathBuf, line_index: &'a LineIndex) -> Self {
        Self {
            imports: Vec::new(),
            functions: Vec::new(),
            dependencies: BTreeSet::new(),
            base_dir,
            line_index,
            func_stack: Vec::new(),
        }
    }

    fn resolve_dependency(&mut self, module: &str) {
        for path in resolver::resolve_local(module, &self.base_dir) {
            self.dependencies.insert(path);
        }
    }

    /// Visits a statement node in the AST.
    pub fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(node) => {
                self.visit_function_def(
                    node.name.as_str(),
                    &node.args,
                    &node.body,
                    &node.decorator_list,
                    false,
                    node.range.start(),
                );
            }
            Stmt::AsyncFunctionDef(node) => {
                self.visit_function_def(
                    node.name.as_str(),
                    &node.args,
                    &node.body,
                    &node.decorator_list,
                    true,
                    node.range.start(),
                );
            }
            // Methods are recorded like any other function; the class itself
            // carries no record.
            Stmt::ClassDef(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Import(node) => {
                for alias in &node.names {
                    let module = alias.name.to_string();
                    self.imports.push(ImportRecord {
                        kind: ImportKind::Direct,
                        module: module.clone(),
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                        names: Vec::new(),
                    });
                    self.resolve_dependency(&module);
                }
            }
            Stmt::ImportFrom(node) => {
                // `from . import x` has no module; relative levels are not
                // resolved further.
                let module = node
                    .module
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default();
                let names = node
                    .names
                    .iter()
                    .map(|alias| ImportedName {
                        name: alias.name.to_string(),
                        alias: alias.asname.as_ref().map(|a| a.to_string()),
                    })
                    .collect();
                self.imports.push(ImportRecord {
                    kind: ImportKind::From,
                    module: module.clone(),
                    alias: None,
                    names,
                });
                self.resolve_dependency(&module);
            }
            Stmt::Assign(node) => self.visit_expr(&node.value),
            Stmt::AugAssign(node) => self.visit_expr(&node.value),
            Stmt::AnnAssign(node) => {
                if let Some(value) = &node.value {
                    self.visit_expr(value);
                }
            }
            Stmt::Expr(node) => self.visit_expr(&node.value),
            Stmt::Return(node) => {
                if let Some(value) = &node.value {
                    self.visit_expr(value);
                }
            }
            Stmt::If(node) => {
                self.visit_expr(&node.test);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::For(node) => {
                self.visit_expr(&node.iter);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncFor(node) => {
                self.visit_expr(&node.iter);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::While(node) => {
                self.visit_expr(&node.test);
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::With(node) => {
                for item in &node.items {
                    self.visit_expr(&item.context_expr);
                }
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::AsyncWith(node) => {
                for item in &node.items {
                    self.visit_expr(&item.context_expr);
                }
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Try(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for handler in &node.handlers {
                    if let ast::ExceptHandler::ExceptHandler(handler_node) = handler {
                        if let Some(exc) = &handler_node.type_ {
                            self.visit_expr(exc);
                        }
                        for stmt in &handler_node.body {
                            self.visit_stmt(stmt);
                        }
                    }
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.finalbody {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::TryStar(node) => {
                for stmt in &node.body {
                    self.visit_stmt(stmt);
                }
                for handler in &node.handlers {
                    if let ast::ExceptHandler::ExceptHandler(handler_node) = handler {
                        if let Some(exc) = &handler_node.type_ {
                            self.visit_expr(exc);
                        }
                        for stmt in &handler_node.body {
                            self.visit_stmt(stmt);
                        }
                    }
                }
                for stmt in &node.orelse {
                    self.visit_stmt(stmt);
                }
                for stmt in &node.finalbody {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Raise(node) => {
                if let Some(exc) = &node.exc {
                    self.visit_expr(exc);
                }
                if let Some(cause) = &node.cause {
                    self.visit_expr(cause);
                }
            }
            Stmt::Assert(node) => {
                self.visit_expr(&node.test);
                if let Some(msg) = &node.msg {
                    self.visit_expr(msg);
                }
            }
            Stmt::Delete(node) => {
                for target in &node.targets {
                    self.visit_expr(target);
                }
            }
            Stmt::Match(node) => {
                self.visit_expr(&node.subject);
                for case in &node.cases {
                    if let Some(guard) = &case.guard {
                        self.visit_expr(guard);
                    }
                    for stmt in &case.body {
                        self.visit_stmt(stmt);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_function_def(
        &mut self,
        name: &str,
        args: &ast::Arguments,
        body: &[Stmt],
        decorator_list: &[Expr],
        is_async: bool,
        range_start: ast::TextSize,
    ) {
        // Default values evaluate in the enclosing scope, so they are
        // visited before the new function goes on the stack.
        self.visit_param_defaults(args);

        let record = FunctionRecord {
            name: name.to_string(),
            params: extract_params(args),
            line: self.line_index.line_index(range_start),
            calls: Vec::new(),
            qualified_calls: BTreeSet::new(),
            // Decorators are carried as rendered text, not re-parsed and not
            // treated as call sites of the decorated function.
            decorators: decorator_list.iter().map(render_expr).collect(),
            is_async,
            risk: None,
        };
        self.functions.push(record);
        let index = self.functions.len() - 1;

        self.func_stack.push(index);
        for stmt in body {
            self.visit_stmt(stmt);
        }
        self.func_stack.pop();
    }

    fn visit_param_defaults(&mut self, args: &ast::Arguments) {
        for arg in args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(&args.kwonlyargs)
        {
            if let Some(default) = &arg.default {
                self.visit_expr(default);
            }
        }
    }

    /// Records the call name (and qualified target, when the receiver chain
    /// resolves) against the nearest enclosing function. Module-level calls
    /// have no enclosing function and are dropped.
    fn record_call(&mut self, call: &ast::ExprCall) {
        let extracted = match &*call.func {
            Expr::Name(node) => Some((node.id.to_string(), None)),
            Expr::Attribute(node) => match receiver_chain(&node.value) {
                Receiver::Named(mut parts) => {
                    parts.push(node.attr.to_string());
                    Some((node.attr.to_string(), Some(parts.join("."))))
                }
                Receiver::Call => None,
                Receiver::Opaque => Some((node.attr.to_string(), None)),
            },
            // Computed call targets (`handlers[key](...)`, `f()(...)`) are
            // not resolved.
            _ => None,
        };

        if let (Some((name, qualified)), Some(&index)) = (extracted, self.func_stack.last()) {
            let record = &mut self.functions[index];
            record.calls.push(name);
            if let Some(target) = qualified {
                record.qualified_calls.insert(target);
            }
        }
    }

    /// Visits an expression node in the AST.
    pub fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(node) => {
                self.record_call(node);
                // The receiver is visited too so chained calls like
                // `a.b(x).c(y)` still surface the inner call.
                self.visit_expr(&node.func);
                for arg in &node.args {
                    self.visit_expr(arg);
                }
                for keyword in &node.keywords {
                    self.visit_expr(&keyword.value);
                }
            }
            Expr::Attribute(node) => self.visit_expr(&node.value),
            Expr::BoolOp(node) => {
                for value in &node.values {
                    self.visit_expr(value);
                }
            }
            Expr::BinOp(node) => {
                self.visit_expr(&node.left);
                self.visit_expr(&node.right);
            }
            Expr::UnaryOp(node) => self.visit_expr(&node.operand),
            Expr::Lambda(node) => {
                self.visit_param_defaults(&node.args);
                self.visit_expr(&node.body);
            }
            Expr::IfExp(node) => {
                self.visit_expr(&node.test);
                self.visit_expr(&node.body);
                self.visit_expr(&node.orelse);
            }
            Expr::Dict(node) => {
                for (key, value) in node.keys.iter().zip(&node.values) {
                    if let Some(k) = key {
                        self.visit_expr(k);
                    }
                    self.visit_expr(value);
                }
            }
            Expr::Set(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            Expr::ListComp(node) => {
                self.visit_expr(&node.elt);
                self.visit_generators(&node.generators);
            }
            Expr::SetComp(node) => {
                self.visit_expr(&node.elt);
                self.visit_generators(&node.generators);
            }
            Expr::DictComp(node) => {
                self.visit_expr(&node.key);
                self.visit_expr(&node.value);
                self.visit_generators(&node.generators);
            }
            Expr::GeneratorExp(node) => {
                self.visit_expr(&node.elt);
                self.visit_generators(&node.generators);
            }
            Expr::Await(node) => self.visit_expr(&node.value),
            Expr::Yield(node) => {
                if let Some(value) = &node.value {
                    self.visit_expr(value);
                }
            }
            Expr::YieldFrom(node) => self.visit_expr(&node.value),
            Expr::Compare(node) => {
                self.visit_expr(&node.left);
                for comparator in &node.comparators {
                    self.visit_expr(comparator);
                }
            }
            Expr::Subscript(node) => {
                self.visit_expr(&node.value);
                self.visit_expr(&node.slice);
            }
            Expr::Starred(node) => self.visit_expr(&node.value),
            Expr::NamedExpr(node) => self.visit_expr(&node.value),
            Expr::FormattedValue(node) => self.visit_expr(&node.value),
            Expr::JoinedStr(node) => {
                for value in &node.values {
                    self.visit_expr(value);
                }
            }
            Expr::List(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            Expr::Tuple(node) => {
                for elt in &node.elts {
                    self.visit_expr(elt);
                }
            }
            Expr::Slice(node) => {
                if let Some(lower) = &node.lower {
                    self.visit_expr(lower);
                }
                if let Some(upper) = &node.upper {
                    self.visit_expr(upper);
                }
                if let Some(step) = &node.step {
                    self.visit_expr(step);
                }
            }
            _ => {}
        }
    }

    fn visit_generators(&mut self, generators: &[ast::Comprehension]) {
        for gen in generators {
            self.visit_expr(&gen.iter);
            for if_expr in &gen.ifs {
                self.visit_expr(if_expr);
            }
        }
    }
}

/// Walks a call receiver chain bottom-up (`a.b.c` -> ["a", "b", "c"]).
fn receiver_chain(expr: &Expr) -> Receiver {
    match expr {
        Expr::Name(node) => Receiver::Named(vec![node.id.to_string()]),
        Expr::Attribute(node) => match receiver_chain(&node.value) {
            Receiver::Named(mut parts) => {
                parts.push(node.attr.to_string());
                Receiver::Named(parts)
            }
            other => other,
        },
        Expr::Call(_) => Receiver::Call,
        _ => Receiver::Opaque,
    }
}

fn extract_params(args: &ast::Arguments) -> Vec<ParameterRecord> {
    let mut params = Vec::new();

    let mut push_arg = |arg: &ast::Arg| {
        params.push(ParameterRecord {
            name: arg.arg.to_string(),
            annotation: arg.annotation.as_deref().map(render_expr),
        });
    };

    for arg in &args.posonlyargs {
        push_arg(&arg.def);
    }
    for arg in &args.args {
        push_arg(&arg.def);
    }
    if let Some(vararg) = &args.vararg {
        push_arg(vararg);
    }
    for arg in &args.kwonlyargs {
        push_arg(&arg.def);
    }
    if let Some(kwarg) = &args.kwarg {
        push_arg(kwarg);
    }

    params
}
