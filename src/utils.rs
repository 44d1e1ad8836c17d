use rustpython_ast::{self as ast, Expr, TextSize};

/// A utility struct to convert byte offsets to line numbers.
///
/// The AST parser reports node positions as byte offsets, but analysis
/// records carry 1-indexed line numbers which are more human-readable.
pub struct LineIndex {
    /// Stores the byte index of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Creates a new `LineIndex` by scanning the source code for newlines.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a `TextSize` (byte offset) to a 1-indexed line number.
    pub fn line_index(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

/// Renders an expression back to source-equivalent text.
///
/// Used for parameter annotations and decorators, which are carried in the
/// analysis records as plain strings (e.g. `List[str]`, `app.route('/x')`)
/// rather than nested AST structures. Best-effort for the expression shapes
/// that realistically appear in those positions; anything else degrades to a
/// placeholder.
pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Name(node) => node.id.to_string(),
        Expr::Attribute(node) => {
            format!("{}.{}", render_expr(&node.value), node.attr)
        }
        Expr::Subscript(node) => {
            format!("{}[{}]", render_expr(&node.value), render_expr(&node.slice))
        }
        Expr::Constant(node) => render_constant(&node.value),
        // Tuples render without parentheses so `Dict[str, int]` comes out
        // exactly as written; bare tuples in these positions are rare.
        Expr::Tuple(node) => {
            let parts: Vec<String> = node.elts.iter().map(render_expr).collect();
            parts.join(", ")
        }
        Expr::List(node) => {
            let parts: Vec<String> = node.elts.iter().map(render_expr).collect();
            format!("[{}]", parts.join(", "))
        }
        Expr::Call(node) => {
            let mut parts: Vec<String> = node.args.iter().map(render_expr).collect();
            for keyword in &node.keywords {
                match &keyword.arg {
                    Some(arg) => parts.push(format!("{}={}", arg, render_expr(&keyword.value))),
                    None => parts.push(format!("**{}", render_expr(&keyword.value))),
                }
            }
            format!("{}({})", render_expr(&node.func), parts.join(", "))
        }
        Expr::BinOp(node) => {
            format!(
                "{} {} {}",
                render_expr(&node.left),
                operator_symbol(&node.op),
                render_expr(&node.right)
            )
        }
        Expr::UnaryOp(node) => {
            let symbol = match node.op {
                ast::UnaryOp::Not => "not ",
                ast::UnaryOp::Invert => "~",
                ast::UnaryOp::UAdd => "+",
                ast::UnaryOp::USub => "-",
            };
            format!("{}{}", symbol, render_expr(&node.operand))
        }
        Expr::Starred(node) => format!("*{}", render_expr(&node.value)),
        _ => "<expr>".to_string(),
    }
}

fn render_constant(constant: &ast::Constant) -> String {
    match constant {
        ast::Constant::None => "None".to_string(),
        ast::Constant::Bool(true) => "True".to_string(),
        ast::Constant::Bool(false) => "False".to_string(),
        ast::Constant::Str(s) => format!("'{}'", s),
        ast::Constant::Int(i) => i.to_string(),
        ast::Constant::Float(f) => f.to_string(),
        ast::Constant::Ellipsis => "...".to_string(),
        _ => "<const>".to_string(),
    }
}

fn operator_symbol(op: &ast::Operator) -> &'static str {
    match op {
        ast::Operator::Add => "+",
        ast::Operator::Sub => "-",
        ast::Operator::Mult => "*",
        ast::Operator::MatMult => "@",
        ast::Operator::Div => "/",
        ast::Operator::Mod => "%",
        ast::Operator::Pow => "**",
        ast::Operator::LShift => "<<",
        ast::Operator::RShift => ">>",
        ast::Operator::BitOr => "|",
        ast::Operator::BitXor => "^",
        ast::Operator::BitAnd => "&",
        ast::Operator::FloorDiv => "//",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_parser::{parse, Mode};

    fn first_expr(code: &str) -> Expr {
        let tree = parse(code, Mode::Module, "test.py").expect("Failed to parse");
        if let rustpython_ast::Mod::Module(module) = tree {
            if let rustpython_ast::Stmt::Expr(node) = &module.body[0] {
                return (*node.value).clone();
            }
        }
        panic!("expected a single expression statement");
    }

    #[test]
    fn test_line_index() {
        let source = "a = 1\nb = 2\nc = 3\n";
        let index = LineIndex::new(source);
        assert_eq!(index.line_index(TextSize::from(0)), 1);
        assert_eq!(index.line_index(TextSize::from(6)), 2);
        assert_eq!(index.line_index(TextSize::from(13)), 3);
    }

    #[test]
    fn test_render_subscript_annotation() {
        assert_eq!(render_expr(&first_expr("List[str]")), "List[str]");
        assert_eq!(render_expr(&first_expr("Dict[str, int]")), "Dict[str, int]");
    }

    #[test]
    fn test_render_dotted_name() {
        assert_eq!(
            render_expr(&first_expr("typing.Optional[int]")),
            "typing.Optional[int]"
        );
    }

    #[test]
    fn test_render_union_annotation() {
        assert_eq!(render_expr(&first_expr("int | None")), "int | None");
    }

    #[test]
    fn test_render_decorator_call() {
        assert_eq!(
            render_expr(&first_expr("app.route('/users', methods=['GET'])")),
            "app.route('/users', methods=['GET'])"
        );
    }
}
