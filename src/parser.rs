// File: src/parser.rs
//
// Recursive descent parser for the IBTL language.
// Transforms the token stream into an AST with exactly one token of
// lookahead, mirroring the fully bracketed prefix grammar: every compound
// construct sits between matching brackets, and a bare constant or
// identifier is itself a complete minimal scope.
//
// The one genuinely ambiguous spot is minus, which is both a unary and a
// binary operator; it is resolved here by checking for a second operand
// before the closing bracket. The let form needs one extra token of
// lookahead after its first identifier: a type name means a variable
// declaration list, another identifier means a function declaration.
//
// There is no error recovery: the first token that does not satisfy the
// grammar's expected continuation aborts the parse.

use crate::ast::{BinOp, Node, Type, UnOp, VarDecl};
use crate::errors::CompileError;
use crate::lexer::{Lexer, Token, TokenAttr, TokenKind};

/// Parser holding the lexer and the single lookahead token
pub struct Parser {
    lexer: Lexer,
    cur: Token,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
            cur: Token::new(TokenKind::Eof, TokenAttr::None, "", 0),
        }
    }

    /// Parse one compilation unit: bracket, one or more scopes, bracket,
    /// end of input
    pub fn parse(&mut self) -> Result<Node, CompileError> {
        self.advance()?;
        let line = self.cur.line;
        self.discard(TokenKind::OpenBracket)?;
        let scopes = self.scopelist()?;
        self.discard(TokenKind::CloseBracket)?;
        self.discard(TokenKind::Eof)?;
        Ok(Node::Program { scopes, line })
    }

    // --- token plumbing ---

    fn advance(&mut self) -> Result<(), CompileError> {
        self.cur = self.lexer.next_token()?;
        Ok(())
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    /// Take the current token and advance, or fail naming the expected
    /// category
    fn take(&mut self, expect: TokenKind) -> Result<Token, CompileError> {
        if self.cur.kind != expect {
            return Err(self.expected(expect));
        }
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.cur, next))
    }

    /// Discard the current token and advance, or fail naming the expected
    /// category
    fn discard(&mut self, expect: TokenKind) -> Result<(), CompileError> {
        if self.cur.kind != expect {
            return Err(self.expected(expect));
        }
        self.advance()
    }

    fn expected(&self, expect: TokenKind) -> CompileError {
        CompileError::parse(
            format!("expected {}, found {}", expect, self.cur.kind),
            self.cur.line,
        )
    }

    fn err(&self, expected_what: &str) -> CompileError {
        CompileError::parse(
            format!("expected {}, found {}", expected_what, self.cur.kind),
            self.cur.line,
        )
    }

    /// True when the current token can start a scope
    fn starts_scope(&self) -> bool {
        matches!(
            self.cur.kind,
            TokenKind::OpenBracket | TokenKind::Ident | TokenKind::Constant
        )
    }

    // --- scopes ---

    fn scopelist(&mut self) -> Result<Vec<Node>, CompileError> {
        let mut scopes = vec![self.scope()?];
        loop {
            if self.is(TokenKind::CloseBracket) {
                return Ok(scopes);
            }
            if self.starts_scope() {
                scopes.push(self.scope()?);
            } else {
                return Err(self.err("']', '[', a constant or an identifier"));
            }
        }
    }

    fn scope(&mut self) -> Result<Node, CompileError> {
        if self.is(TokenKind::Constant) || self.is(TokenKind::Ident) {
            return self.expr();
        }
        if self.is(TokenKind::OpenBracket) {
            let line = self.cur.line;
            self.discard(TokenKind::OpenBracket)?;
            return self.scope_suffix(line);
        }
        Err(self.err("'[', a constant or an identifier"))
    }

    /// After the opening bracket of a scope: a nested scope list, an empty
    /// scope, or an expression suffix
    fn scope_suffix(&mut self, line: usize) -> Result<Node, CompileError> {
        if self.is(TokenKind::OpenBracket) || self.is(TokenKind::Constant) {
            let scopes = self.scopelist()?;
            self.discard(TokenKind::CloseBracket)?;
            return Ok(Node::Scope { scopes, line });
        }
        if self.is(TokenKind::CloseBracket) {
            self.discard(TokenKind::CloseBracket)?;
            return Ok(Node::Scope { scopes: Vec::new(), line });
        }
        self.expr_suffix()
    }

    // --- expressions ---

    fn expr(&mut self) -> Result<Node, CompileError> {
        if self.is(TokenKind::OpenBracket) {
            self.discard(TokenKind::OpenBracket)?;
            return self.expr_suffix();
        }
        if self.is(TokenKind::Constant) {
            return Ok(Node::Constant(self.take(TokenKind::Constant)?));
        }
        if self.is(TokenKind::Ident) {
            return Ok(Node::Ident(self.take(TokenKind::Ident)?));
        }
        Err(self.err("'[', a constant or an identifier"))
    }

    /// Dispatch after an expression's opening bracket
    fn expr_suffix(&mut self) -> Result<Node, CompileError> {
        match self.cur.kind {
            TokenKind::BinOp => self.binop(),
            TokenKind::UnOp => self.unop(),
            TokenKind::Minus => self.minus(),
            TokenKind::Assign => self.assign(),
            TokenKind::Ident => self.call(),
            TokenKind::Statement => self.stmt_suffix(),
            _ => Err(self.err("an operator, identifier or statement keyword")),
        }
    }

    /// An operand: bracketed operator application, constant or identifier
    fn oper(&mut self) -> Result<Node, CompileError> {
        if self.is(TokenKind::OpenBracket) {
            self.discard(TokenKind::OpenBracket)?;
            return self.oper_suffix();
        }
        if self.is(TokenKind::Constant) {
            return Ok(Node::Constant(self.take(TokenKind::Constant)?));
        }
        if self.is(TokenKind::Ident) {
            return Ok(Node::Ident(self.take(TokenKind::Ident)?));
        }
        Err(self.err("'[', a constant or an identifier"))
    }

    fn oper_suffix(&mut self) -> Result<Node, CompileError> {
        match self.cur.kind {
            TokenKind::BinOp => self.binop(),
            TokenKind::UnOp => self.unop(),
            TokenKind::Minus => self.minus(),
            TokenKind::Assign => self.assign(),
            TokenKind::Ident => self.call(),
            _ => Err(self.err("an operator or identifier")),
        }
    }

    fn binop(&mut self) -> Result<Node, CompileError> {
        let op_tok = self.take(TokenKind::BinOp)?;
        let left = self.oper()?;
        let right = self.oper()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Binop {
            op: binop_from_attr(op_tok.attr),
            left: Box::new(left),
            right: Box::new(right),
            line: op_tok.line,
        })
    }

    fn unop(&mut self) -> Result<Node, CompileError> {
        let op_tok = self.take(TokenKind::UnOp)?;
        let operand = self.oper()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Unop {
            op: unop_from_attr(op_tok.attr),
            operand: Box::new(operand),
            line: op_tok.line,
        })
    }

    /// Ambiguous minus: a second operand before the closing bracket makes
    /// it binary subtraction, otherwise it is unary negation
    fn minus(&mut self) -> Result<Node, CompileError> {
        let op_tok = self.take(TokenKind::Minus)?;
        let left = self.oper()?;
        if self.is(TokenKind::CloseBracket) {
            self.discard(TokenKind::CloseBracket)?;
            return Ok(Node::Unop {
                op: UnOp::Neg,
                operand: Box::new(left),
                line: op_tok.line,
            });
        }
        let right = self.oper()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Binop {
            op: BinOp::Sub,
            left: Box::new(left),
            right: Box::new(right),
            line: op_tok.line,
        })
    }

    fn assign(&mut self) -> Result<Node, CompileError> {
        let line = self.cur.line;
        self.discard(TokenKind::Assign)?;
        let name = self.take(TokenKind::Ident)?;
        let value = self.oper()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Assign {
            name: name.text,
            value: Box::new(value),
            line,
        })
    }

    /// Function application: identifier head, operands up to the bracket
    fn call(&mut self) -> Result<Node, CompileError> {
        let name = self.take(TokenKind::Ident)?;
        let mut args = Vec::new();
        while !self.is(TokenKind::CloseBracket) {
            args.push(self.oper()?);
        }
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Call {
            name: name.text,
            args,
            line: name.line,
        })
    }

    // --- statements ---

    fn stmt_suffix(&mut self) -> Result<Node, CompileError> {
        match self.cur.attr {
            TokenAttr::KIf => self.if_stmt(),
            TokenAttr::KWhile => self.while_stmt(),
            TokenAttr::KLet => self.let_stmt(),
            TokenAttr::KPrint => self.print_stmt(),
            _ => Err(self.err("a statement keyword")),
        }
    }

    fn if_stmt(&mut self) -> Result<Node, CompileError> {
        let line = self.cur.line;
        self.discard(TokenKind::Statement)?;
        let cond = self.expr()?;
        let then_branch = self.expr()?;
        let else_branch = if self.starts_scope() {
            Some(Box::new(self.expr()?))
        } else if self.is(TokenKind::CloseBracket) {
            None
        } else {
            return Err(self.err("']' or an else expression"));
        };
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
            line,
        })
    }

    fn while_stmt(&mut self) -> Result<Node, CompileError> {
        let line = self.cur.line;
        self.discard(TokenKind::Statement)?;
        let cond = self.expr()?;
        let body = self.exprlist()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::While {
            cond: Box::new(cond),
            body,
            line,
        })
    }

    fn print_stmt(&mut self) -> Result<Node, CompileError> {
        let line = self.cur.line;
        self.discard(TokenKind::Statement)?;
        let value = self.oper()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Print {
            value: Box::new(value),
            line,
        })
    }

    /// One or more expressions up to the closing bracket
    fn exprlist(&mut self) -> Result<Vec<Node>, CompileError> {
        let mut list = vec![self.expr()?];
        loop {
            if self.starts_scope() {
                list.push(self.expr()?);
            } else if self.is(TokenKind::CloseBracket) {
                return Ok(list);
            } else {
                return Err(self.err("']', '[', a constant or an identifier"));
            }
        }
    }

    /// The let form. After `let [ [ id`, one token decides the shape:
    /// a type name opens a variable declaration list, an identifier opens
    /// a function declaration.
    fn let_stmt(&mut self) -> Result<Node, CompileError> {
        let line = self.cur.line;
        self.discard(TokenKind::Statement)?;
        self.discard(TokenKind::OpenBracket)?;
        self.discard(TokenKind::OpenBracket)?;
        let first = self.take(TokenKind::Ident)?;

        if self.is(TokenKind::TypeName) {
            return self.var_let(first, line);
        }
        if self.is(TokenKind::Ident) || self.is(TokenKind::CloseBracket) {
            return self.function_decl(first, line);
        }
        Err(self.err("a type name or identifier in let"))
    }

    fn var_let(&mut self, first: Token, line: usize) -> Result<Node, CompileError> {
        let first_ty = self.take(TokenKind::TypeName)?;
        let mut decls = vec![VarDecl {
            name: first.text,
            ty: type_from_attr(first_ty.attr),
            line: first.line,
        }];
        self.discard(TokenKind::CloseBracket)?;

        // remaining [id type] pairs
        loop {
            if self.is(TokenKind::OpenBracket) {
                self.discard(TokenKind::OpenBracket)?;
                let id = self.take(TokenKind::Ident)?;
                let ty = self.take(TokenKind::TypeName)?;
                self.discard(TokenKind::CloseBracket)?;
                decls.push(VarDecl {
                    name: id.text,
                    ty: type_from_attr(ty.attr),
                    line: id.line,
                });
            } else if self.is(TokenKind::CloseBracket) {
                break;
            } else {
                return Err(self.err("'[' or ']' in declaration list"));
            }
        }
        self.discard(TokenKind::CloseBracket)?;

        // trailing body expressions share the declarations' scope
        let mut body = Vec::new();
        while !self.is(TokenKind::CloseBracket) {
            body.push(self.expr()?);
        }
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Let { decls, body, line })
    }

    fn function_decl(&mut self, name: Token, line: usize) -> Result<Node, CompileError> {
        let mut params = Vec::new();
        loop {
            if self.is(TokenKind::Ident) {
                params.push(self.take(TokenKind::Ident)?.text);
            } else if self.is(TokenKind::CloseBracket) {
                break;
            } else {
                return Err(self.err("an identifier or ']' in parameter list"));
            }
        }
        self.discard(TokenKind::CloseBracket)?;

        self.discard(TokenKind::OpenBracket)?;
        let first_ty = self.take(TokenKind::TypeName)?;
        let mut types = vec![type_from_attr(first_ty.attr)];
        loop {
            if self.is(TokenKind::TypeName) {
                types.push(type_from_attr(self.take(TokenKind::TypeName)?.attr));
            } else if self.is(TokenKind::CloseBracket) {
                break;
            } else {
                return Err(self.err("a type name or ']' in type list"));
            }
        }
        self.discard(TokenKind::CloseBracket)?;
        self.discard(TokenKind::CloseBracket)?;

        if types.len() != params.len() + 1 {
            return Err(CompileError::parse(
                format!(
                    "function '{}' lists {} parameter(s) but {} type(s); one type per parameter plus the return type is required",
                    name.text,
                    params.len(),
                    types.len()
                ),
                name.line,
            ));
        }
        let return_type = match types.pop() {
            Some(ty) => ty,
            None => unreachable!("type list is never empty"),
        };

        let body = self.scopelist()?;
        self.discard(TokenKind::CloseBracket)?;
        Ok(Node::Function {
            name: name.text,
            params,
            param_types: types,
            return_type,
            body,
            line,
        })
    }
}

fn binop_from_attr(attr: TokenAttr) -> BinOp {
    match attr {
        TokenAttr::Plus => BinOp::Add,
        TokenAttr::Mult => BinOp::Mul,
        TokenAttr::Div => BinOp::Div,
        TokenAttr::Mod => BinOp::Mod,
        TokenAttr::Exp => BinOp::Pow,
        TokenAttr::Lt => BinOp::Lt,
        TokenAttr::Le => BinOp::Le,
        TokenAttr::Gt => BinOp::Gt,
        TokenAttr::Ge => BinOp::Ge,
        TokenAttr::Eq => BinOp::Eq,
        TokenAttr::Ne => BinOp::Ne,
        TokenAttr::And => BinOp::And,
        TokenAttr::Or => BinOp::Or,
        _ => unreachable!("binary operator token without operator attribute"),
    }
}

fn unop_from_attr(attr: TokenAttr) -> UnOp {
    match attr {
        TokenAttr::Sin => UnOp::Sin,
        TokenAttr::Cos => UnOp::Cos,
        TokenAttr::Tan => UnOp::Tan,
        TokenAttr::Not => UnOp::Not,
        _ => unreachable!("unary operator token without operator attribute"),
    }
}

fn type_from_attr(attr: TokenAttr) -> Type {
    match attr {
        TokenAttr::KBool => Type::Bool,
        TokenAttr::KInt => Type::Int,
        TokenAttr::KReal => Type::Real,
        TokenAttr::KStr => Type::Str,
        _ => unreachable!("type name token without type attribute"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Node {
        Parser::new(source).parse().expect("unexpected parse error")
    }

    fn parse_err(source: &str) -> CompileError {
        Parser::new(source)
            .parse()
            .expect_err("expected a parse error")
    }

    fn single_scope(program: Node) -> Node {
        match program {
            Node::Program { mut scopes, .. } => {
                assert_eq!(scopes.len(), 1);
                scopes.remove(0)
            }
            other => panic!("expected a program, got {:?}", other),
        }
    }

    #[test]
    fn test_minimal_program() {
        let scope = single_scope(parse("[1]"));
        assert!(matches!(scope, Node::Constant(_)));
    }

    #[test]
    fn test_empty_scope() {
        let scope = single_scope(parse("[[]]"));
        match scope {
            Node::Scope { scopes, .. } => assert!(scopes.is_empty()),
            other => panic!("expected a scope, got {:?}", other),
        }
    }

    #[test]
    fn test_binop_application() {
        let scope = single_scope(parse("[[+ 1 2]]"));
        match scope {
            Node::Binop { op, left, right, .. } => {
                assert_eq!(op, BinOp::Add);
                assert!(matches!(*left, Node::Constant(_)));
                assert!(matches!(*right, Node::Constant(_)));
            }
            other => panic!("expected a binop, got {:?}", other),
        }
    }

    #[test]
    fn test_minus_resolves_unary() {
        let scope = single_scope(parse("[[- 5]]"));
        assert!(matches!(scope, Node::Unop { op: UnOp::Neg, .. }));
    }

    #[test]
    fn test_minus_resolves_binary() {
        let scope = single_scope(parse("[[- 5 3]]"));
        assert!(matches!(scope, Node::Binop { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_if_with_both_branches() {
        let scope = single_scope(parse("[[if true [print 1] [print 2]]]"));
        match scope {
            Node::If { cond, then_branch, else_branch, .. } => {
                assert!(matches!(*cond, Node::Constant(_)));
                assert!(matches!(*then_branch, Node::Print { .. }));
                assert!(matches!(else_branch.as_deref(), Some(Node::Print { .. })));
            }
            other => panic!("expected an if, got {:?}", other),
        }
    }

    #[test]
    fn test_if_without_else() {
        let scope = single_scope(parse("[[if a b]]"));
        match scope {
            Node::If { else_branch, .. } => assert!(else_branch.is_none()),
            other => panic!("expected an if, got {:?}", other),
        }
    }

    #[test]
    fn test_while_with_body_list() {
        let scope = single_scope(parse("[[while [< x 10] [:= x [+ x 1]] [print x]]]"));
        match scope {
            Node::While { cond, body, .. } => {
                assert!(matches!(*cond, Node::Binop { op: BinOp::Lt, .. }));
                assert_eq!(body.len(), 2);
            }
            other => panic!("expected a while, got {:?}", other),
        }
    }

    #[test]
    fn test_let_declaration_list() {
        let scope = single_scope(parse("[[let [[x int] [y real]]]]"));
        match scope {
            Node::Let { decls, body, .. } => {
                assert_eq!(decls.len(), 2);
                assert_eq!(decls[0].name, "x");
                assert_eq!(decls[0].ty, Type::Int);
                assert_eq!(decls[1].name, "y");
                assert_eq!(decls[1].ty, Type::Real);
                assert!(body.is_empty());
            }
            other => panic!("expected a let, got {:?}", other),
        }
    }

    #[test]
    fn test_let_with_trailing_body() {
        let scope = single_scope(parse("[[let [[x int]] [print x]]]"));
        match scope {
            Node::Let { decls, body, .. } => {
                assert_eq!(decls.len(), 1);
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Node::Print { .. }));
            }
            other => panic!("expected a let, got {:?}", other),
        }
    }

    #[test]
    fn test_let_function_declaration() {
        let scope = single_scope(parse("[[let [[double n] [int int]] [* n 2]]]"));
        match scope {
            Node::Function { name, params, param_types, return_type, body, .. } => {
                assert_eq!(name, "double");
                assert_eq!(params, vec!["n".to_string()]);
                assert_eq!(param_types, vec![Type::Int]);
                assert_eq!(return_type, Type::Int);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn test_function_type_count_mismatch() {
        let err = parse_err("[[let [[f a b] [int int]] [print 1]]]");
        assert!(err.message.contains("'f'"));
        assert!(err.message.contains("2 parameter(s)"));
    }

    #[test]
    fn test_call_with_arguments() {
        let scope = single_scope(parse("[[foo 1 2.5 x]]"));
        match scope {
            Node::Call { name, args, .. } => {
                assert_eq!(name, "foo");
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment() {
        let scope = single_scope(parse("[[:= x 5]]"));
        match scope {
            Node::Assign { name, value, .. } => {
                assert_eq!(name, "x");
                assert!(matches!(*value, Node::Constant(_)));
            }
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_container_scopes() {
        let scope = single_scope(parse("[[[print 1] [print 2]]]"));
        match scope {
            Node::Scope { scopes, .. } => assert_eq!(scopes.len(), 2),
            other => panic!("expected a scope, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_operand_names_expectation() {
        let err = parse_err("[[+ 1]]");
        assert!(err.message.contains("expected"));
        assert!(err.message.contains("']'"));
    }

    #[test]
    fn test_unclosed_program() {
        let err = parse_err("[[print 1]");
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn test_trailing_tokens_after_program() {
        let err = parse_err("[1] 2");
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_error_carries_line() {
        let err = parse_err("[\n[+ 1]\n]");
        assert_eq!(err.line, 2);
    }
}
