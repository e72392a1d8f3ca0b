// File: src/generator.rs
//
// Code generator for the IBTL compiler.
// One recursive postorder walk over the AST both infers each
// subexpression's type bottom-up and emits Forth-style words for the
// stack-machine target: every operand's code lands before the operator
// that consumes it, matching the target's operand stack discipline.
//
// Target conventions:
// - lexical scopes render as matched scope{ / }scope brackets
// - if renders as a scope wrapping `cond if .. else .. then`, while as a
//   scope wrapping `begin cond while .. repeat`
// - declared locals are zero-initialized per type (0 / 0e0 / false / s" ")
// - every generated name is the source name suffixed with its declaration
//   scope depth
// - mixed int/real operands get exactly one s>d d>f cast, plus fswap when
//   the left operand is the int
// - ^ has no native target word and is lowered to a repeated
//   multiplication loop
//
// Any type mismatch, undeclared identifier, same-scope redeclaration,
// wrong call arity or argument type, or illegal nesting aborts the whole
// unit with a semantic error; no partial output survives.

use crate::ast::{BinOp, Node, Type, UnOp, VarDecl};
use crate::errors::CompileError;
use crate::lexer::{Token, TokenAttr};
use crate::parser::Parser;
use crate::symbol_table::{SymbolKind, SymbolTable};

/// Runtime switches for the generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Whether function declarations are accepted
    pub enable_functions: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { enable_functions: true }
    }
}

/// Space-separated word buffer the walk emits into
struct CodeBuffer {
    text: String,
}

impl CodeBuffer {
    fn new() -> Self {
        Self { text: String::new() }
    }

    fn word(&mut self, w: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(w);
    }

    fn finish(self) -> String {
        self.text
    }
}

/// Convenience entry point: parse and generate one compilation unit
pub fn compile(source: &str, config: GeneratorConfig) -> Result<String, CompileError> {
    let program = Parser::new(source).parse()?;
    Generator::new(config).generate(&program)
}

/// The fused type checker and emitter
pub struct Generator {
    symbols: SymbolTable,
    config: GeneratorConfig,
    code: CodeBuffer,
    in_function: bool,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            symbols: SymbolTable::new(),
            config,
            code: CodeBuffer::new(),
            in_function: false,
        }
    }

    /// Walk the program and return the generated code text
    pub fn generate(mut self, program: &Node) -> Result<String, CompileError> {
        self.gen_node(program)?;
        Ok(self.code.finish())
    }

    /// Run f inside a fresh lexical scope. The scope is exited on every
    /// path out, including generation errors, so sibling and outer
    /// lookups stay correct.
    fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.symbols.enter_scope();
        let result = f(self);
        self.symbols.exit_scope();
        result
    }

    fn gen_node(&mut self, node: &Node) -> Result<Type, CompileError> {
        match node {
            Node::Program { scopes, .. } | Node::Scope { scopes, .. } => {
                self.with_scope(|gen| {
                    gen.code.word("scope{");
                    for scope in scopes {
                        gen.gen_node(scope)?;
                    }
                    gen.code.word("}scope");
                    Ok(Type::None)
                })
            }
            Node::Constant(tok) => self.gen_constant(tok),
            Node::Ident(tok) => self.gen_ident(tok),
            Node::Binop { op, left, right, line } => {
                let lt = self.gen_node(left)?;
                let rt = self.gen_node(right)?;
                self.gen_binop(*op, lt, rt, *line)
            }
            Node::Unop { op, operand, line } => {
                let ot = self.gen_node(operand)?;
                self.gen_unop(*op, ot, *line)
            }
            Node::Assign { name, value, line } => self.gen_assign(name, value, *line),
            Node::Call { name, args, line } => self.gen_call(name, args, *line),
            Node::Print { value, line } => self.gen_print(value, *line),
            Node::Let { decls, body, .. } => self.gen_let(decls, body),
            Node::If { cond, then_branch, else_branch, .. } => {
                self.with_scope(|gen| {
                    gen.code.word("scope{");
                    let ct = gen.gen_node(cond)?;
                    if ct != Type::Bool {
                        return Err(CompileError::semantic(
                            format!("if condition must be bool, found {}", ct),
                            cond.line(),
                        ));
                    }
                    gen.code.word("if");
                    gen.gen_node(then_branch)?;
                    if let Some(els) = else_branch {
                        gen.code.word("else");
                        gen.gen_node(els)?;
                    }
                    gen.code.word("then");
                    gen.code.word("}scope");
                    Ok(Type::None)
                })
            }
            Node::While { cond, body, .. } => {
                self.with_scope(|gen| {
                    gen.code.word("scope{");
                    gen.code.word("begin");
                    let ct = gen.gen_node(cond)?;
                    if ct != Type::Bool {
                        return Err(CompileError::semantic(
                            format!("while condition must be bool, found {}", ct),
                            cond.line(),
                        ));
                    }
                    gen.code.word("while");
                    for node in body {
                        gen.gen_node(node)?;
                    }
                    gen.code.word("repeat");
                    gen.code.word("}scope");
                    Ok(Type::None)
                })
            }
            Node::Function { name, params, param_types, return_type, body, line } => {
                self.gen_function(name, params, param_types, *return_type, body, *line)
            }
        }
    }

    // --- leaves ---

    fn gen_constant(&mut self, tok: &Token) -> Result<Type, CompileError> {
        match tok.attr {
            TokenAttr::IntDec | TokenAttr::IntOct | TokenAttr::IntHex => {
                let parsed = match tok.attr {
                    TokenAttr::IntDec => tok.text.parse::<i64>(),
                    TokenAttr::IntOct => i64::from_str_radix(&tok.text, 8),
                    _ => i64::from_str_radix(&tok.text[2..], 16),
                };
                let value = parsed.map_err(|_| {
                    CompileError::semantic(
                        format!("integer literal '{}' out of range", tok.text),
                        tok.line,
                    )
                })?;
                self.code.word(&value.to_string());
                Ok(Type::Int)
            }
            TokenAttr::Real => {
                // the target requires an exponent on every real literal
                if tok.text.contains(['e', 'E']) {
                    self.code.word(&tok.text);
                } else {
                    self.code.word(&format!("{}e0", tok.text));
                }
                Ok(Type::Real)
            }
            TokenAttr::Str => {
                self.code.word(&format!("s\" {}\"", tok.text));
                Ok(Type::Str)
            }
            TokenAttr::True => {
                self.code.word("true");
                Ok(Type::Bool)
            }
            TokenAttr::False => {
                self.code.word("false");
                Ok(Type::Bool)
            }
            _ => unreachable!("constant token without literal attribute"),
        }
    }

    fn gen_ident(&mut self, tok: &Token) -> Result<Type, CompileError> {
        let (ty, gen_name) = match self.symbols.find(&tok.text) {
            None => {
                return Err(CompileError::semantic(
                    format!("undeclared identifier '{}'", tok.text),
                    tok.line,
                ))
            }
            Some(data) if data.kind != SymbolKind::Variable => {
                return Err(CompileError::semantic(
                    format!("'{}' is not a variable", tok.text),
                    tok.line,
                ))
            }
            Some(data) => (data.ty, data.gen_name.clone()),
        };
        self.code.word(&gen_name);
        Ok(ty)
    }

    // --- operators ---

    fn gen_binop(&mut self, op: BinOp, lt: Type, rt: Type, line: usize) -> Result<Type, CompileError> {
        if op == BinOp::Pow {
            return self.gen_pow(lt, rt, line);
        }
        if op.is_boolean() {
            if lt != Type::Bool || rt != Type::Bool {
                return Err(CompileError::semantic(
                    format!("'{}' expected bool operands, found {} and {}", op, lt, rt),
                    line,
                ));
            }
            self.code.word(int_word(op));
            return Ok(Type::Bool);
        }
        if op == BinOp::Add && lt == Type::Str && rt == Type::Str {
            // declared but deliberately unimplemented
            return Err(CompileError::semantic(
                "string concatenation is not implemented",
                line,
            ));
        }
        if !lt.is_numeric() || !rt.is_numeric() {
            return Err(CompileError::semantic(
                format!("'{}' expected numeric operands, found {} and {}", op, lt, rt),
                line,
            ));
        }
        if lt == Type::Real || rt == Type::Real {
            self.promote_operands(lt, rt);
            self.code.word(real_word(op));
            if op.is_comparison() {
                Ok(Type::Bool)
            } else {
                Ok(Type::Real)
            }
        } else {
            self.code.word(int_word(op));
            if op.is_comparison() {
                Ok(Type::Bool)
            } else {
                Ok(Type::Int)
            }
        }
    }

    /// The target has no power word; the exponent must be an int and the
    /// operation becomes a counted multiplication loop. An exponent of
    /// zero or less multiplies nothing and leaves 1.
    fn gen_pow(&mut self, lt: Type, rt: Type, line: usize) -> Result<Type, CompileError> {
        if rt != Type::Int {
            return Err(CompileError::semantic(
                format!("'^' requires an int exponent, found {}", rt),
                line,
            ));
        }
        match lt {
            Type::Int => {
                self.code.word("1 swap 0 ?do over * loop nip");
                Ok(Type::Int)
            }
            Type::Real => {
                self.code.word("1e0 0 ?do fover f* loop fswap fdrop");
                Ok(Type::Real)
            }
            _ => Err(CompileError::semantic(
                format!("'^' expected a numeric base, found {}", lt),
                line,
            )),
        }
    }

    fn gen_unop(&mut self, op: UnOp, ot: Type, line: usize) -> Result<Type, CompileError> {
        match op {
            UnOp::Not => {
                if ot != Type::Bool {
                    return Err(CompileError::semantic(
                        format!("'not' expected bool, found {}", ot),
                        line,
                    ));
                }
                self.code.word("invert");
                Ok(Type::Bool)
            }
            UnOp::Neg => match ot {
                Type::Int => {
                    self.code.word("negate");
                    Ok(Type::Int)
                }
                Type::Real => {
                    self.code.word("fnegate");
                    Ok(Type::Real)
                }
                _ => Err(CompileError::semantic(
                    format!("'-' expected a number, found {}", ot),
                    line,
                )),
            },
            UnOp::Sin | UnOp::Cos | UnOp::Tan => {
                if !ot.is_numeric() {
                    return Err(CompileError::semantic(
                        format!("'{}' expected a number, found {}", op, ot),
                        line,
                    ));
                }
                if ot == Type::Int {
                    self.code.word("s>d d>f");
                }
                self.code.word(match op {
                    UnOp::Sin => "fsin",
                    UnOp::Cos => "fcos",
                    _ => "ftan",
                });
                Ok(Type::Real)
            }
        }
    }

    /// Exactly one cast when the operand types differ as {int, real}; the
    /// extra fswap reorders when the left operand was the int, since it
    /// was pushed first
    fn promote_operands(&mut self, lt: Type, rt: Type) {
        if lt == Type::Int && rt == Type::Real {
            self.code.word("s>d d>f fswap");
        } else if lt == Type::Real && rt == Type::Int {
            self.code.word("s>d d>f");
        }
    }

    // --- statements ---

    fn gen_assign(&mut self, name: &str, value: &Node, line: usize) -> Result<Type, CompileError> {
        let (target_ty, gen_name) = match self.symbols.find(name) {
            None => {
                return Err(CompileError::semantic(
                    format!("undeclared identifier '{}'", name),
                    line,
                ))
            }
            Some(data) if data.kind != SymbolKind::Variable => {
                return Err(CompileError::semantic(
                    format!("'{}' is not an assignable variable", name),
                    line,
                ))
            }
            Some(data) => (data.ty, data.gen_name.clone()),
        };

        let vt = self.gen_node(value)?;
        if target_ty == Type::Real && vt == Type::Int {
            self.code.word("s>d d>f");
        } else if vt != target_ty {
            return Err(CompileError::semantic(
                format!("cannot assign {} to '{}' of type {}", vt, name, target_ty),
                line,
            ));
        }

        // store, then re-push: assignment is itself an expression
        self.code.word(&format!("to {}", gen_name));
        self.code.word(&gen_name);
        Ok(target_ty)
    }

    fn gen_call(&mut self, name: &str, args: &[Node], line: usize) -> Result<Type, CompileError> {
        let (sig, gen_name) = match self.symbols.find(name) {
            None => {
                return Err(CompileError::semantic(
                    format!("undeclared identifier '{}'", name),
                    line,
                ))
            }
            Some(data) if data.kind != SymbolKind::Function => {
                return Err(CompileError::semantic(
                    format!("'{}' is not a function", name),
                    line,
                ))
            }
            Some(data) => {
                let sig = match &data.signature {
                    Some(sig) => sig.clone(),
                    None => unreachable!("function symbol without a signature"),
                };
                (sig, data.gen_name.clone())
            }
        };

        if args.len() != sig.params.len() {
            return Err(CompileError::semantic(
                format!(
                    "function '{}' expects {} argument(s), {} given",
                    name,
                    sig.params.len(),
                    args.len()
                ),
                line,
            ));
        }

        // arguments go out in reverse order per the calling convention, so
        // the first argument ends up on top of the stack at entry
        for (idx, arg) in args.iter().enumerate().rev() {
            let at = self.gen_node(arg)?;
            if at != sig.params[idx] {
                return Err(CompileError::semantic(
                    format!(
                        "argument {} of '{}': expected {}, found {}",
                        idx + 1,
                        name,
                        sig.params[idx],
                        at
                    ),
                    arg.line(),
                ));
            }
        }

        self.code.word(&gen_name);
        Ok(sig.ret)
    }

    fn gen_print(&mut self, value: &Node, line: usize) -> Result<Type, CompileError> {
        let vt = self.gen_node(value)?;
        match vt {
            Type::Int | Type::Bool => self.code.word("."),
            Type::Real => self.code.word("f."),
            Type::Str => self.code.word("type"),
            Type::None => {
                return Err(CompileError::semantic(
                    "print expected a value, found none",
                    line,
                ))
            }
        }
        Ok(Type::None)
    }

    fn gen_let(&mut self, decls: &[VarDecl], body: &[Node]) -> Result<Type, CompileError> {
        for decl in decls {
            if !self.symbols.declare(&decl.name, decl.ty) {
                return Err(CompileError::semantic(
                    format!("redeclaration of '{}' in the same scope", decl.name),
                    decl.line,
                ));
            }
            self.emit_zero_init(&decl.name, decl.ty);
        }
        for node in body {
            self.gen_node(node)?;
        }
        Ok(Type::None)
    }

    /// Zero-initialized declaration of the freshly declared name
    fn emit_zero_init(&mut self, name: &str, ty: Type) {
        let gen_name = match self.symbols.find(name) {
            Some(data) => data.gen_name.clone(),
            None => unreachable!("declared name must resolve"),
        };
        let decl = match ty {
            Type::Int => format!("0 value {}", gen_name),
            Type::Real => format!("0e0 fvalue {}", gen_name),
            Type::Bool => format!("false value {}", gen_name),
            Type::Str => format!("s\" \" 2value {}", gen_name),
            Type::None => unreachable!("declarations always carry a concrete type"),
        };
        self.code.word(&decl);
    }

    fn gen_function(
        &mut self,
        name: &str,
        params: &[String],
        param_types: &[Type],
        return_type: Type,
        body: &[Node],
        line: usize,
    ) -> Result<Type, CompileError> {
        if !self.config.enable_functions {
            return Err(CompileError::semantic(
                format!("function declaration '{}' but function support is disabled", name),
                line,
            ));
        }
        if self.in_function {
            return Err(CompileError::semantic(
                format!("nested function definition '{}' is not allowed", name),
                line,
            ));
        }
        if !self.symbols.declare_function(name, param_types.to_vec(), return_type) {
            return Err(CompileError::semantic(
                format!("redeclaration of '{}' in the same scope", name),
                line,
            ));
        }
        let gen_name = match self.symbols.find(name) {
            Some(data) => data.gen_name.clone(),
            None => unreachable!("declared name must resolve"),
        };

        self.with_scope(|gen| {
            gen.code.word(&format!(": {}", gen_name));

            // bind parameters from the stack; the first parameter is on
            // top at entry
            for (param, ty) in params.iter().zip(param_types) {
                if !gen.symbols.declare(param, *ty) {
                    return Err(CompileError::semantic(
                        format!("duplicate parameter '{}' of function '{}'", param, name),
                        line,
                    ));
                }
                gen.emit_zero_init(param, *ty);
                let param_name = match gen.symbols.find(param) {
                    Some(data) => data.gen_name.clone(),
                    None => unreachable!("declared name must resolve"),
                };
                gen.code.word(&format!("to {}", param_name));
            }

            // the return value lives in a local named after the function;
            // it shadows the function symbol inside the body
            if !gen.symbols.declare(name, return_type) {
                return Err(CompileError::semantic(
                    format!("parameter '{}' collides with the return variable", name),
                    line,
                ));
            }
            gen.emit_zero_init(name, return_type);
            let ret_name = match gen.symbols.find(name) {
                Some(data) => data.gen_name.clone(),
                None => unreachable!("declared name must resolve"),
            };

            gen.in_function = true;
            let mut body_result: Result<(), CompileError> = Ok(());
            for node in body {
                if let Err(err) = gen.gen_node(node) {
                    body_result = Err(err);
                    break;
                }
            }
            gen.in_function = false;
            body_result?;

            // push the return value just before the closing word
            gen.code.word(&ret_name);
            gen.code.word(";");
            Ok(())
        })?;
        Ok(Type::None)
    }
}

fn int_word(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "mod",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Eq => "=",
        BinOp::Ne => "<>",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Pow => unreachable!("'^' is lowered separately"),
    }
}

fn real_word(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "f+",
        BinOp::Sub => "f-",
        BinOp::Mul => "f*",
        BinOp::Div => "f/",
        BinOp::Mod => "fmod",
        BinOp::Lt => "f<",
        BinOp::Le => "f<=",
        BinOp::Gt => "f>",
        BinOp::Ge => "f>=",
        BinOp::Eq => "f=",
        BinOp::Ne => "f<>",
        BinOp::And | BinOp::Or | BinOp::Pow => {
            unreachable!("no real rendering for this operator")
        }
    }
}
