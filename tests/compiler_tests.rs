// Integration tests for the IBTL compiler
//
// These tests drive complete source programs through the whole pipeline
// (lexer, parser, symbol table, generator) and check the generated code or
// the diagnostic. Covered here:
// - Well-typed programs generating stack code end to end
// - Lexical, parse and semantic failures surfacing with line information
// - Scoping, shadowing and depth-suffixed generated names
// - Function declarations, calls and the runtime function toggle

use ibtl::errors::ErrorKind;
use ibtl::generator::{compile, GeneratorConfig};
use ibtl::lexer::{Lexer, TokenKind};
use ibtl::parser::Parser;

fn run(source: &str) -> String {
    compile(source, GeneratorConfig::default()).expect("program should compile")
}

fn run_err(source: &str) -> ibtl::errors::CompileError {
    compile(source, GeneratorConfig::default()).expect_err("program should fail")
}

#[test]
fn test_minimal_program() {
    assert_eq!(run("[1]"), "scope{ 1 }scope");
}

#[test]
fn test_counting_loop_end_to_end() {
    let code = run(
        "[
            [let [[total int] [i int]]
                [while [< i 5]
                    [:= total [+ total i]]
                    [:= i [+ i 1]]]
                [print total]]
        ]",
    );
    assert_eq!(
        code,
        "scope{ 0 value total_1 0 value i_1 \
         scope{ begin i_1 5 < while \
         total_1 i_1 + to total_1 total_1 \
         i_1 1 + to i_1 i_1 \
         repeat }scope total_1 . }scope"
    );
}

#[test]
fn test_branching_on_mixed_arithmetic() {
    let code = run(
        "[
            [let [[x real]]
                [:= x [* 2 1.5]]
                [if [>= x 3.0] [print \"big\"] [print \"small\"]]]
        ]",
    );
    assert!(code.contains("2 1.5e0 s>d d>f fswap f*"));
    assert!(code.contains("if s\" big\" type else s\" small\" type then"));
}

#[test]
fn test_function_round_trip() {
    let code = run(
        "[
            [let [[square n] [int int]]
                [:= square [* n n]]]
            [print [square 6]]
        ]",
    );
    assert!(code.contains(": square_1"));
    assert!(code.contains("to square_2 square_2"));
    assert!(code.ends_with("6 square_1 . }scope"));
}

#[test]
fn test_function_toggle_is_a_runtime_flag() {
    let source = "[[let [[id x] [int int]] [:= id x]]]";
    assert!(compile(source, GeneratorConfig { enable_functions: true }).is_ok());
    let err = compile(source, GeneratorConfig { enable_functions: false })
        .expect_err("functions should be rejected");
    assert_eq!(err.kind, ErrorKind::Semantic);
}

#[test]
fn test_shadowing_uses_depth_suffixed_names() {
    let code = run(
        "[
            [let [[x int]]
                [if true
                    [let [[x str]] [print x]]
                    [print x]]]
        ]",
    );
    assert!(code.contains("s\" \" 2value x_2"));
    assert!(code.contains("x_2 type"));
    assert!(code.contains("else x_1 ."));
}

#[test]
fn test_lexical_error_surfaces_with_line() {
    let err = run_err("[\n[print 089]\n]");
    assert_eq!(err.kind, ErrorKind::Lexical);
    assert_eq!(err.line, 2);
    assert!(err.message.contains("malformed numeric literal"));
}

#[test]
fn test_parse_error_names_expected_category() {
    let err = run_err("[[let [[x]]]]");
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(err.message.contains("expected"));
}

#[test]
fn test_int_variable_rejects_real_assignment() {
    let err = run_err("[[let [[x int]] [:= x [+ x 1.5]]]]");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("real"));
    assert!(err.message.contains("int"));
}

#[test]
fn test_redeclaration_in_same_scope_fails() {
    let err = run_err("[[let [[x int]] [let [[x int]]]]]");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("redeclaration of 'x'"));
}

#[test]
fn test_redeclaration_in_nested_scope_succeeds() {
    let source = "[[let [[x int]] [if true [let [[x int]] [print x]]]]]";
    assert!(compile(source, GeneratorConfig::default()).is_ok());
}

#[test]
fn test_call_diagnostics_name_position_and_types() {
    let err = run_err(
        "[
            [let [[mix a b] [int real int]] [:= mix a]]
            [mix 1 2]
        ]",
    );
    assert!(err.message.contains("argument 2 of 'mix'"));
    assert!(err.message.contains("expected real"));
    assert!(err.message.contains("found int"));
}

#[test]
fn test_parse_tree_dump() {
    let tree = Parser::new("[[if true [print 1] [print 2]]]")
        .parse()
        .expect("program should parse");
    let dump = tree.to_string();
    assert!(dump.starts_with("[program\n"));
    assert!(dump.contains("[if\n"));
    assert_eq!(dump.matches("[print\n").count(), 2);
}

#[test]
fn test_token_stream_of_small_program() {
    let mut lexer = Lexer::new("[[:= x 0x10]]");
    let mut kinds = Vec::new();
    loop {
        let tok = lexer.next_token().expect("program should lex");
        if tok.kind == TokenKind::Eof {
            break;
        }
        kinds.push(tok.kind);
    }
    assert_eq!(
        kinds,
        vec![
            TokenKind::OpenBracket,
            TokenKind::OpenBracket,
            TokenKind::Assign,
            TokenKind::Ident,
            TokenKind::Constant,
            TokenKind::CloseBracket,
            TokenKind::CloseBracket,
        ]
    );
}

#[test]
fn test_print_of_every_type() {
    let code = run(
        "[
            [let [[i int] [r real] [b bool] [s str]]
                [print i] [print r] [print b] [print s]]
        ]",
    );
    assert!(code.contains("i_1 ."));
    assert!(code.contains("r_1 f."));
    assert!(code.contains("b_1 ."));
    assert!(code.contains("s_1 type"));
}

#[test]
fn test_string_concatenation_is_rejected() {
    let err = run_err("[[print [+ \"a\" \"b\"]]]");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("string concatenation"));
}
