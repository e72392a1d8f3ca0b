// File: src/lexer.rs
//
// Lexical analyzer (tokenizer) for the IBTL language.
// Converts source text into a stream of tokens for parsing.
//
// Supports:
// - Keywords: if, while, let, stdout/print, bool, int, real, str,
//   true, false, and, or, not, sin, cos, tan
// - Identifiers
// - Numeric literals: decimal, octal (leading 0) and hex (0x) integers,
//   reals with fraction and optional signed exponent, scanned by an
//   explicit state machine
// - String literals delimited by double quotes (single line)
// - Operators: + - * / % ^ < <= > >= = <> := [ ]
//
// Minus is lexed as its own ambiguous category; the parser decides whether
// it is unary or binary.

use crate::errors::CompileError;
use crate::reader::CharReader;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::fmt;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Constant,
    Ident,
    BinOp,
    UnOp,
    /// Minus sits in a corner by itself because it has ambiguous meaning
    /// during parsing
    Minus,
    Assign,
    OpenBracket,
    CloseBracket,
    TypeName,
    Statement,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Constant => write!(f, "constant"),
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::BinOp => write!(f, "binary operator"),
            TokenKind::UnOp => write!(f, "unary operator"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Assign => write!(f, "':='"),
            TokenKind::OpenBracket => write!(f, "'['"),
            TokenKind::CloseBracket => write!(f, "']'"),
            TokenKind::TypeName => write!(f, "type name"),
            TokenKind::Statement => write!(f, "statement keyword"),
        }
    }
}

/// Token sub-kind attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAttr {
    None,

    // Constant attributes
    Str,
    IntDec,
    IntOct,
    IntHex,
    Real,
    True,
    False,

    // Binary operator attributes
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Plus,
    Mult,
    Div,
    Exp,
    Mod,
    And,
    Or,

    // Unary operator attributes
    Sin,
    Cos,
    Tan,
    Not,

    // Type name attributes
    KBool,
    KStr,
    KInt,
    KReal,

    // Statement keyword attributes
    KIf,
    KWhile,
    KLet,
    KPrint,
}

impl fmt::Display for TokenAttr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TokenAttr::None => "",
            TokenAttr::Str => "str",
            TokenAttr::IntDec => "int-dec",
            TokenAttr::IntOct => "int-oct",
            TokenAttr::IntHex => "int-hex",
            TokenAttr::Real => "real",
            TokenAttr::True => "true",
            TokenAttr::False => "false",
            TokenAttr::Lt => "<",
            TokenAttr::Le => "<=",
            TokenAttr::Gt => ">",
            TokenAttr::Ge => ">=",
            TokenAttr::Eq => "=",
            TokenAttr::Ne => "<>",
            TokenAttr::Plus => "+",
            TokenAttr::Mult => "*",
            TokenAttr::Div => "/",
            TokenAttr::Exp => "^",
            TokenAttr::Mod => "%",
            TokenAttr::And => "and",
            TokenAttr::Or => "or",
            TokenAttr::Sin => "sin",
            TokenAttr::Cos => "cos",
            TokenAttr::Tan => "tan",
            TokenAttr::Not => "not",
            TokenAttr::KBool => "bool",
            TokenAttr::KStr => "str",
            TokenAttr::KInt => "int",
            TokenAttr::KReal => "real",
            TokenAttr::KIf => "if",
            TokenAttr::KWhile => "while",
            TokenAttr::KLet => "let",
            TokenAttr::KPrint => "print",
        };
        write!(f, "{}", s)
    }
}

/// A lexical token: category, sub-kind attribute and literal text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub attr: TokenAttr,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, attr: TokenAttr, text: impl Into<String>, line: usize) -> Self {
        Self { kind, attr, text: text.into(), line }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Constant | TokenKind::Ident => {
                if self.attr == TokenAttr::None {
                    write!(f, "{} \"{}\"", self.kind, self.text)
                } else {
                    write!(f, "{}({}) \"{}\"", self.kind, self.attr, self.text)
                }
            }
            _ if self.attr != TokenAttr::None => write!(f, "{}({})", self.kind, self.attr),
            _ => write!(f, "{}", self.kind),
        }
    }
}

/// Reserved words and the token category/attribute each maps to. The
/// symbol table seeds its global scope from the same table.
pub(crate) static KEYWORDS: Lazy<AHashMap<&'static str, (TokenKind, TokenAttr)>> = Lazy::new(|| {
    let mut table = AHashMap::new();
    table.insert("if", (TokenKind::Statement, TokenAttr::KIf));
    table.insert("while", (TokenKind::Statement, TokenAttr::KWhile));
    table.insert("let", (TokenKind::Statement, TokenAttr::KLet));
    table.insert("stdout", (TokenKind::Statement, TokenAttr::KPrint));
    table.insert("print", (TokenKind::Statement, TokenAttr::KPrint));

    table.insert("bool", (TokenKind::TypeName, TokenAttr::KBool));
    table.insert("int", (TokenKind::TypeName, TokenAttr::KInt));
    table.insert("real", (TokenKind::TypeName, TokenAttr::KReal));
    table.insert("str", (TokenKind::TypeName, TokenAttr::KStr));

    table.insert("true", (TokenKind::Constant, TokenAttr::True));
    table.insert("false", (TokenKind::Constant, TokenAttr::False));

    table.insert("and", (TokenKind::BinOp, TokenAttr::And));
    table.insert("or", (TokenKind::BinOp, TokenAttr::Or));

    table.insert("not", (TokenKind::UnOp, TokenAttr::Not));
    table.insert("sin", (TokenKind::UnOp, TokenAttr::Sin));
    table.insert("cos", (TokenKind::UnOp, TokenAttr::Cos));
    table.insert("tan", (TokenKind::UnOp, TokenAttr::Tan));
    table
});

/// States of the numeric literal scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumState {
    /// Leading zero seen; octal, hex or real still possible
    Zero,
    /// Octal digits after a leading zero
    Oct,
    /// Leading zero followed by 8/9; only legal if a fraction follows
    ZeroTail,
    /// The 'x' of a hex literal; at least one hex digit required
    HexFirst,
    Hex,
    Dec,
    /// The '.'; at least one fraction digit required
    FracFirst,
    Frac,
    /// The 'e'/'E'; a sign or digit required
    ExpFirst,
    ExpSign,
    Exp,
}

/// The lexer: wraps a character reader and produces one token per call
pub struct Lexer {
    reader: CharReader,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self { reader: CharReader::new(source) }
    }

    /// Current source line, for diagnostics raised by the parser
    pub fn line(&self) -> usize {
        self.reader.line()
    }

    /// Scan and return the next token
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace();

        let line = self.reader.line();
        let c = match self.reader.next_char() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, TokenAttr::None, "", line)),
        };

        let token = if c == '"' {
            self.read_string(line)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            self.read_ident(line)
        } else if c.is_ascii_digit() {
            self.read_number(c, line)?
        } else {
            self.read_op(c, line)?
        };

        self.reader.clear_lexeme();
        Ok(token)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.reader.next_char() {
            if !c.is_whitespace() {
                self.reader.put_back();
                break;
            }
        }
        self.reader.clear_lexeme();
    }

    /// Reads the rest of an identifier; keywords become keyword tokens
    fn read_ident(&mut self, line: usize) -> Token {
        while let Some(c) = self.reader.next_char() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                self.reader.put_back();
                break;
            }
        }

        let lexeme = self.reader.lexeme();
        match KEYWORDS.get(lexeme) {
            Some(&(kind, attr)) => Token::new(kind, attr, lexeme, line),
            None => Token::new(TokenKind::Ident, TokenAttr::None, lexeme, line),
        }
    }

    /// Reads to the closing quote; the stored text excludes the quotes
    fn read_string(&mut self, line: usize) -> Result<Token, CompileError> {
        loop {
            match self.reader.next_char() {
                None | Some('\n') => {
                    return Err(CompileError::lexical("unterminated string literal", line));
                }
                Some('"') => break,
                Some(_) => {}
            }
        }

        let lexeme = self.reader.lexeme();
        let inner = &lexeme[1..lexeme.len() - 1];
        Ok(Token::new(TokenKind::Constant, TokenAttr::Str, inner, line))
    }

    /// The numeric state machine. Only an unambiguous integer base or real
    /// form reaches an accepting state; anything else is rejected.
    fn read_number(&mut self, first: char, line: usize) -> Result<Token, CompileError> {
        let mut state = if first == '0' { NumState::Zero } else { NumState::Dec };

        loop {
            let c = self.reader.next_char();
            let next = match (state, c) {
                (NumState::Zero, Some('x' | 'X')) => NumState::HexFirst,
                (NumState::Zero, Some('0'..='7')) => NumState::Oct,
                (NumState::Zero, Some('8' | '9')) => NumState::ZeroTail,
                (NumState::Zero, Some('.')) => NumState::FracFirst,
                (NumState::Zero, other) => return Ok(self.accept_int(TokenAttr::IntDec, other, line)),

                (NumState::Oct, Some('0'..='7')) => NumState::Oct,
                (NumState::Oct, Some('8' | '9')) => NumState::ZeroTail,
                (NumState::Oct, Some('.')) => NumState::FracFirst,
                (NumState::Oct, other) => return Ok(self.accept_int(TokenAttr::IntOct, other, line)),

                (NumState::ZeroTail, Some(d)) if d.is_ascii_digit() => NumState::ZeroTail,
                (NumState::ZeroTail, Some('.')) => NumState::FracFirst,
                (NumState::ZeroTail, _) => return Err(self.reject(line)),

                (NumState::HexFirst, Some(d)) if d.is_ascii_hexdigit() => NumState::Hex,
                (NumState::HexFirst, _) => return Err(self.reject(line)),
                (NumState::Hex, Some(d)) if d.is_ascii_hexdigit() => NumState::Hex,
                (NumState::Hex, other) => return Ok(self.accept_int(TokenAttr::IntHex, other, line)),

                (NumState::Dec, Some(d)) if d.is_ascii_digit() => NumState::Dec,
                (NumState::Dec, Some('.')) => NumState::FracFirst,
                (NumState::Dec, other) => return Ok(self.accept_int(TokenAttr::IntDec, other, line)),

                (NumState::FracFirst, Some(d)) if d.is_ascii_digit() => NumState::Frac,
                (NumState::FracFirst, _) => return Err(self.reject(line)),
                (NumState::Frac, Some(d)) if d.is_ascii_digit() => NumState::Frac,
                (NumState::Frac, Some('e' | 'E')) => NumState::ExpFirst,
                (NumState::Frac, other) => return Ok(self.accept_real(other, line)),

                (NumState::ExpFirst, Some(d)) if d.is_ascii_digit() => NumState::Exp,
                (NumState::ExpFirst, Some('+' | '-')) => NumState::ExpSign,
                (NumState::ExpFirst, _) => return Err(self.reject(line)),
                (NumState::ExpSign, Some(d)) if d.is_ascii_digit() => NumState::Exp,
                (NumState::ExpSign, _) => return Err(self.reject(line)),
                (NumState::Exp, Some(d)) if d.is_ascii_digit() => NumState::Exp,
                (NumState::Exp, other) => return Ok(self.accept_real(other, line)),
            };
            state = next;
        }
    }

    /// Accepting states put back the one character that ended the literal
    fn accept_int(&mut self, attr: TokenAttr, ended_by: Option<char>, line: usize) -> Token {
        if ended_by.is_some() {
            self.reader.put_back();
        }
        Token::new(TokenKind::Constant, attr, self.reader.lexeme(), line)
    }

    fn accept_real(&mut self, ended_by: Option<char>, line: usize) -> Token {
        if ended_by.is_some() {
            self.reader.put_back();
        }
        Token::new(TokenKind::Constant, TokenAttr::Real, self.reader.lexeme(), line)
    }

    fn reject(&self, line: usize) -> CompileError {
        CompileError::lexical(
            format!("malformed numeric literal '{}'", self.reader.lexeme()),
            line,
        )
    }

    fn read_op(&mut self, c: char, line: usize) -> Result<Token, CompileError> {
        let token = match c {
            '+' => Token::new(TokenKind::BinOp, TokenAttr::Plus, "+", line),
            '*' => Token::new(TokenKind::BinOp, TokenAttr::Mult, "*", line),
            '/' => Token::new(TokenKind::BinOp, TokenAttr::Div, "/", line),
            '^' => Token::new(TokenKind::BinOp, TokenAttr::Exp, "^", line),
            '%' => Token::new(TokenKind::BinOp, TokenAttr::Mod, "%", line),
            '-' => Token::new(TokenKind::Minus, TokenAttr::None, "-", line),
            '[' => Token::new(TokenKind::OpenBracket, TokenAttr::None, "[", line),
            ']' => Token::new(TokenKind::CloseBracket, TokenAttr::None, "]", line),
            '=' => Token::new(TokenKind::BinOp, TokenAttr::Eq, "=", line),
            ':' => match self.reader.next_char() {
                Some('=') => Token::new(TokenKind::Assign, TokenAttr::None, ":=", line),
                _ => return Err(CompileError::lexical("unrecognized operator ':'", line)),
            },
            '<' => match self.reader.next_char() {
                Some('=') => Token::new(TokenKind::BinOp, TokenAttr::Le, "<=", line),
                Some('>') => Token::new(TokenKind::BinOp, TokenAttr::Ne, "<>", line),
                other => {
                    if other.is_some() {
                        self.reader.put_back();
                    }
                    Token::new(TokenKind::BinOp, TokenAttr::Lt, "<", line)
                }
            },
            '>' => match self.reader.next_char() {
                Some('=') => Token::new(TokenKind::BinOp, TokenAttr::Ge, ">=", line),
                other => {
                    if other.is_some() {
                        self.reader.put_back();
                    }
                    Token::new(TokenKind::BinOp, TokenAttr::Gt, ">", line)
                }
            },
            _ => {
                return Err(CompileError::lexical(
                    format!("unrecognized character '{}'", c),
                    line,
                ))
            }
        };
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token().expect("unexpected lex error");
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn lex_one(source: &str) -> Token {
        Lexer::new(source).next_token().expect("unexpected lex error")
    }

    fn lex_err(source: &str) -> CompileError {
        let mut lexer = Lexer::new(source);
        loop {
            match lexer.next_token() {
                Ok(tok) if tok.kind == TokenKind::Eof => panic!("expected a lex error"),
                Ok(_) => {}
                Err(err) => return err,
            }
        }
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = lex_all("if while let stdout print foo _bar x9");
        assert_eq!(tokens[0].kind, TokenKind::Statement);
        assert_eq!(tokens[0].attr, TokenAttr::KIf);
        assert_eq!(tokens[1].attr, TokenAttr::KWhile);
        assert_eq!(tokens[2].attr, TokenAttr::KLet);
        assert_eq!(tokens[3].attr, TokenAttr::KPrint);
        assert_eq!(tokens[4].attr, TokenAttr::KPrint);
        assert_eq!(tokens[5].kind, TokenKind::Ident);
        assert_eq!(tokens[5].text, "foo");
        assert_eq!(tokens[6].text, "_bar");
        assert_eq!(tokens[7].text, "x9");
    }

    #[test]
    fn test_type_and_operator_keywords() {
        let tokens = lex_all("bool int real str and or not sin cos tan");
        assert_eq!(tokens[0].kind, TokenKind::TypeName);
        assert_eq!(tokens[3].attr, TokenAttr::KStr);
        assert_eq!(tokens[4].kind, TokenKind::BinOp);
        assert_eq!(tokens[5].attr, TokenAttr::Or);
        assert_eq!(tokens[6].kind, TokenKind::UnOp);
        assert_eq!(tokens[9].attr, TokenAttr::Tan);
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(lex_one("42").attr, TokenAttr::IntDec);
        assert_eq!(lex_one("0").attr, TokenAttr::IntDec);
        assert_eq!(lex_one("017").attr, TokenAttr::IntOct);
        assert_eq!(lex_one("017").text, "017");
        assert_eq!(lex_one("0x1F").attr, TokenAttr::IntHex);
        assert_eq!(lex_one("0Xab").attr, TokenAttr::IntHex);
    }

    #[test]
    fn test_real_forms() {
        for src in ["1.5", "0.5", "07.25", "08.5", "3.14e2", "1.0E-3", "2.5e+10"] {
            let tok = lex_one(src);
            assert_eq!(tok.attr, TokenAttr::Real, "source: {}", src);
            assert_eq!(tok.text, src);
        }
    }

    #[test]
    fn test_malformed_numbers_rejected() {
        for src in ["089", "0x", "0xG", "1.", "1.5e", "1.5e+", "1.x"] {
            let err = lex_err(src);
            assert!(err.message.contains("malformed numeric literal"), "source: {}", src);
        }
    }

    #[test]
    fn test_exponent_requires_fraction() {
        // "1e5" is an int followed by an identifier, not a real
        let tokens = lex_all("1e5");
        assert_eq!(tokens[0].attr, TokenAttr::IntDec);
        assert_eq!(tokens[0].text, "1");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].text, "e5");
    }

    #[test]
    fn test_operators() {
        let tokens = lex_all("+ - * / % ^ < <= <> > >= = :=");
        assert_eq!(tokens[0].attr, TokenAttr::Plus);
        assert_eq!(tokens[1].kind, TokenKind::Minus);
        assert_eq!(tokens[2].attr, TokenAttr::Mult);
        assert_eq!(tokens[3].attr, TokenAttr::Div);
        assert_eq!(tokens[4].attr, TokenAttr::Mod);
        assert_eq!(tokens[5].attr, TokenAttr::Exp);
        assert_eq!(tokens[6].attr, TokenAttr::Lt);
        assert_eq!(tokens[7].attr, TokenAttr::Le);
        assert_eq!(tokens[8].attr, TokenAttr::Ne);
        assert_eq!(tokens[9].attr, TokenAttr::Gt);
        assert_eq!(tokens[10].attr, TokenAttr::Ge);
        assert_eq!(tokens[11].attr, TokenAttr::Eq);
        assert_eq!(tokens[12].kind, TokenKind::Assign);
    }

    #[test]
    fn test_adjacent_tokens_without_whitespace() {
        let tokens = lex_all("[[if a b]]2+3.5");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenBracket,
                TokenKind::OpenBracket,
                TokenKind::Statement,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::CloseBracket,
                TokenKind::CloseBracket,
                TokenKind::Constant,
                TokenKind::BinOp,
                TokenKind::Constant,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[9].attr, TokenAttr::Real);
    }

    #[test]
    fn test_string_literal() {
        let tok = lex_one("\"hello world\"");
        assert_eq!(tok.kind, TokenKind::Constant);
        assert_eq!(tok.attr, TokenAttr::Str);
        assert_eq!(tok.text, "hello world");
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex_err("\"oops");
        assert!(err.message.contains("unterminated string literal"));
        let err = lex_err("\"oops\nmore\"");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unrecognized_characters() {
        assert!(lex_err("!").message.contains("unrecognized character"));
        assert!(lex_err("&").message.contains("unrecognized character"));
        assert!(lex_err(": x").message.contains("unrecognized operator"));
    }

    #[test]
    fn test_line_numbers() {
        let tokens = lex_all("a\nb\n\nc");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
    }
}
