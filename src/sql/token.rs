//! SQL token definitions
//!
//! This module defines the token kinds produced by the lexer. Tokens
//! carry their original source text; keyword matching is
//! case-insensitive but the text preserves the user's casing.

use std::fmt;

/// SQL token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // ========== Keywords ==========
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Index,
    Drop,
    Int,
    Float,
    Varchar,
    Bool,
    Date,
    Timestamp,
    Join,
    On,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    If,
    Exists,
    Primary,
    Key,
    As,
    Limit,
    Offset,
    And,
    Or,
    Not,
    Is,
    True,
    False,
    Null,

    // ========== Operators ==========
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Plus,
    Minus,
    Star,

    // ========== Punctuation ==========
    Comma,
    Dot,
    Lparen,
    Rparen,
    Semicolon,

    // ========== Literals ==========
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    DateLiteral,
    TimestampLiteral,
    BoolLiteral,
    NullLiteral,

    // ========== Other ==========
    Identifier,
    /// Unrecognized input; lexing continues past it
    Unknown,
    /// End of input
    EofFile,
}

impl TokenKind {
    /// Keyword lookup over the uppercased identifier text.
    pub fn from_keyword(upper: &str) -> Option<TokenKind> {
        match upper {
            "SELECT" => Some(TokenKind::Select),
            "FROM" => Some(TokenKind::From),
            "WHERE" => Some(TokenKind::Where),
            "INSERT" => Some(TokenKind::Insert),
            "INTO" => Some(TokenKind::Into),
            "VALUES" => Some(TokenKind::Values),
            "UPDATE" => Some(TokenKind::Update),
            "SET" => Some(TokenKind::Set),
            "DELETE" => Some(TokenKind::Delete),
            "CREATE" => Some(TokenKind::Create),
            "TABLE" => Some(TokenKind::Table),
            "INDEX" => Some(TokenKind::Index),
            "DROP" => Some(TokenKind::Drop),
            "INT" => Some(TokenKind::Int),
            "FLOAT" => Some(TokenKind::Float),
            "VARCHAR" => Some(TokenKind::Varchar),
            "BOOL" => Some(TokenKind::Bool),
            "DATE" => Some(TokenKind::Date),
            "TIMESTAMP" => Some(TokenKind::Timestamp),
            "JOIN" => Some(TokenKind::Join),
            "ON" => Some(TokenKind::On),
            "GROUP" => Some(TokenKind::Group),
            "BY" => Some(TokenKind::By),
            "HAVING" => Some(TokenKind::Having),
            "ORDER" => Some(TokenKind::Order),
            "ASC" => Some(TokenKind::Asc),
            "DESC" => Some(TokenKind::Desc),
            "IF" => Some(TokenKind::If),
            "EXISTS" => Some(TokenKind::Exists),
            "PRIMARY" => Some(TokenKind::Primary),
            "KEY" => Some(TokenKind::Key),
            "AS" => Some(TokenKind::As),
            "LIMIT" => Some(TokenKind::Limit),
            "OFFSET" => Some(TokenKind::Offset),
            "AND" => Some(TokenKind::And),
            "OR" => Some(TokenKind::Or),
            "NOT" => Some(TokenKind::Not),
            "IS" => Some(TokenKind::Is),
            "TRUE" => Some(TokenKind::True),
            "FALSE" => Some(TokenKind::False),
            "NULL" => Some(TokenKind::Null),
            _ => None,
        }
    }
}

/// A single lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::EofFile {
            write!(f, "<eof>")
        } else {
            write!(f, "{}", self.text)
        }
    }
}
