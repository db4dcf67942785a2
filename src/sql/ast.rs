//! SQL abstract syntax tree (AST)
//!
//! Statements and expressions are tagged sum types with owned children,
//! so consumers traverse them with exhaustive `match`es. The tree is
//! immutable once the parser returns it.

use crate::catalog::DataType;

/// A SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    CreateIndex(CreateIndexStatement),
    DropTable(DropTableStatement),
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    /// SELECT * instead of an explicit column list
    pub select_all: bool,
    /// Select list; empty when select_all is set
    pub columns: Vec<SelectColumn>,
    /// FROM table
    pub from: TableRef,
    /// JOIN clauses in source order
    pub joins: Vec<JoinClause>,
    /// WHERE clause
    pub where_clause: Option<Expression>,
    /// GROUP BY clause (with its optional HAVING)
    pub group_by: Option<GroupByClause>,
}

/// One item of a SELECT list: a column reference with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expr: Expression,
    pub alias: Option<String>,
}

/// Table reference with an optional alias ("users", "users u",
/// "users AS u")
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

/// JOIN clause: "JOIN <table> ON <condition>"
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: TableRef,
    pub on: Expression,
}

/// GROUP BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByClause {
    pub exprs: Vec<Expression>,
    pub having: Option<Expression>,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Explicit column list; None means all columns in table order
    pub columns: Option<Vec<String>>,
    /// One or more value tuples of literals
    pub values: Vec<Vec<Literal>>,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expression>,
}

/// Column assignment in an UPDATE's SET list
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<Expression>,
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    /// Primary key columns, from inline markers and the trailing
    /// PRIMARY KEY (...) clause combined
    pub primary_key: Vec<String>,
}

/// Column definition in CREATE TABLE
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// Declared byte length; the type's fixed size except for VARCHAR
    pub length: u16,
}

/// CREATE INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index_name: String,
    pub table_name: String,
    pub columns: Vec<String>,
}

/// DROP TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub if_exists: bool,
    pub table_names: Vec<String>,
}

/// A SQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Typed literal value
    Literal(Literal),
    /// Bare identifier, e.g. a column name
    Identifier(String),
    /// Qualified identifier, e.g. "users.id" or "u.id"
    QualifiedIdentifier { qualifier: String, name: String },
    /// Binary operation
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
}

/// Literal value, typed at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Date(Date),
    Timestamp(Timestamp),
}

/// Calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

/// Calendar date plus time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl Expression {
    /// Helper for building binary nodes without the Box noise.
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}
