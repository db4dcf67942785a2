//! SQL parser
//!
//! Recursive-descent parser over the lexer's token stream. The entry
//! point dispatches on the first token; expressions use a precedence
//! ladder (OR, then AND, then the relational operators, then primaries).
//! Parse failures carry the offending token's text and abandon the
//! statement; there is no error recovery.

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::catalog::DataType;
use crate::error::{Error, Result};

/// Declared length of a VARCHAR column with no explicit length
const DEFAULT_VARCHAR_LENGTH: u16 = 255;

/// SQL parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a parser for a SQL string
    pub fn new(sql: &str) -> Self {
        Self::from_tokens(Lexer::new(sql).tokenize())
    }

    /// Create a parser over an already-lexed token stream
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EofFile) {
            tokens.push(Token::new(TokenKind::EofFile, ""));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse a single SQL statement
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = match self.current().kind {
            TokenKind::Select => self.parse_select().map(Statement::Select),
            TokenKind::Insert => self.parse_insert().map(Statement::Insert),
            TokenKind::Update => self.parse_update().map(Statement::Update),
            TokenKind::Delete => self.parse_delete().map(Statement::Delete),
            TokenKind::Create => self.parse_create(),
            TokenKind::Drop => self.parse_drop().map(Statement::DropTable),
            _ => Err(Error::UnexpectedToken {
                expected: "SELECT, INSERT, UPDATE, DELETE, CREATE, or DROP".to_string(),
                found: self.current().to_string(),
            }),
        }?;

        // A trailing semicolon is tolerated but not required.
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }

        Ok(stmt)
    }

    // ========== Helpers ==========

    fn current(&self) -> &Token {
        // The token stream always ends with EofFile.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    /// Non-consuming test of the current token's kind.
    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Consume and return the current token.
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    /// Consume a token of the expected kind or fail with the offending
    /// token's text.
    fn ensure(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(TokenKind::EofFile) {
            Err(Error::UnexpectedEof(expected.to_string()))
        } else {
            Err(Error::UnexpectedToken {
                expected: expected.to_string(),
                found: self.current().to_string(),
            })
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String> {
        Ok(self.ensure(TokenKind::Identifier, expected)?.text)
    }

    fn parse_identifier_list(&mut self, expected: &str) -> Result<Vec<String>> {
        let mut names = vec![self.expect_identifier(expected)?];
        while self.check(TokenKind::Comma) {
            self.advance();
            names.push(self.expect_identifier(expected)?);
        }
        Ok(names)
    }

    // ========== SELECT ==========

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.ensure(TokenKind::Select, "SELECT")?;

        let mut stmt = SelectStatement::default();
        if self.check(TokenKind::Star) {
            self.advance();
            stmt.select_all = true;
        } else {
            stmt.columns = self.parse_select_columns()?;
        }

        self.ensure(TokenKind::From, "FROM")?;
        stmt.from = self.parse_table_ref()?;

        while self.check(TokenKind::Join) {
            self.advance();
            let table = self.parse_table_ref()?;
            self.ensure(TokenKind::On, "ON")?;
            let on = self.parse_expression()?;
            stmt.joins.push(JoinClause { table, on });
        }

        if self.check(TokenKind::Where) {
            self.advance();
            stmt.where_clause = Some(self.parse_expression()?);
        }

        if self.check(TokenKind::Group) {
            self.advance();
            self.ensure(TokenKind::By, "BY after GROUP")?;
            let mut exprs = vec![self.parse_expression()?];
            while self.check(TokenKind::Comma) {
                self.advance();
                exprs.push(self.parse_expression()?);
            }
            let having = if self.check(TokenKind::Having) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            stmt.group_by = Some(GroupByClause { exprs, having });
        }

        Ok(stmt)
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut columns = Vec::new();
        loop {
            let expr = self.parse_column_ref()?;
            let alias = if self.check(TokenKind::As) {
                self.advance();
                Some(self.expect_identifier("alias name")?)
            } else {
                None
            };
            columns.push(SelectColumn { expr, alias });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(columns)
    }

    /// A plain or qualified column reference.
    fn parse_column_ref(&mut self) -> Result<Expression> {
        let name = self.expect_identifier("column name")?;
        if self.check(TokenKind::Dot) {
            self.advance();
            let member = self.expect_identifier("column name after '.'")?;
            Ok(Expression::QualifiedIdentifier {
                qualifier: name,
                name: member,
            })
        } else {
            Ok(Expression::Identifier(name))
        }
    }

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let name = self.expect_identifier("table name")?;
        let alias = if self.check(TokenKind::As) {
            self.advance();
            Some(self.expect_identifier("alias for table")?)
        } else if self.check(TokenKind::Identifier) {
            // Bare identifier after the table name is an implicit alias.
            Some(self.advance().text)
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    // ========== INSERT ==========

    fn parse_insert(&mut self) -> Result<InsertStatement> {
        self.ensure(TokenKind::Insert, "INSERT")?;
        self.ensure(TokenKind::Into, "INTO")?;
        let table_name = self.expect_identifier("table name")?;

        let columns = if self.check(TokenKind::Lparen) {
            self.advance();
            let cols = self.parse_identifier_list("column name")?;
            self.ensure(TokenKind::Rparen, "')'")?;
            Some(cols)
        } else {
            None
        };

        self.ensure(TokenKind::Values, "VALUES")?;

        let mut values = vec![self.parse_value_tuple()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            values.push(self.parse_value_tuple()?);
        }

        Ok(InsertStatement {
            table_name,
            columns,
            values,
        })
    }

    fn parse_value_tuple(&mut self) -> Result<Vec<Literal>> {
        self.ensure(TokenKind::Lparen, "'('")?;
        let mut row = vec![self.parse_literal()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            row.push(self.parse_literal()?);
        }
        self.ensure(TokenKind::Rparen, "')'")?;
        Ok(row)
    }

    // ========== UPDATE ==========

    fn parse_update(&mut self) -> Result<UpdateStatement> {
        self.ensure(TokenKind::Update, "UPDATE")?;
        let table_name = self.expect_identifier("table name")?;
        self.ensure(TokenKind::Set, "SET")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier("column name")?;
            self.ensure(TokenKind::Eq, "'='")?;
            let value = self.parse_expression()?;
            assignments.push(Assignment { column, value });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        let where_clause = if self.check(TokenKind::Where) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(UpdateStatement {
            table_name,
            assignments,
            where_clause,
        })
    }

    // ========== DELETE ==========

    fn parse_delete(&mut self) -> Result<DeleteStatement> {
        self.ensure(TokenKind::Delete, "DELETE")?;
        self.ensure(TokenKind::From, "FROM")?;
        let table_name = self.expect_identifier("table name")?;

        let where_clause = if self.check(TokenKind::Where) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(DeleteStatement {
            table_name,
            where_clause,
        })
    }

    // ========== CREATE ==========

    fn parse_create(&mut self) -> Result<Statement> {
        self.ensure(TokenKind::Create, "CREATE")?;
        match self.current().kind {
            TokenKind::Table => self.parse_create_table().map(Statement::CreateTable),
            TokenKind::Index => self.parse_create_index().map(Statement::CreateIndex),
            _ => Err(Error::UnexpectedToken {
                expected: "TABLE or INDEX".to_string(),
                found: self.current().to_string(),
            }),
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStatement> {
        self.ensure(TokenKind::Table, "TABLE")?;
        let table_name = self.expect_identifier("table name")?;
        self.ensure(TokenKind::Lparen, "'('")?;

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            if self.check(TokenKind::Primary) {
                // Trailing table-level PRIMARY KEY (col, ...) clause.
                self.advance();
                self.ensure(TokenKind::Key, "KEY after PRIMARY")?;
                self.ensure(TokenKind::Lparen, "'('")?;
                primary_key.extend(self.parse_identifier_list("primary key column")?);
                self.ensure(TokenKind::Rparen, "')'")?;
            } else {
                let name = self.expect_identifier("column name")?;
                let (data_type, length) = self.parse_type_spec()?;
                if self.check(TokenKind::Primary) {
                    self.advance();
                    self.ensure(TokenKind::Key, "KEY after PRIMARY")?;
                    primary_key.push(name.clone());
                }
                columns.push(ColumnDef {
                    name,
                    data_type,
                    length,
                });
            }

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.ensure(TokenKind::Rparen, "')'")?;

        Ok(CreateTableStatement {
            table_name,
            columns,
            primary_key,
        })
    }

    fn parse_type_spec(&mut self) -> Result<(DataType, u16)> {
        match self.current().kind {
            TokenKind::Int => {
                self.advance();
                Ok((DataType::Integer, 4))
            }
            TokenKind::Float => {
                self.advance();
                Ok((DataType::Double, 8))
            }
            TokenKind::Bool => {
                self.advance();
                Ok((DataType::Boolean, 1))
            }
            TokenKind::Date => {
                self.advance();
                Ok((DataType::Date, 12))
            }
            TokenKind::Timestamp => {
                self.advance();
                Ok((DataType::Timestamp, 24))
            }
            TokenKind::Varchar => {
                self.advance();
                if self.check(TokenKind::Lparen) {
                    self.advance();
                    let token = self.ensure(TokenKind::IntLiteral, "VARCHAR length")?;
                    let length = token.text.parse::<u16>().map_err(|_| {
                        Error::UnexpectedToken {
                            expected: "VARCHAR length".to_string(),
                            found: token.text.clone(),
                        }
                    })?;
                    self.ensure(TokenKind::Rparen, "')'")?;
                    Ok((DataType::Varchar, length))
                } else {
                    Ok((DataType::Varchar, DEFAULT_VARCHAR_LENGTH))
                }
            }
            _ => Err(Error::UnexpectedToken {
                expected: "data type".to_string(),
                found: self.current().to_string(),
            }),
        }
    }

    fn parse_create_index(&mut self) -> Result<CreateIndexStatement> {
        self.ensure(TokenKind::Index, "INDEX")?;
        let index_name = self.expect_identifier("index name")?;
        self.ensure(TokenKind::On, "ON")?;
        let table_name = self.expect_identifier("table name")?;
        self.ensure(TokenKind::Lparen, "'('")?;
        let columns = self.parse_identifier_list("column name")?;
        self.ensure(TokenKind::Rparen, "')'")?;

        Ok(CreateIndexStatement {
            index_name,
            table_name,
            columns,
        })
    }

    // ========== DROP ==========

    fn parse_drop(&mut self) -> Result<DropTableStatement> {
        self.ensure(TokenKind::Drop, "DROP")?;
        self.ensure(TokenKind::Table, "TABLE")?;

        let if_exists = if self.check(TokenKind::If) {
            self.advance();
            self.ensure(TokenKind::Exists, "EXISTS after IF")?;
            true
        } else {
            false
        };

        let table_names = self.parse_identifier_list("table name")?;

        Ok(DropTableStatement {
            if_exists,
            table_names,
        })
    }

    // ========== Expressions ==========

    /// Entry point: lowest precedence first (OR, then AND, then the
    /// relational operators, then primaries).
    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expression> {
        let mut left = self.parse_and_expr()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expression::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expression> {
        let mut left = self.parse_relational_expr()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_relational_expr()?;
            left = Expression::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> Result<Expression> {
        let mut left = self.parse_primary_expr()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOperator::Eq,
                TokenKind::Ne => BinaryOperator::Ne,
                TokenKind::Lt => BinaryOperator::Lt,
                TokenKind::Lte => BinaryOperator::Lte,
                TokenKind::Gt => BinaryOperator::Gt,
                TokenKind::Gte => BinaryOperator::Gte,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary_expr()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_primary_expr(&mut self) -> Result<Expression> {
        match self.current().kind {
            TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::DateLiteral
            | TokenKind::TimestampLiteral
            | TokenKind::True
            | TokenKind::False => Ok(Expression::Literal(self.parse_literal()?)),
            TokenKind::Identifier => self.parse_column_ref(),
            TokenKind::Lparen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.ensure(TokenKind::Rparen, "')' after expression")?;
                Ok(expr)
            }
            TokenKind::EofFile => Err(Error::UnexpectedEof("expression".to_string())),
            _ => Err(Error::UnexpectedToken {
                expected: "expression".to_string(),
                found: self.current().to_string(),
            }),
        }
    }

    /// Convert the current literal token into a typed Literal node.
    fn parse_literal(&mut self) -> Result<Literal> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| {
                    Error::UnexpectedToken {
                        expected: "integer literal".to_string(),
                        found: token.text.clone(),
                    }
                })?;
                Ok(Literal::Integer(value))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let value = token.text.parse::<f64>().map_err(|_| {
                    Error::UnexpectedToken {
                        expected: "float literal".to_string(),
                        found: token.text.clone(),
                    }
                })?;
                Ok(Literal::Float(value))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Literal::String(token.text))
            }
            TokenKind::DateLiteral => {
                self.advance();
                Ok(Literal::Date(parse_date_text(&token.text)?))
            }
            TokenKind::TimestampLiteral => {
                self.advance();
                Ok(Literal::Timestamp(parse_timestamp_text(&token.text)?))
            }
            TokenKind::True => {
                self.advance();
                Ok(Literal::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Literal::Boolean(false))
            }
            TokenKind::EofFile => Err(Error::UnexpectedEof("literal".to_string())),
            _ => Err(Error::UnexpectedToken {
                expected: "literal".to_string(),
                found: token.to_string(),
            }),
        }
    }
}

fn parse_date_text(text: &str) -> Result<Date> {
    let field = |range: std::ops::Range<usize>| -> Result<i32> {
        text[range].parse().map_err(|_| Error::UnexpectedToken {
            expected: "date literal".to_string(),
            found: text.to_string(),
        })
    };
    Ok(Date {
        year: field(0..4)?,
        month: field(5..7)?,
        day: field(8..10)?,
    })
}

fn parse_timestamp_text(text: &str) -> Result<Timestamp> {
    let date = parse_date_text(&text[..10])?;
    let field = |range: std::ops::Range<usize>| -> Result<i32> {
        text[range].parse().map_err(|_| Error::UnexpectedToken {
            expected: "timestamp literal".to_string(),
            found: text.to_string(),
        })
    };
    Ok(Timestamp {
        year: date.year,
        month: date.month,
        day: date.day,
        hour: field(11..13)?,
        minute: field(14..16)?,
        second: field(17..19)?,
    })
}
