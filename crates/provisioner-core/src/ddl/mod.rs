//! MySQL `CREATE TABLE` parser.
//!
//! Only table definitions are read; every other statement in the input is
//! skipped. Tables must carry a single AUTO_INCREMENT integer primary key,
//! since rows are later identified by the identity the server assigns.

mod lexer;

use crate::constraints::{FkAction, ForeignKey, UniqueConstraint};
use crate::error::{Result, SchemaParseError};
use crate::schema::{Column, SchemaModel, Table};
use crate::types::{ColumnKind, kind_for_type};

use lexer::{Token, TokenKind, tokenize};

type ItemResult<T> = std::result::Result<T, String>;

/// Parse DDL text into a schema model, preserving table order.
pub fn parse_ddl(sql: &str) -> Result<SchemaModel> {
    let tokens = tokenize(sql)?;
    let mut tables: Vec<Table> = Vec::new();

    for statement in tokens.split(|token| token.kind == TokenKind::Semicolon) {
        let (Some(first), Some(last)) = (statement.first(), statement.last()) else {
            continue;
        };
        let text = &sql[first.start..last.end];
        let table = match parse_statement(sql, statement) {
            Ok(Some(table)) => table,
            Ok(None) => continue,
            Err(reason) => return Err(SchemaParseError::new(text, reason)),
        };
        if tables.iter().any(|existing| existing.name == table.name) {
            return Err(SchemaParseError::new(
                text,
                format!("duplicate table `{}`", table.name),
            ));
        }
        tables.push(table);
    }

    Ok(SchemaModel::new(tables))
}

fn parse_statement(sql: &str, tokens: &[Token]) -> ItemResult<Option<Table>> {
    let mut cursor = Cursor::new(sql, tokens);
    if !cursor.eat_keyword("CREATE") {
        return Ok(None);
    }
    cursor.eat_keyword("TEMPORARY");
    if !cursor.eat_keyword("TABLE") {
        return Ok(None);
    }
    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);

    let mut name = cursor
        .ident()
        .ok_or_else(|| "missing table name".to_string())?;
    if cursor.eat(&TokenKind::Dot) {
        name = cursor
            .ident()
            .ok_or_else(|| "missing table name after schema qualifier".to_string())?;
    }
    if cursor.at_keyword("LIKE") {
        return Err(format!("CREATE TABLE `{name}` LIKE is not supported"));
    }
    if !cursor.at(&TokenKind::LParen) {
        return Err(format!("table `{name}` has no column list"));
    }
    let body = cursor
        .group()
        .ok_or_else(|| format!("unterminated column list for table `{name}`"))?;

    build_table(sql, name, body.inner).map(Some)
}

enum Item {
    Column(Column, Option<ForeignKey>),
    PrimaryKey(Vec<String>),
    ForeignKey(ForeignKey),
    Unique(UniqueConstraint),
    Ignored,
}

fn build_table(sql: &str, name: String, body: &[Token]) -> ItemResult<Table> {
    let mut columns: Vec<Column> = Vec::new();
    let mut declared_pk: Option<Vec<String>> = None;
    let mut foreign_keys = Vec::new();
    let mut unique_constraints = Vec::new();

    for item in split_top_level(body) {
        if item.is_empty() {
            return Err(format!("empty definition in table `{name}`"));
        }
        match parse_item(sql, item)? {
            Item::Column(mut column, foreign_key) => {
                if columns
                    .iter()
                    .any(|existing| existing.name.eq_ignore_ascii_case(&column.name))
                {
                    return Err(format!(
                        "duplicate column `{}` in table `{name}`",
                        column.name
                    ));
                }
                column.ordinal_position = u16::try_from(columns.len() + 1)
                    .map_err(|_| format!("too many columns in table `{name}`"))?;
                columns.push(column);
                foreign_keys.extend(foreign_key);
            }
            Item::PrimaryKey(keys) => {
                if declared_pk.is_some() {
                    return Err(format!("table `{name}` declares more than one primary key"));
                }
                declared_pk = Some(keys);
            }
            Item::ForeignKey(fk) => foreign_keys.push(fk),
            Item::Unique(unique) => unique_constraints.push(unique),
            Item::Ignored => {}
        }
    }

    if columns.is_empty() {
        return Err(format!("table `{name}` has no columns"));
    }

    let primary_key = resolve_primary_key(&name, &mut columns, declared_pk)?;

    for unique in &unique_constraints {
        if let [single] = unique.columns.as_slice() {
            if let Some(column) = columns
                .iter_mut()
                .find(|column| column.name.eq_ignore_ascii_case(single))
            {
                column.is_unique = true;
            }
        }
    }

    Ok(Table {
        name,
        columns,
        primary_key,
        foreign_keys,
        unique_constraints,
    })
}

fn resolve_primary_key(
    table: &str,
    columns: &mut [Column],
    declared: Option<Vec<String>>,
) -> ItemResult<String> {
    let inline: Vec<String> = columns
        .iter()
        .filter(|column| column.is_primary)
        .map(|column| column.name.clone())
        .collect();

    let keys = match declared {
        Some(_) if !inline.is_empty() => {
            return Err(format!("table `{table}` declares more than one primary key"));
        }
        Some(keys) => keys,
        None if inline.len() > 1 => {
            return Err(format!("table `{table}` declares more than one primary key"));
        }
        None => inline,
    };

    let key = match keys.as_slice() {
        [] => return Err(format!("table `{table}` has no primary key")),
        [key] => key,
        _ => {
            return Err(format!(
                "table `{table}` has a composite primary key ({}); a single AUTO_INCREMENT integer column is required",
                keys.join(", ")
            ));
        }
    };

    let column = columns
        .iter_mut()
        .find(|column| column.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| format!("primary key of table `{table}` names unknown column `{key}`"))?;

    if !column.kind.is_integer() {
        return Err(format!(
            "primary key `{table}.{}` must be an integer column, found `{}`",
            column.name, column.data_type
        ));
    }
    if !column.is_auto_increment {
        return Err(format!(
            "primary key `{table}.{}` must be AUTO_INCREMENT",
            column.name
        ));
    }

    column.is_primary = true;
    column.is_nullable = false;
    Ok(column.name.clone())
}

fn parse_item(sql: &str, item: &[Token]) -> ItemResult<Item> {
    let mut cursor = Cursor::new(sql, item);

    let mut constraint_name = None;
    if cursor.eat_keyword("CONSTRAINT")
        && !["PRIMARY", "FOREIGN", "UNIQUE", "CHECK"]
            .iter()
            .any(|keyword| cursor.at_keyword(keyword))
    {
        constraint_name = cursor.ident();
    }

    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        cursor.skip_index_type();
        let group = cursor
            .group()
            .ok_or_else(|| "PRIMARY KEY needs a column list".to_string())?;
        return Ok(Item::PrimaryKey(name_list(group.inner)));
    }

    if cursor.eat_keywords(&["FOREIGN", "KEY"]) {
        let index_name = if cursor.at(&TokenKind::LParen) {
            None
        } else {
            cursor.ident()
        };
        let group = cursor
            .group()
            .ok_or_else(|| "FOREIGN KEY needs a column list".to_string())?;
        let mut fk = parse_references(&mut cursor, name_list(group.inner))?;
        fk.name = constraint_name.or(index_name);
        return Ok(Item::ForeignKey(fk));
    }

    if cursor.eat_keyword("UNIQUE") {
        let _ = cursor.eat_keyword("KEY") || cursor.eat_keyword("INDEX");
        let index_name = if cursor.at(&TokenKind::LParen) || cursor.at_keyword("USING") {
            None
        } else {
            cursor.ident()
        };
        cursor.skip_index_type();
        let group = cursor
            .group()
            .ok_or_else(|| "UNIQUE needs a column list".to_string())?;
        return Ok(Item::Unique(UniqueConstraint {
            name: constraint_name.or(index_name),
            columns: name_list(group.inner),
        }));
    }

    if constraint_name.is_some()
        || ["CHECK", "KEY", "INDEX", "FULLTEXT", "SPATIAL"]
            .iter()
            .any(|keyword| cursor.at_keyword(keyword))
    {
        return Ok(Item::Ignored);
    }

    parse_column(&mut cursor).map(|(column, fk)| Item::Column(column, fk))
}

fn parse_column(cursor: &mut Cursor<'_>) -> ItemResult<(Column, Option<ForeignKey>)> {
    let name = cursor
        .ident()
        .ok_or_else(|| "expected a column name".to_string())?;
    let type_word = match cursor.advance().map(|token| &token.kind) {
        Some(TokenKind::Word(word)) => word.clone(),
        _ => return Err(format!("column `{name}` has no data type")),
    };

    let mut data_type = type_word.to_ascii_lowercase();
    if data_type == "double" && cursor.eat_keyword("PRECISION") {
        data_type.push_str(" precision");
    }

    let mut args = Vec::new();
    if cursor.at(&TokenKind::LParen) {
        let group = cursor
            .group()
            .ok_or_else(|| format!("unterminated type arguments for column `{name}`"))?;
        data_type.push_str(cursor.text(group.open, group.close));
        args = split_top_level(group.inner)
            .into_iter()
            .filter_map(|part| type_argument(cursor.sql, part))
            .collect();
    }

    let mut column = Column {
        ordinal_position: 0,
        name: name.clone(),
        data_type: String::new(),
        kind: ColumnKind::String { max_len: None },
        is_nullable: true,
        default: None,
        is_auto_increment: false,
        is_primary: false,
        is_unique: false,
        generated: None,
    };
    let mut unsigned = false;
    let mut foreign_key = None;

    if data_type == "serial" {
        column.is_auto_increment = true;
        column.is_nullable = false;
        column.is_unique = true;
    }

    while !cursor.is_done() {
        if cursor.eat_keyword("UNSIGNED") {
            unsigned = true;
        } else if cursor.eat_keyword("SIGNED") || cursor.eat_keyword("ZEROFILL") {
        } else if cursor.eat_keywords(&["NOT", "NULL"]) {
            column.is_nullable = false;
        } else if cursor.eat_keyword("NULL") {
            column.is_nullable = true;
        } else if cursor.eat_keyword("DEFAULT") {
            let expr = cursor
                .expression()
                .ok_or_else(|| format!("DEFAULT without a value on column `{name}`"))?;
            column.default = Some(expr.to_string());
        } else if cursor.eat_keyword("AUTO_INCREMENT") {
            column.is_auto_increment = true;
        } else if cursor.eat_keywords(&["PRIMARY", "KEY"]) || cursor.eat_keyword("KEY") {
            column.is_primary = true;
        } else if cursor.eat_keyword("UNIQUE") {
            cursor.eat_keyword("KEY");
            column.is_unique = true;
        } else if cursor.at_keyword("REFERENCES") {
            foreign_key = Some(parse_references(cursor, vec![name.clone()])?);
        } else if cursor.eat_keywords(&["CHARACTER", "SET"])
            || cursor.eat_keyword("CHARSET")
            || cursor.eat_keyword("COLLATE")
            || cursor.eat_keyword("COMMENT")
            || cursor.eat_keyword("COLUMN_FORMAT")
            || cursor.eat_keyword("STORAGE")
            || cursor.eat_keyword("SRID")
        {
            cursor.skip_one();
        } else if cursor.eat_keywords(&["ON", "UPDATE"]) {
            cursor.expression();
        } else if cursor.eat_keywords(&["GENERATED", "ALWAYS"]) {
            // `AS (expr)` follows
        } else if cursor.eat_keyword("AS") {
            let group = cursor
                .group()
                .ok_or_else(|| format!("generated column `{name}` needs an expression"))?;
            let expr = match (group.inner.first(), group.inner.last()) {
                (Some(first), Some(last)) => cursor.text(first, last).to_string(),
                _ => return Err(format!("generated column `{name}` has an empty expression")),
            };
            column.generated = Some(expr);
        } else if cursor.eat_keyword("CHECK") {
            cursor.group();
        } else {
            cursor.skip_one();
        }
    }

    if unsigned {
        data_type.push_str(" unsigned");
    }
    column.kind = kind_for_type(&type_word, &args, unsigned);
    column.data_type = data_type;
    if column.is_primary {
        column.is_nullable = false;
    }

    Ok((column, foreign_key))
}

fn parse_references(cursor: &mut Cursor<'_>, columns: Vec<String>) -> ItemResult<ForeignKey> {
    if !cursor.eat_keyword("REFERENCES") {
        return Err("FOREIGN KEY without REFERENCES".to_string());
    }
    let mut referenced_table = cursor
        .ident()
        .ok_or_else(|| "REFERENCES needs a table name".to_string())?;
    if cursor.eat(&TokenKind::Dot) {
        referenced_table = cursor
            .ident()
            .ok_or_else(|| "REFERENCES needs a table name".to_string())?;
    }
    let group = cursor
        .group()
        .ok_or_else(|| format!("REFERENCES `{referenced_table}` needs a column list"))?;

    let mut fk = ForeignKey {
        name: None,
        columns,
        referenced_table,
        referenced_columns: name_list(group.inner),
        on_update: None,
        on_delete: None,
    };

    loop {
        if cursor.eat_keywords(&["ON", "DELETE"]) {
            fk.on_delete = Some(parse_action(cursor)?);
        } else if cursor.eat_keywords(&["ON", "UPDATE"]) {
            fk.on_update = Some(parse_action(cursor)?);
        } else if cursor.eat_keyword("MATCH") {
            cursor.skip_one();
        } else {
            break;
        }
    }

    Ok(fk)
}

fn parse_action(cursor: &mut Cursor<'_>) -> ItemResult<FkAction> {
    if cursor.eat_keyword("RESTRICT") {
        Ok(FkAction::Restrict)
    } else if cursor.eat_keyword("CASCADE") {
        Ok(FkAction::Cascade)
    } else if cursor.eat_keywords(&["SET", "NULL"]) {
        Ok(FkAction::SetNull)
    } else if cursor.eat_keywords(&["SET", "DEFAULT"]) {
        Ok(FkAction::SetDefault)
    } else if cursor.eat_keywords(&["NO", "ACTION"]) {
        Ok(FkAction::NoAction)
    } else {
        Err("unknown referential action".to_string())
    }
}

/// Leading identifier of each comma-separated entry (`col(10) DESC` -> `col`).
fn name_list(tokens: &[Token]) -> Vec<String> {
    split_top_level(tokens)
        .into_iter()
        .filter_map(|part| part.first().and_then(Token::ident).map(str::to_string))
        .collect()
}

fn type_argument(sql: &str, part: &[Token]) -> Option<String> {
    match part {
        [] => None,
        [single] => match &single.kind {
            TokenKind::Str(text)
            | TokenKind::Quoted(text)
            | TokenKind::Number(text)
            | TokenKind::Word(text) => Some(text.clone()),
            _ => Some(sql[single.start..single.end].to_string()),
        },
        [first, .., last] => Some(sql[first.start..last.end].to_string()),
    }
}

fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                parts.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() || !parts.is_empty() {
        parts.push(&tokens[start..]);
    }
    parts
}

struct Group<'a> {
    inner: &'a [Token],
    open: &'a Token,
    close: &'a Token,
}

struct Cursor<'a> {
    sql: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(sql: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            sql,
            tokens,
            pos: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn text(&self, first: &Token, last: &Token) -> &'a str {
        &self.sql[first.start..last.end]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|token| &token.kind == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|token| token.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Consume the whole keyword sequence or nothing.
    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords.iter().enumerate().all(|(offset, keyword)| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|token| token.is_keyword(keyword))
        });
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn ident(&mut self) -> Option<String> {
        let name = self.peek()?.ident()?.to_string();
        self.pos += 1;
        Some(name)
    }

    /// Consume a balanced parenthesized group at the cursor.
    fn group(&mut self) -> Option<Group<'a>> {
        let tokens = self.tokens;
        let open = self.peek().filter(|token| token.kind == TokenKind::LParen)?;
        let mut depth = 0usize;
        for (offset, token) in tokens[self.pos..].iter().enumerate() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let close_idx = self.pos + offset;
                        let inner = &tokens[self.pos + 1..close_idx];
                        self.pos = close_idx + 1;
                        return Some(Group {
                            inner,
                            open,
                            close: token,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn skip_one(&mut self) {
        if self.group().is_none() {
            self.pos += 1;
        }
    }

    fn skip_index_type(&mut self) {
        if self.eat_keyword("USING") {
            self.skip_one();
        }
    }

    /// Raw text of a default-style expression: literal, signed number,
    /// function call, or parenthesized expression.
    fn expression(&mut self) -> Option<&'a str> {
        let first = self.peek()?;
        let last = match &first.kind {
            TokenKind::LParen => self.group()?.close,
            TokenKind::Symbol('-') | TokenKind::Symbol('+') => {
                self.pos += 1;
                self.advance()?
            }
            TokenKind::Word(_) => {
                self.pos += 1;
                match self.peek() {
                    Some(next) if next.kind == TokenKind::LParen => self.group()?.close,
                    // charset introducers and bit/hex literals: _utf8mb4'x', b'0'
                    Some(next)
                        if next.start == first.end && matches!(next.kind, TokenKind::Str(_)) =>
                    {
                        self.pos += 1;
                        next
                    }
                    _ => first,
                }
            }
            _ => {
                self.pos += 1;
                first
            }
        };
        Some(self.text(first, last))
    }
}
