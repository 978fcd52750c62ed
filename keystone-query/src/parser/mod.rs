//! Recursive-descent parser for the CQL-like statement grammar.
//!
//! Parsing binds names to the model as it goes: the produced AST carries
//! entity and field handles, and statement invariants are checked by the AST
//! constructors before a statement is returned.

mod lexer;

use std::collections::BTreeSet;

use keystone_model::{EntityId, FieldId, FieldKind, KeyPath, Model, ModelError};

use crate::ast::{Condition, Delete, Insert, Literal, Operator, Query, Setting, Statement, Update};
use crate::error::{ParseError, QueryError, QueryResult};

use lexer::{tokenize, Token, TokenKind};

/// Parses one statement against a model.
///
/// # Errors
///
/// Returns [`QueryError::Parse`] for text outside the grammar and
/// [`QueryError::Statement`] for statements that parse but violate an
/// invariant or reference unknown entities or fields.
pub fn parse_statement(model: &Model, input: &str) -> QueryResult<Statement> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { model, tokens, pos: 0 };
    let statement = parser.parse()?;
    parser.expect_end()?;
    Ok(statement)
}

struct Parser<'a> {
    model: &'a Model,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn parse(&mut self) -> QueryResult<Statement> {
        if self.eat_keyword("SELECT") {
            return self.parse_select();
        }
        if self.eat_keyword("UPDATE") {
            return self.parse_update();
        }
        if self.eat_keyword("INSERT") {
            self.expect_keyword("INTO")?;
            return self.parse_insert();
        }
        if self.eat_keyword("DELETE") {
            return self.parse_delete();
        }
        Err(self.unexpected("SELECT, UPDATE, INSERT, or DELETE").into())
    }

    fn parse_select(&mut self) -> QueryResult<Statement> {
        let wildcard = self.eat(&TokenKind::Star);
        let mut names = Vec::new();
        if !wildcard {
            names.push(self.parse_dotted_name()?);
            while self.eat(&TokenKind::Comma) {
                names.push(self.parse_dotted_name()?);
            }
        }

        self.expect_keyword("FROM")?;
        let path = self.parse_path()?;

        let conditions = self.parse_where(&path)?;

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let name = self.parse_dotted_name()?;
                order_by.push(self.resolve_field(&name, &path)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword("LIMIT") { Some(self.parse_limit()?) } else { None };

        let select: BTreeSet<FieldId> = if wildcard {
            let target = path.first();
            self.model
                .entity(target)
                .scalar_ordinals()
                .map(|ord| FieldId::new(target, ord as u32))
                .collect()
        } else {
            names
                .iter()
                .map(|name| self.resolve_field(name, &path))
                .collect::<QueryResult<_>>()?
        };

        let query = Query::new(self.model, select, path, conditions, order_by, limit)
            .map_err(QueryError::Statement)?;
        Ok(Statement::Query(query))
    }

    fn parse_update(&mut self) -> QueryResult<Statement> {
        let entity = self.parse_entity()?;
        let path = if self.eat_keyword("FROM") {
            self.parse_path()?
        } else {
            KeyPath::single(entity)
        };
        self.expect_keyword("SET")?;
        let settings = self.parse_settings(entity)?;
        let conditions = self.parse_where(&path)?;
        let update = Update::new(self.model, entity, path, settings, conditions)
            .map_err(QueryError::Statement)?;
        Ok(Statement::Update(update))
    }

    fn parse_insert(&mut self) -> QueryResult<Statement> {
        let entity = self.parse_entity()?;
        self.expect_keyword("SET")?;
        let settings = self.parse_settings(entity)?;
        let insert =
            Insert::new(self.model, entity, settings).map_err(QueryError::Statement)?;
        Ok(Statement::Insert(insert))
    }

    fn parse_delete(&mut self) -> QueryResult<Statement> {
        let entity = self.parse_entity()?;
        let path = if self.eat_keyword("FROM") {
            self.parse_path()?
        } else {
            KeyPath::single(entity)
        };
        let conditions = self.parse_where(&path)?;
        let delete =
            Delete::new(self.model, entity, path, conditions).map_err(QueryError::Statement)?;
        Ok(Statement::Delete(delete))
    }

    fn parse_where(&mut self, path: &KeyPath) -> QueryResult<Vec<Condition>> {
        let mut conditions = Vec::new();
        if self.eat_keyword("WHERE") {
            conditions.push(self.parse_condition(path)?);
            while self.eat_keyword("AND") {
                conditions.push(self.parse_condition(path)?);
            }
        }
        Ok(conditions)
    }

    fn parse_condition(&mut self, path: &KeyPath) -> QueryResult<Condition> {
        let name = self.parse_dotted_name()?;
        let field = self.resolve_field(&name, path)?;
        let op = self.parse_operator()?;
        let value = self.parse_value()?;
        Ok(Condition::new(field, op, value))
    }

    fn parse_settings(&mut self, entity: EntityId) -> QueryResult<Vec<Setting>> {
        let mut settings = vec![self.parse_setting(entity)?];
        while self.eat(&TokenKind::Comma) {
            settings.push(self.parse_setting(entity)?);
        }
        Ok(settings)
    }

    fn parse_setting(&mut self, entity: EntityId) -> QueryResult<Setting> {
        let name = self.parse_dotted_name()?;
        // Settings resolve against the target entity; a qualifier, if
        // present, must name it.
        let field = match name.as_slice() {
            [(field, _)] => self.model.lookup_field(entity, field)?,
            [.., (qualifier, _), (field, _)] => {
                let qualified = self.model.lookup_entity(qualifier)?;
                self.model.lookup_field(qualified, field)?
            }
            [] => return Err(self.unexpected("setting field").into()),
        };
        match self.parse_operator()? {
            Operator::Eq => {}
            other => {
                return Err(ParseError::UnexpectedToken {
                    pos: self.previous_pos(),
                    expected: "=".to_owned(),
                    found: other.as_str().to_owned(),
                }
                .into())
            }
        }
        let value = self.parse_value()?;
        Ok(Setting { field, value })
    }

    fn parse_operator(&mut self) -> QueryResult<Operator> {
        if let Some(Token { kind: TokenKind::Op(op), .. }) = self.peek() {
            let op = *op;
            self.pos += 1;
            return Ok(op);
        }
        Err(self.unexpected("comparison operator").into())
    }

    fn parse_value(&mut self) -> QueryResult<Option<Literal>> {
        let value = match self.peek() {
            Some(Token { kind: TokenKind::Question, .. }) => None,
            Some(Token { kind: TokenKind::Integer(v), .. }) => Some(Literal::Integer(*v)),
            Some(Token { kind: TokenKind::Float(v), .. }) => Some(Literal::Float(*v)),
            Some(Token { kind: TokenKind::Str(s), .. }) => Some(Literal::Str(s.clone())),
            _ => return Err(self.unexpected("literal or ?").into()),
        };
        self.pos += 1;
        Ok(value)
    }

    fn parse_limit(&mut self) -> QueryResult<u64> {
        if let Some(Token { kind: TokenKind::Integer(v), pos }) = self.peek() {
            let (v, pos) = (*v, *pos);
            self.pos += 1;
            return u64::try_from(v).map_err(|_| {
                QueryError::Parse(ParseError::InvalidNumber {
                    pos,
                    reason: "LIMIT must be non-negative".to_owned(),
                })
            });
        }
        Err(self.unexpected("limit").into())
    }

    fn parse_entity(&mut self) -> QueryResult<EntityId> {
        let (name, _) = self.parse_ident()?;
        Ok(self.model.lookup_entity(&name)?)
    }

    /// Parses `<ident>(.<ident>)*` and resolves it to a path.
    ///
    /// The first component names the target entity. Each later component
    /// may name a connected entity directly or a foreign-key field on the
    /// previous entity.
    fn parse_path(&mut self) -> QueryResult<KeyPath> {
        let names = self.parse_dotted_name()?;
        let (first, _) = &names[0];
        let mut entities = vec![self.model.lookup_entity(first)?];

        for (name, _) in &names[1..] {
            let prev = entities[entities.len() - 1];
            let next = if let Ok(entity) = self.model.lookup_entity(name) {
                entity
            } else if let Ok(field) = self.model.lookup_field(prev, name) {
                match self.model.field(field).kind {
                    FieldKind::ForeignKey { target, .. } => target,
                    _ => return Err(ModelError::EntityNotFound(name.clone()).into()),
                }
            } else {
                return Err(ModelError::EntityNotFound(name.clone()).into());
            };
            entities.push(next);
        }

        Ok(KeyPath::new(self.model, entities)?)
    }

    /// Resolves a dotted field reference against the statement path.
    ///
    /// A bare name resolves on the path's target entity; a qualified name
    /// resolves on the named entity. Whether that entity actually lies on
    /// the path is checked by the statement constructors.
    fn resolve_field(
        &self,
        name: &[(String, usize)],
        path: &KeyPath,
    ) -> QueryResult<FieldId> {
        match name {
            [(field, _)] => Ok(self.model.lookup_field(path.first(), field)?),
            [.., (qualifier, _), (field, _)] => {
                let entity = self.model.lookup_entity(qualifier)?;
                Ok(self.model.lookup_field(entity, field)?)
            }
            [] => Err(QueryError::Parse(ParseError::UnexpectedEnd {
                expected: "field reference".to_owned(),
            })),
        }
    }

    fn parse_dotted_name(&mut self) -> QueryResult<Vec<(String, usize)>> {
        let mut parts = vec![self.parse_ident()?];
        while self.eat(&TokenKind::Dot) {
            parts.push(self.parse_ident()?);
        }
        Ok(parts)
    }

    fn parse_ident(&mut self) -> QueryResult<(String, usize)> {
        if let Some(Token { kind: TokenKind::Ident(name), pos }) = self.peek() {
            let ident = (name.clone(), *pos);
            self.pos += 1;
            return Ok(ident);
        }
        Err(self.unexpected("identifier").into())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token { kind: TokenKind::Ident(word), .. }) = self.peek() {
            if word.eq_ignore_ascii_case(keyword) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of statement")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                pos: token.pos,
                expected: expected.to_owned(),
                found: token.kind.describe(),
            },
            None => ParseError::UnexpectedEnd { expected: expected.to_owned() },
        }
    }

    fn previous_pos(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map_or(0, |t| t.pos)
    }
}
