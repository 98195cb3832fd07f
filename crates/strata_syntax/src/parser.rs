//! Recursive descent parser for executable GraphQL documents.
//!
//! The parser stops at the first syntax error, so a failed parse always carries exactly one
//! `SYNTAX_ERROR` message. The partially built document is still returned.

use crate::ast::*;
use crate::lexer::{block_string_value, decode_string, Lexer};
use crate::token::{Token, TokenKind};
use strata_core::{codes, GraphMessage, GraphMessageCollection, Interner, LineIndex, Span, Text};

/// Parser for executable documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    line_index: LineIndex,
    current: Token,
    prev_end: u32,
    messages: GraphMessageCollection,
    failed: bool,
}

/// Result of parsing.
pub struct ParseResult<'a> {
    pub document: Document<'a>,
    pub messages: GraphMessageCollection,
    pub line_index: LineIndex,
}

impl ParseResult<'_> {
    /// Returns true if the source parsed without errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Parses a source string into a document.
pub fn parse<'a>(source: &'a str, interner: &'a Interner) -> ParseResult<'a> {
    let mut parser = Parser::new(source, interner);
    let document = parser.parse_document();
    ParseResult {
        document,
        messages: parser.messages,
        line_index: parser.line_index,
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str, interner: &'a Interner) -> Self {
        let mut lexer = Lexer::new(source, interner);
        let current = lexer.next_token();
        Self {
            lexer,
            line_index: LineIndex::new(source),
            current,
            prev_end: 0,
            messages: GraphMessageCollection::new(),
            failed: false,
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Returns true while the parser can keep consuming tokens inside a delimited list.
    #[inline]
    fn in_list(&self, close: TokenKind) -> bool {
        !self.failed && !self.at_kind(close) && !self.at_kind(TokenKind::Eof)
    }

    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.current = self.lexer.next_token();
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn intern_current(&self) -> Text {
        self.lexer.intern_span(self.current.span)
    }

    /// Records a syntax error at the current token. Only the first error is kept.
    fn error(&mut self, message: &str) {
        if self.failed {
            return;
        }
        self.failed = true;
        let location = self.line_index.span_start(self.current.span);
        self.messages.add(
            GraphMessage::critical(codes::SYNTAX_ERROR, format!("Syntax Error: {message}"))
                .with_location(location),
        );
    }

    fn error_expected(&mut self, expected: &str) {
        let found = self.describe_current();
        self.error(&format!("Expected {expected}, found {found}."));
    }

    fn describe_current(&self) -> String {
        match self.at() {
            TokenKind::Eof => "<EOF>".to_string(),
            TokenKind::Error => format!("invalid token \"{}\"", self.current_text()),
            kind if kind.is_name() => format!("Name \"{}\"", self.current_text()),
            TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::BlockStringLiteral => {
                format!("{} \"{}\"", self.at(), self.current_text())
            }
            kind => format!("\"{kind}\""),
        }
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document<'a> {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        if self.at_kind(TokenKind::Eof) {
            self.error("Unexpected <EOF>.");
        }

        while !self.failed && !self.at_kind(TokenKind::Eof) {
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
        }

        Document {
            definitions,
            span: self.span_from(start),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition<'a>> {
        match self.at() {
            TokenKind::Query
            | TokenKind::Mutation
            | TokenKind::Subscription
            | TokenKind::LBrace => Some(Definition::Operation(self.parse_operation())),
            TokenKind::Fragment => Some(Definition::Fragment(self.parse_fragment_definition())),
            _ => {
                let found = self.describe_current();
                self.error(&format!("Unexpected {found}."));
                None
            }
        }
    }

    fn parse_name(&mut self) -> Name {
        let span = self.current.span;
        if self.at().is_name() {
            let value = self.intern_current();
            self.advance();
            Name::new(value, span)
        } else {
            self.error_expected("Name");
            Name::new(self.lexer.intern_span(Span::empty(span.start)), span)
        }
    }

    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;

        let ty = if self.at_kind(TokenKind::LBracket) {
            self.advance();
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), self.span_from(start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.at_kind(TokenKind::Bang) {
            self.advance();
            Type::NonNull(Box::new(ty), self.span_from(start))
        } else {
            ty
        }
    }

    fn parse_directives(&mut self, is_const: bool) -> Vec<Directive<'a>> {
        let mut directives = Vec::new();
        while !self.failed && self.at_kind(TokenKind::At) {
            directives.push(self.parse_directive(is_const));
        }
        directives
    }

    fn parse_directive(&mut self, is_const: bool) -> Directive<'a> {
        let start = self.current.span.start;
        self.advance(); // @

        let name = self.parse_name();
        let arguments = self.parse_arguments(is_const);

        Directive {
            name,
            arguments,
            span: self.span_from(start),
        }
    }

    /// Parses an optional parenthesized argument list.
    fn parse_arguments(&mut self, is_const: bool) -> Vec<Argument<'a>> {
        let mut args = Vec::new();
        if !self.at_kind(TokenKind::LParen) {
            return args;
        }
        self.advance();
        if self.at_kind(TokenKind::RParen) {
            self.error_expected("Name");
        }
        while self.in_list(TokenKind::RParen) {
            args.push(self.parse_argument(is_const));
        }
        self.expect(TokenKind::RParen);
        args
    }

    fn parse_argument(&mut self, is_const: bool) -> Argument<'a> {
        let start = self.current.span.start;
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let value = self.parse_value(is_const);
        Argument {
            name,
            value,
            span: self.span_from(start),
        }
    }

    fn parse_value(&mut self, is_const: bool) -> Value<'a> {
        let start = self.current.span.start;

        match self.at() {
            TokenKind::Dollar if !is_const => {
                self.advance();
                let name = self.parse_name();
                Value::Variable(Name::new(name.value, self.span_from(start)))
            }
            TokenKind::IntLiteral => {
                let text = self.current_text();
                self.advance();
                Value::Int(text, self.span_from(start))
            }
            TokenKind::FloatLiteral => {
                let text = self.current_text();
                self.advance();
                Value::Float(text, self.span_from(start))
            }
            TokenKind::StringLiteral => {
                let Some(value) = decode_string(self.current_text()) else {
                    self.error("Invalid character escape sequence.");
                    return Value::Null(self.current.span);
                };
                self.advance();
                Value::String(value, self.span_from(start))
            }
            TokenKind::BlockStringLiteral => {
                let value = block_string_value(self.current_text());
                self.advance();
                Value::String(value, self.span_from(start))
            }
            TokenKind::True => {
                self.advance();
                Value::Boolean(true, self.span_from(start))
            }
            TokenKind::False => {
                self.advance();
                Value::Boolean(false, self.span_from(start))
            }
            TokenKind::Null => {
                self.advance();
                Value::Null(self.span_from(start))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                while self.in_list(TokenKind::RBracket) {
                    values.push(self.parse_value(is_const));
                }
                self.expect(TokenKind::RBracket);
                Value::List(values, self.span_from(start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while self.in_list(TokenKind::RBrace) {
                    let field_start = self.current.span.start;
                    let name = self.parse_name();
                    self.expect(TokenKind::Colon);
                    let value = self.parse_value(is_const);
                    fields.push(ObjectField {
                        name,
                        value,
                        span: self.span_from(field_start),
                    });
                }
                self.expect(TokenKind::RBrace);
                Value::Object(fields, self.span_from(start))
            }
            kind if kind.is_name() => Value::Enum(self.parse_name()),
            _ => {
                let found = self.describe_current();
                self.error(&format!("Unexpected {found}."));
                Value::Null(self.current.span)
            }
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition<'a> {
        let start = self.current.span.start;

        if self.at_kind(TokenKind::LBrace) {
            let selection_set = self.parse_selection_set();
            return OperationDefinition {
                operation: OperationType::Query,
                name: None,
                variables: Vec::new(),
                directives: Vec::new(),
                selection_set,
                span: self.span_from(start),
            };
        }

        let operation = match self.at() {
            TokenKind::Mutation => OperationType::Mutation,
            TokenKind::Subscription => OperationType::Subscription,
            _ => OperationType::Query,
        };
        self.advance();

        let name = if self.at().is_name() {
            Some(self.parse_name())
        } else {
            None
        };

        let variables = self.parse_variable_definitions();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_variable_definitions(&mut self) -> Vec<VariableDefinition<'a>> {
        let mut vars = Vec::new();
        if !self.at_kind(TokenKind::LParen) {
            return vars;
        }
        self.advance();
        if self.at_kind(TokenKind::RParen) {
            self.error_expected("\"$\"");
        }
        while self.in_list(TokenKind::RParen) {
            vars.push(self.parse_variable_definition());
        }
        self.expect(TokenKind::RParen);
        vars
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition<'a> {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.at_kind(TokenKind::Eq) {
            self.advance();
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives(true);

        VariableDefinition {
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition<'a> {
        let start = self.current.span.start;
        self.advance(); // fragment

        if self.at_kind(TokenKind::On) {
            self.error("Unexpected Name \"on\".");
        }
        let name = self.parse_name();
        self.expect(TokenKind::On);
        let type_condition = self.parse_name();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet<'a> {
        let start = self.current.span.start;
        self.expect(TokenKind::LBrace);

        if self.at_kind(TokenKind::RBrace) {
            self.error_expected("Name");
        }

        let mut selections = Vec::new();
        while self.in_list(TokenKind::RBrace) {
            selections.push(self.parse_selection());
        }
        self.expect(TokenKind::RBrace);

        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    fn parse_selection(&mut self) -> Selection<'a> {
        if !self.at_kind(TokenKind::Spread) {
            return Selection::Field(self.parse_field_selection());
        }

        let start = self.current.span.start;
        self.advance(); // ...

        if self.at_kind(TokenKind::On) {
            self.advance();
            let type_condition = Some(self.parse_name());
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else if self.at_kind(TokenKind::LBrace) || self.at_kind(TokenKind::At) {
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else {
            let name = self.parse_name();
            let directives = self.parse_directives(false);
            Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: self.span_from(start),
            })
        }
    }

    fn parse_field_selection(&mut self) -> FieldSelection<'a> {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.at_kind(TokenKind::Colon) {
            self.advance();
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives(false);

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        FieldSelection {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_error(source: &str) -> GraphMessage {
        let interner = Interner::new();
        let result = parse(source, &interner);
        assert_eq!(result.messages.len(), 1, "expected exactly one error");
        result.messages.into_vec().remove(0)
    }

    #[test]
    fn test_parse_anonymous_query() {
        let interner = Interner::new();
        let result = parse("{ hero { name } }", &interner);
        assert!(result.is_ok());
        let op = result.document.operations().next().unwrap();
        assert_eq!(op.operation, OperationType::Query);
        assert!(op.name.is_none());
        assert_eq!(op.selection_set.selections.len(), 1);
    }

    #[test]
    fn test_parse_named_subscription_with_variables() {
        let interner = Interner::new();
        let source = "subscription OnReview($episode: Episode! = JEDI) { reviewAdded(episode: $episode) { stars } }";
        let result = parse(source, &interner);
        assert!(result.is_ok());

        let op = result.document.operations().next().unwrap();
        assert_eq!(op.operation, OperationType::Subscription);
        assert_eq!(interner.get(op.name.unwrap().value), "OnReview");
        assert_eq!(op.variables.len(), 1);
        assert!(matches!(op.variables[0].ty, Type::NonNull(..)));
        assert!(matches!(
            op.variables[0].default_value,
            Some(Value::Enum(_))
        ));
    }

    #[test]
    fn test_parse_alias_and_arguments() {
        let interner = Interner::new();
        let result = parse("{ a: field(x: 1, y: [1.5, \"s\"], z: {k: null}) }", &interner);
        assert!(result.is_ok());

        let op = result.document.operations().next().unwrap();
        let Selection::Field(field) = &op.selection_set.selections[0] else {
            panic!("expected field");
        };
        assert_eq!(interner.get(field.alias.unwrap().value), "a");
        assert_eq!(interner.get(field.name.value), "field");
        assert_eq!(field.arguments.len(), 3);
        assert!(matches!(field.arguments[0].value, Value::Int("1", _)));
    }

    #[test]
    fn test_parse_fragments() {
        let interner = Interner::new();
        let source = r"
            query { hero { ...HeroName ... on Droid { primaryFunction } ... @include(if: true) { id } } }
            fragment HeroName on Character { name }
        ";
        let result = parse(source, &interner);
        assert!(result.is_ok());
        assert_eq!(result.document.fragments().count(), 1);

        let op = result.document.operations().next().unwrap();
        let Selection::Field(hero) = &op.selection_set.selections[0] else {
            panic!("expected field");
        };
        let selections = &hero.selection_set.as_ref().unwrap().selections;
        assert!(matches!(selections[0], Selection::FragmentSpread(_)));
        assert!(matches!(
            &selections[1],
            Selection::InlineFragment(InlineFragment { type_condition: Some(_), .. })
        ));
        assert!(matches!(
            &selections[2],
            Selection::InlineFragment(InlineFragment { type_condition: None, .. })
        ));
    }

    #[test]
    fn test_keywords_are_valid_names() {
        let interner = Interner::new();
        let result = parse("query query { on fragment: type(null: true) }", &interner);
        assert!(result.is_ok());
    }

    #[test]
    fn test_syntax_error_has_location() {
        let error = first_error("{\n  hero {\n }\n}");
        assert_eq!(error.code, codes::SYNTAX_ERROR);
        assert_eq!(error.message, "Syntax Error: Expected Name, found \"}\".");
        let location = error.location.unwrap();
        assert_eq!((location.line, location.column), (3, 2));
    }

    #[test]
    fn test_empty_document_is_error() {
        let error = first_error("   ");
        assert_eq!(error.message, "Syntax Error: Unexpected <EOF>.");
    }

    #[test]
    fn test_only_first_error_is_reported() {
        let error = first_error("{ a( } } }");
        assert_eq!(error.code, codes::SYNTAX_ERROR);
    }

    #[test]
    fn test_variable_in_default_value_is_error() {
        let error = first_error("query ($a: Int = $b) { f }");
        assert!(error.message.starts_with("Syntax Error: Unexpected"));
    }
}
