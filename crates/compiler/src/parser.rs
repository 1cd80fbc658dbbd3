//! Pratt parser for Cedar
//!
//! The parser drives the lexer through a three-token lookahead window
//! (`current`, `next`, `after_next`) and builds the AST while doing the
//! declaration bookkeeping inline: identifiers are inserted into the
//! scope's symbol table the moment their declaration is parsed, and every
//! later mention is resolved against the scope stack on the spot.
//!
//! Expression parsing is precedence-climbing: each token kind maps to an
//! optional prefix handler, an optional infix handler, and a binding
//! level. A `can_assign` flag rides along so assignment targets are only
//! accepted at assignment level or below.

use crate::ast::{AstNode, NodeKind};
use crate::errors::{ErrorCode, Reporter};
use crate::lexer::Lexer;
use crate::symbol_table::{DeclarationState, ScopeStack, Symbol, SymbolTable};
use crate::token::{Token, TokenKind};
use crate::types::Type;
use crate::value::parse_i64;

const PREC_EOF: i8 = -1;
const PREC_NONE: i8 = 0;
const PREC_ASSIGNMENT: i8 = 1;
#[allow(dead_code)]
const PREC_TERNARY: i8 = 2;
const PREC_LOGICAL: i8 = 3;
const PREC_BITWISE: i8 = 4;
const PREC_TERM: i8 = 5;
const PREC_FACTOR: i8 = 6;
const PREC_UNARY: i8 = 7;
const PREC_PREFIX: i8 = 8;
const PREC_SUBSCRIPT: i8 = 9;

/// Infix binding level for a token kind. Kinds that never appear in
/// operator position sit at `PREC_NONE` so the Pratt loop skips them.
fn precedence(kind: TokenKind) -> i8 {
    match kind {
        TokenKind::Eof => PREC_EOF,

        TokenKind::Equality
        | TokenKind::LogicalNot
        | TokenKind::LogicalAnd
        | TokenKind::LogicalOr
        | TokenKind::LogicalNotEquals
        | TokenKind::LessThan
        | TokenKind::GreaterThan
        | TokenKind::LessThanEquals
        | TokenKind::GreaterThanEquals => PREC_LOGICAL,

        TokenKind::BitwiseNot
        | TokenKind::BitwiseAnd
        | TokenKind::BitwiseXor
        | TokenKind::BitwiseOr
        | TokenKind::BitwiseLeftShift
        | TokenKind::BitwiseRightShift => PREC_BITWISE,

        TokenKind::Plus | TokenKind::Minus => PREC_TERM,
        TokenKind::Asterisk | TokenKind::Divide | TokenKind::Modulo => PREC_FACTOR,

        TokenKind::PlusPlus | TokenKind::MinusMinus => PREC_PREFIX,
        TokenKind::LBracket => PREC_SUBSCRIPT,
        // A Period outside of member access position is always a stray;
        // routing it through the infix dispatch reports it cleanly.
        TokenKind::Period => PREC_SUBSCRIPT,

        _ => PREC_NONE,
    }
}

/// Fold statements into a right-linked chain. The final link is empty
/// and acts as the list terminator.
fn build_chain(statements: Vec<AstNode>) -> AstNode {
    let mut link = AstNode::new(NodeKind::Chain, Type::none());
    for statement in statements.into_iter().rev() {
        let mut fresh = AstNode::new(NodeKind::Chain, Type::none());
        fresh.left = Some(Box::new(statement));
        fresh.right = Some(Box::new(link));
        link = fresh;
    }
    link
}

/// Fold nodes into a list linked directly through `right` (used for call
/// arguments) or `left` (used for parameter lists).
fn link_through_right(nodes: Vec<AstNode>) -> Option<AstNode> {
    let mut head: Option<AstNode> = None;
    for mut node in nodes.into_iter().rev() {
        node.right = head.map(Box::new);
        head = Some(node);
    }
    head
}

fn link_through_left(nodes: Vec<AstNode>) -> Option<AstNode> {
    let mut head: Option<AstNode> = None;
    for mut node in nodes.into_iter().rev() {
        node.left = head.map(Box::new);
        head = Some(node);
    }
    head
}

pub struct Parser<'src, 'r> {
    lexer: Lexer<'src>,
    current: Token,
    next: Token,
    after_next: Token,
    scopes: ScopeStack,
    reporter: &'r mut Reporter,
}

impl<'src, 'r> Parser<'src, 'r> {
    pub fn new(source: &'src str, reporter: &'r mut Reporter) -> Self {
        let mut parser = Parser {
            lexer: Lexer::new(source),
            current: Token::default(),
            next: Token::default(),
            after_next: Token::default(),
            scopes: ScopeStack::new(),
            reporter,
        };
        // Two advances prime the window: `current` stays uninitialized,
        // `next` holds the first real token.
        parser.advance();
        parser.advance();
        parser
    }

    /// Parse the whole module. Returns the AST root and the module-scope
    /// symbol table; the first latched error stays in the reporter.
    pub fn build_ast(mut self) -> (AstNode, SymbolTable) {
        let mut statements = Vec::new();
        while !self.match_kind(TokenKind::Eof) {
            statements.push(self.statement());
        }

        let mut root = build_chain(statements);
        root.kind = NodeKind::Start;
        tracing::debug!(symbols = self.scopes.module().len(), "parse complete");
        (root, self.scopes.into_module())
    }

    // === Token window ===

    fn advance(&mut self) {
        self.current = std::mem::replace(
            &mut self.next,
            std::mem::replace(&mut self.after_next, self.lexer.scan_token()),
        );

        if self.next.kind == TokenKind::Error {
            let bad = self.next.clone();
            let message = format!("Lexer error: {}", bad.lexeme);
            self.error_at(ErrorCode::LexerError, &bad, &message);
        }
    }

    fn next_is(&self, kind: TokenKind) -> bool {
        self.next.kind == kind
    }

    fn after_next_is(&self, kind: TokenKind) -> bool {
        self.after_next.kind == kind
    }

    fn next_is_any_type(&self) -> bool {
        self.next.kind.is_type_keyword()
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if !self.next_is(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.next_is(kind) {
            self.advance();
            return;
        }

        let code = if kind == TokenKind::Semicolon {
            ErrorCode::MissingSemicolon
        } else {
            ErrorCode::Unexpected
        };
        let bad = self.next.clone();
        self.error_at(code, &bad, message);
    }

    fn consume_any_type(&mut self, message: &str) {
        if self.next_is_any_type() {
            self.advance();
            return;
        }
        let bad = self.next.clone();
        self.error_at(ErrorCode::Unexpected, &bad, message);
    }

    fn error_at(&mut self, code: ErrorCode, token: &Token, message: &str) {
        self.reporter.error_at(code, token, message);
    }

    // === Symbol helpers ===

    /// The symbol for a token, looking in the active table first and
    /// walking the enclosing scopes on a miss.
    fn resolve(&self, token: &Token) -> Option<Symbol> {
        if let Some(s) = self.scopes.current().retrieve(token) {
            return Some(s.clone());
        }
        self.scopes.exists_in_outer_scope(token).cloned()
    }

    // === Pratt machinery ===

    fn expression(&mut self) -> AstNode {
        self.parse_precedence(PREC_ASSIGNMENT)
    }

    fn parse_precedence(&mut self, level: i8) -> AstNode {
        self.advance();

        let can_assign = level <= PREC_ASSIGNMENT;
        let mut node = self.prefix(can_assign);

        while level <= precedence(self.next.kind) {
            self.advance();
            let mut infix_node = self.infix();
            infix_node.left = Some(Box::new(node));
            node = infix_node;
        }

        node
    }

    fn prefix(&mut self, can_assign: bool) -> AstNode {
        match self.current.kind {
            // Struct is both a definition keyword and a type keyword;
            // in prefix position it always opens a definition.
            TokenKind::Enum => self.enum_declaration(),
            TokenKind::Struct => self.struct_declaration(),
            kind if kind.is_type_keyword() => self.type_declaration(),

            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Print => self.print_call(),

            TokenKind::Identifier => self.identifier(can_assign),
            kind if kind.is_literal() => self.literal(),

            TokenKind::LParen => self.parens(),

            TokenKind::Minus
            | TokenKind::LogicalNot
            | TokenKind::BitwiseNot
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => self.unary(),

            _ => {
                let bad = self.current.clone();
                let message = format!("Unexpected token '{}'", bad.lexeme);
                self.error_at(ErrorCode::Unexpected, &bad, &message);
                AstNode::new(NodeKind::Untyped, Type::none())
            }
        }
    }

    fn infix(&mut self) -> AstNode {
        match self.current.kind {
            TokenKind::LBracket => self.subscript_expression(),

            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Divide
            | TokenKind::Modulo
            | TokenKind::Equality
            | TokenKind::LogicalAnd
            | TokenKind::LogicalOr
            | TokenKind::LogicalNotEquals
            | TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::LessThanEquals
            | TokenKind::GreaterThanEquals
            | TokenKind::BitwiseAnd
            | TokenKind::BitwiseXor
            | TokenKind::BitwiseOr
            | TokenKind::BitwiseLeftShift
            | TokenKind::BitwiseRightShift => self.binary(),

            _ => {
                let bad = self.current.clone();
                let message = format!("Unexpected token '{}'", bad.lexeme);
                self.error_at(ErrorCode::Unexpected, &bad, &message);
                AstNode::new(NodeKind::Untyped, Type::none())
            }
        }
    }

    // === Statements ===

    fn statement(&mut self) -> AstNode {
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }

        let expr = self.expression();

        // The semicolon is optional after type-defining constructs.
        if expr.data_type.is_enum() || expr.data_type.is_struct() || expr.data_type.is_function() {
            self.match_kind(TokenKind::Semicolon);
        } else {
            let message = format!(
                "A ';' is expected after an expression statement, got '{}' instead",
                self.next.kind
            );
            self.consume(TokenKind::Semicolon, &message);
        }

        expr
    }

    fn if_statement(&mut self) -> AstNode {
        self.consume(TokenKind::LParen, "Expected '(' after IF");
        let condition = self.expression();
        self.consume(TokenKind::RParen, "Expected ')' after IF condition");
        self.consume(TokenKind::LCurly, "Expected '{' to open IF body");

        self.scopes.begin();
        let then_body = self.block();

        let else_body = if self.match_kind(TokenKind::Else) {
            if self.match_kind(TokenKind::If) {
                Some(self.if_statement())
            } else {
                self.consume(TokenKind::LCurly, "Expected '{' after ELSE");
                Some(self.block())
            }
        } else {
            None
        };
        self.scopes.end();

        let mut node = AstNode::new(NodeKind::If, Type::none())
            .with_left(condition)
            .with_middle(then_body);
        node.right = else_body.map(Box::new);
        node
    }

    fn ternary_if(&mut self, condition: AstNode) -> AstNode {
        self.consume(TokenKind::QuestionMark, "Expected '?' after ternary condition");
        let if_true = self.expression();
        self.consume(TokenKind::Colon, "Expected ':' in ternary expression");
        let if_false = self.expression();

        AstNode::new(NodeKind::TernaryIf, Type::none())
            .with_left(condition)
            .with_middle(if_true)
            .with_right(if_false)
    }

    fn while_statement(&mut self) -> AstNode {
        let condition = self.expression();
        self.consume(TokenKind::LCurly, "Expected '{' after WHILE condition");

        self.scopes.begin();
        let body = self.block();
        self.scopes.end();
        self.match_kind(TokenKind::Semicolon);

        AstNode::new(NodeKind::While, Type::none())
            .with_left(condition)
            .with_right(body)
    }

    fn for_statement(&mut self) -> AstNode {
        self.consume(TokenKind::LParen, "Expected '(' after FOR");

        let initialization = self.statement();
        let condition = self.statement();
        let after_each = self.expression();

        self.consume(TokenKind::RParen, "Expected ')' after FOR clauses");
        self.consume(TokenKind::LCurly, "Expected '{' to open FOR body");

        self.scopes.begin();
        let mut statements = self.block_statements();
        self.scopes.end();

        // The afterthought runs as the last statement of every pass.
        statements.push(after_each);
        let body = build_chain(statements);

        let while_node = AstNode::new(NodeKind::While, Type::none())
            .with_left(condition)
            .with_right(body);

        AstNode::new(NodeKind::For, Type::none())
            .with_left(initialization)
            .with_right(while_node)
    }

    fn block(&mut self) -> AstNode {
        build_chain(self.block_statements())
    }

    fn block_statements(&mut self) -> Vec<AstNode> {
        let mut statements = Vec::new();
        while !self.next_is(TokenKind::RCurly) && !self.next_is(TokenKind::Eof) {
            statements.push(self.statement());
        }
        let message = format!("Expected '}}' after block, got '{}' instead", self.next.kind);
        self.consume(TokenKind::RCurly, &message);
        statements
    }

    fn break_statement(&mut self) -> AstNode {
        if !self.next_is(TokenKind::Semicolon) {
            let bad = self.next.clone();
            let message = format!("Expected ';' after BREAK, got '{}' instead", bad.kind);
            self.error_at(ErrorCode::Unexpected, &bad, &message);
        }
        AstNode::new(NodeKind::Break, Type::none())
    }

    fn continue_statement(&mut self) -> AstNode {
        if !self.next_is(TokenKind::Semicolon) {
            let bad = self.next.clone();
            let message = format!("Expected ';' after CONTINUE, got '{}' instead", bad.kind);
            self.error_at(ErrorCode::Unexpected, &bad, &message);
        }
        AstNode::new(NodeKind::Continue, Type::none())
    }

    fn return_statement(&mut self) -> AstNode {
        if self.next_is(TokenKind::Semicolon) {
            return AstNode::new(NodeKind::Return, Type::from_token_kind(TokenKind::Void));
        }

        let expr = self.expression();
        let ty = expr.data_type.clone();
        AstNode::new(NodeKind::Return, ty).with_left(expr)
    }

    fn print_call(&mut self) -> AstNode {
        self.consume(TokenKind::LParen, "Expected '(' after PRINT");
        let expr = self.expression();
        self.consume(TokenKind::RParen, "Expected ')' after PRINT argument");
        AstNode::new(NodeKind::PrintCall, Type::none()).with_left(expr)
    }

    // === Declarations ===

    /// Type-prefixed variable declaration: `<type>[[N]] <identifier> ...`.
    /// Inserts the identifier as `declared` and hands off to
    /// `identifier()` for the rest of the statement.
    fn type_declaration(&mut self) -> AstNode {
        let type_token = self.current.clone();
        let mut is_array = false;
        let mut array_size: usize = 0;

        if self.match_kind(TokenKind::LBracket) {
            if self.match_kind(TokenKind::IntLiteral) {
                match parse_i64(&self.current.lexeme, 10) {
                    Some(n) if n >= 0 => array_size = n as usize,
                    _ => {
                        let bad = self.current.clone();
                        self.error_at(ErrorCode::Overflow, &bad, "Array size does not fit");
                    }
                }
            } else {
                let bad = self.next.clone();
                self.error_at(
                    ErrorCode::MissingSize,
                    &bad,
                    "Expected a size in the array declaration",
                );
            }

            let message = format!(
                "Expected ']' after '{}', got '{}' instead",
                self.current.lexeme, self.next.kind
            );
            self.consume(TokenKind::RBracket, &message);
            is_array = true;
        }

        if self.next_is(TokenKind::Identifier) {
            if type_token.kind == TokenKind::Void {
                let bad = self.next.clone();
                self.error_at(
                    ErrorCode::ImproperDeclaration,
                    &bad,
                    "Cannot use VOID as a variable type",
                );
            }

            let existing_line = self
                .scopes
                .current()
                .retrieve(&self.next)
                .map(|s| s.declared_on_line);
            if let Some(declared_on) = existing_line {
                let bad = self.next.clone();
                let message = format!(
                    "Redeclaration of identifier '{}', previously declared on line {}",
                    bad.lexeme, declared_on
                );
                self.error_at(ErrorCode::Redeclared, &bad, &message);
            }

            if self.after_next_is(TokenKind::LParen) {
                let bad = self.current.clone();
                self.error_at(
                    ErrorCode::ImproperDeclaration,
                    &bad,
                    "Function declarations cannot be preceded by a type",
                );
            }

            let ty = if is_array {
                Type::array_of(type_token.kind, array_size)
            } else {
                Type::from_token_kind(type_token.kind)
            };
            self.scopes
                .current_mut()
                .add(Symbol::new(self.next.clone(), ty, DeclarationState::Declared));
        }

        let message = format!(
            "Expected IDENTIFIER after type '{}{}', got '{}' instead",
            type_token.kind,
            if is_array { "[]" } else { "" },
            self.next.kind
        );
        self.consume(TokenKind::Identifier, &message);

        self.identifier(true)
    }

    /// The workhorse: everything that starts at an identifier. Depending
    /// on what follows, this is a function declaration, a function call,
    /// an assignment, a terse assignment, a postfix increment, a struct
    /// field access, or a plain mention.
    fn identifier(&mut self, can_assign: bool) -> AstNode {
        let identifier_token = self.current.clone();
        let mut symbol = self.scopes.current().retrieve(&identifier_token).cloned();

        if self.match_kind(TokenKind::LParen) {
            let looks_like_declaration = self.next_is_any_type()
                || (self.next_is(TokenKind::RParen) && self.after_next_is(TokenKind::ColonSeparator));

            if looks_like_declaration {
                if let Some(existing) = &symbol {
                    if existing.declaration_state != DeclarationState::Declared {
                        let declared_on = existing.declared_on_line;
                        let message = format!(
                            "Function '{}' has been redeclared, original declaration on line {}",
                            identifier_token.lexeme, declared_on
                        );
                        self.error_at(ErrorCode::Redeclared, &identifier_token, &message);
                    }
                }

                if symbol.is_none() {
                    self.scopes.current_mut().add(Symbol::new(
                        identifier_token.clone(),
                        Type::function(TokenKind::Void),
                        DeclarationState::Uninitialized,
                    ));
                }
                let fresh = self
                    .scopes
                    .current()
                    .retrieve(&identifier_token)
                    .cloned()
                    .unwrap_or_default();
                return self.function_declaration(fresh);
            }

            match &symbol {
                None => {
                    self.error_at(
                        ErrorCode::Undeclared,
                        &identifier_token,
                        "Undeclared function",
                    );
                }
                Some(s) if s.declaration_state != DeclarationState::Defined => {
                    self.error_at(
                        ErrorCode::Undefined,
                        &identifier_token,
                        "Can't call an undefined function",
                    );
                }
                _ => {}
            }
            return self.function_call(identifier_token);
        }

        if symbol.is_none() {
            match self.scopes.exists_in_outer_scope(&identifier_token).cloned() {
                Some(s) => symbol = Some(s),
                None => {
                    let message = format!("Undeclared identifier '{}'", identifier_token.lexeme);
                    self.error_at(ErrorCode::Undeclared, &identifier_token, &message);
                }
            }
        }
        let symbol = symbol.unwrap_or_default();

        let mut array_index = None;
        if self.match_kind(TokenKind::LBracket) {
            array_index = self.array_subscript();
        }

        if self.match_kind(TokenKind::PlusPlus) {
            if symbol.declaration_state != DeclarationState::Defined {
                let message = format!(
                    "Cannot increment undefined variable '{}'",
                    identifier_token.lexeme
                );
                self.error_at(ErrorCode::Undefined, &identifier_token, &message);
            }
            return AstNode::from_token(
                NodeKind::PostfixIncrement,
                identifier_token,
                symbol.ty().clone(),
            );
        }

        if self.match_kind(TokenKind::MinusMinus) {
            if symbol.declaration_state != DeclarationState::Defined {
                let message = format!(
                    "Cannot decrement undefined variable '{}'",
                    identifier_token.lexeme
                );
                self.error_at(ErrorCode::Undefined, &identifier_token, &message);
            }
            return AstNode::from_token(
                NodeKind::PostfixDecrement,
                identifier_token,
                symbol.ty().clone(),
            );
        }

        if self.match_kind(TokenKind::Equals) {
            return self.assignment(identifier_token, symbol, array_index, can_assign);
        }

        if self.next.kind.is_terse_assignment() {
            self.advance();
            if symbol.declaration_state != DeclarationState::Defined {
                let message = format!(
                    "Cannot perform a terse assignment on undefined variable '{}'",
                    identifier_token.lexeme
                );
                self.error_at(ErrorCode::Undefined, &identifier_token, &message);
            }

            let mut terse = self.terse_assignment();
            terse.left = Some(Box::new(AstNode::from_symbol(NodeKind::Identifier, &symbol)));
            return terse;
        }

        if symbol.ty().is_struct() && self.match_kind(TokenKind::Period) {
            return self.struct_field(identifier_token);
        }

        // Reload: an assignment elsewhere in this statement may have
        // promoted the symbol since the clone above.
        let stored = self
            .scopes
            .current()
            .retrieve(&identifier_token)
            .cloned()
            .unwrap_or(symbol);

        // Catches shapes like `i64 i + 1;`.
        if stored.declaration_state == DeclarationState::Declared
            && !self.next_is(TokenKind::Semicolon)
        {
            let bad = self.next.clone();
            self.error_at(ErrorCode::ImproperDeclaration, &bad, "Improper declaration");
        }

        let kind = if stored.declaration_state == DeclarationState::Declared {
            NodeKind::Declaration
        } else {
            NodeKind::Identifier
        };
        let mut node = AstNode::from_token(kind, identifier_token, stored.ty().clone());
        node.middle = array_index.map(Box::new);
        node
    }

    fn assignment(
        &mut self,
        identifier_token: Token,
        symbol: Symbol,
        array_index: Option<AstNode>,
        can_assign: bool,
    ) -> AstNode {
        if !can_assign {
            let message = format!("Cannot assign to identifier '{}'", identifier_token.lexeme);
            self.error_at(ErrorCode::ImproperAssignment, &identifier_token, &message);
        }

        // Whole-array assignment takes an initializer list; individual
        // slots assign like scalars through the subscript.
        if symbol.ty().is_array() && !symbol.ty().is_string() && array_index.is_none() {
            if self.match_kind(TokenKind::LCurly) {
                let list = self.initializer_list(symbol.ty().clone());
                let mut defined = Symbol::new(
                    identifier_token.clone(),
                    symbol.ty().clone(),
                    DeclarationState::Defined,
                );
                defined.value = symbol.value.clone();
                let stored = self.scopes.current_mut().add(defined);

                let mut node = AstNode::from_symbol(NodeKind::Assignment, &stored).with_left(list);
                node.middle = array_index.map(Box::new);
                return node;
            }

            self.error_at(
                ErrorCode::ImproperAssignment,
                &identifier_token,
                "Arrays are assigned with an initializer list",
            );
        }

        let stored = self.scopes.current_mut().add(Symbol::new(
            identifier_token,
            symbol.ty().clone(),
            DeclarationState::Defined,
        ));
        let rhs = self.expression();

        let mut node = AstNode::from_symbol(NodeKind::Assignment, &stored).with_left(rhs);
        node.middle = array_index.map(Box::new);
        node
    }

    fn initializer_list(&mut self, expected: Type) -> AstNode {
        let mut elements = Vec::new();
        while !self.next_is(TokenKind::RCurly) && !self.next_is(TokenKind::Eof) {
            elements.push(self.expression());
            self.match_kind(TokenKind::Comma);
        }
        self.consume(TokenKind::RCurly, "Expected '}' after initializer list");

        if elements.is_empty() {
            let bad = self.current.clone();
            self.error_at(
                ErrorCode::ImproperAssignment,
                &bad,
                "Initializer list cannot be empty",
            );
        }

        let mut node = build_chain(elements);
        node.kind = NodeKind::InitializerList;
        node.data_type = expected;
        node
    }

    // === Expressions ===

    fn literal(&mut self) -> AstNode {
        AstNode::from_token(
            NodeKind::Literal,
            self.current.clone(),
            Type::from_token_kind(self.current.kind),
        )
    }

    fn parens(&mut self) -> AstNode {
        let expr = self.expression();
        self.consume(TokenKind::RParen, "Missing ')' after expression");

        if self.next_is(TokenKind::QuestionMark) {
            return self.ternary_if(expr);
        }
        expr
    }

    fn unary(&mut self) -> AstNode {
        if self.next_is_any_type() {
            let bad = self.next.clone();
            self.error_at(
                ErrorCode::ImproperDeclaration,
                &bad,
                "Can't declare a variable in the middle of an expression",
            );
        }

        let operator = self.current.clone();
        let token_after = self.next.clone();
        let operand = self.parse_precedence(PREC_UNARY);

        match operator.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let verb = if operator.kind == TokenKind::PlusPlus {
                    "increment"
                } else {
                    "decrement"
                };

                if token_after.kind != TokenKind::Identifier {
                    let message = format!(
                        "Expected IDENTIFIER after '{}', got '{}' instead",
                        operator.lexeme, token_after.kind
                    );
                    self.error_at(ErrorCode::Unexpected, &token_after, &message);
                } else if !matches!(
                    self.resolve(&token_after),
                    Some(s) if s.declaration_state == DeclarationState::Defined
                ) {
                    let message =
                        format!("Can't {} undefined variable '{}'", verb, token_after.lexeme);
                    self.error_at(ErrorCode::Undefined, &token_after, &message);
                }

                let kind = if operator.kind == TokenKind::PlusPlus {
                    NodeKind::PrefixIncrement
                } else {
                    NodeKind::PrefixDecrement
                };
                AstNode::from_token(kind, operator, Type::none()).with_left(operand)
            }
            TokenKind::LogicalNot | TokenKind::BitwiseNot | TokenKind::Minus => {
                AstNode::from_token(NodeKind::UnaryOp, operator, Type::none()).with_left(operand)
            }
            _ => {
                let message = format!("Unknown unary operator '{}'", operator.lexeme);
                self.error_at(ErrorCode::Pebcak, &operator, &message);
                AstNode::new(NodeKind::Untyped, Type::none())
            }
        }
    }

    fn binary(&mut self) -> AstNode {
        let operator = self.current.clone();

        if self.next_is_any_type() {
            let bad = self.next.clone();
            self.error_at(
                ErrorCode::ImproperDeclaration,
                &bad,
                "Can't declare a variable in the middle of an expression",
            );
        }

        let rhs = self.parse_precedence(precedence(operator.kind) + 1);

        let (kind, ty) = match operator.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Divide
            | TokenKind::Modulo => (NodeKind::BinaryArithmetic, Type::none()),

            TokenKind::Equality
            | TokenKind::LogicalAnd
            | TokenKind::LogicalOr
            | TokenKind::LogicalNotEquals
            | TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::LessThanEquals
            | TokenKind::GreaterThanEquals => {
                (NodeKind::BinaryLogical, Type::from_token_kind(TokenKind::Bool))
            }

            TokenKind::BitwiseXor
            | TokenKind::BitwiseAnd
            | TokenKind::BitwiseOr
            | TokenKind::BitwiseLeftShift
            | TokenKind::BitwiseRightShift => (NodeKind::BinaryBitwise, Type::none()),

            _ => {
                let message = format!("Unknown binary operator '{}'", operator.lexeme);
                self.error_at(ErrorCode::Pebcak, &operator, &message);
                (NodeKind::Untyped, Type::none())
            }
        };

        AstNode::from_token(kind, operator, ty).with_right(rhs)
    }

    fn terse_assignment(&mut self) -> AstNode {
        let operator = self.current.clone();
        let rhs = self.parse_precedence(precedence(operator.kind) + 1);

        if !operator.kind.is_terse_assignment() {
            let message = format!("Unknown terse assignment operator '{}'", operator.lexeme);
            self.error_at(ErrorCode::Pebcak, &operator, &message);
            return AstNode::new(NodeKind::Untyped, Type::none());
        }

        AstNode::from_token(NodeKind::TerseAssignment, operator, Type::none()).with_right(rhs)
    }

    /// Subscript in expression position, e.g. after a parenthesized
    /// expression. The common case goes through `identifier()` instead.
    fn subscript_expression(&mut self) -> AstNode {
        let mut node = AstNode::new(NodeKind::ArraySubscript, Type::none());
        if let Some(index) = self.array_subscript() {
            node.middle = Some(Box::new(index));
        }
        node
    }

    /// The `[i]` part of a subscripted access. The opening bracket has
    /// already been consumed. Indices are integer literals or defined
    /// identifiers.
    fn array_subscript(&mut self) -> Option<AstNode> {
        let mut node = None;

        if self.match_kind(TokenKind::Identifier) {
            let index_token = self.current.clone();
            match self.resolve(&index_token) {
                None => {
                    let message = format!(
                        "Can't access array with undeclared identifier '{}'",
                        index_token.lexeme
                    );
                    self.error_at(ErrorCode::Undeclared, &index_token, &message);
                }
                Some(s) if s.declaration_state != DeclarationState::Defined => {
                    let message = format!(
                        "Can't access array with uninitialized identifier '{}'",
                        index_token.lexeme
                    );
                    self.error_at(ErrorCode::Uninitialized, &index_token, &message);
                }
                Some(s) => {
                    node = Some(AstNode::from_token(
                        NodeKind::ArraySubscript,
                        index_token,
                        s.ty().clone(),
                    ));
                }
            }
        } else if self.match_kind(TokenKind::IntLiteral) {
            node = Some(AstNode::from_token(
                NodeKind::ArraySubscript,
                self.current.clone(),
                Type::from_token_kind(TokenKind::IntLiteral),
            ));
        }

        self.consume(TokenKind::RBracket, "Expected ']' after array subscript");
        node
    }

    // === Enums ===

    fn enum_declaration(&mut self) -> AstNode {
        self.consume(TokenKind::Identifier, "Expected IDENTIFIER after 'enum'");
        let enum_token = self.current.clone();

        let existing = self
            .scopes
            .current()
            .retrieve(&enum_token)
            .filter(|s| s.declaration_state == DeclarationState::Defined)
            .map(|s| s.declared_on_line);
        if let Some(declared_on) = existing {
            let message = format!(
                "Redeclaration of enum '{}', original declaration on line {}",
                enum_token.lexeme, declared_on
            );
            self.error_at(ErrorCode::Redeclared, &enum_token, &message);
        }

        self.scopes.current_mut().add(Symbol::new(
            enum_token.clone(),
            Type::from_token_kind(TokenKind::Enum),
            DeclarationState::Uninitialized,
        ));

        let entries = self.enum_block(&enum_token);

        self.scopes.current_mut().add(Symbol::new(
            enum_token.clone(),
            Type::from_token_kind(TokenKind::Enum),
            DeclarationState::Defined,
        ));

        let mut node = AstNode::from_token(
            NodeKind::EnumIdentifier,
            enum_token,
            Type::from_token_kind(TokenKind::Enum),
        );
        node.left = entries.map(Box::new);
        node
    }

    fn enum_block(&mut self, enum_token: &Token) -> Option<AstNode> {
        self.consume(TokenKind::LCurly, "Expected '{' after enum declaration");

        let mut entries = Vec::new();
        while !self.next_is(TokenKind::RCurly) && !self.next_is(TokenKind::Eof) {
            let existing_line = self
                .scopes
                .current()
                .retrieve(&self.next)
                .map(|s| s.declared_on_line);
            if let Some(declared_on) = existing_line {
                let bad = self.next.clone();
                let message = format!(
                    "Enum identifier '{}' already exists, declared on line {}",
                    bad.lexeme, declared_on
                );
                self.error_at(ErrorCode::Redeclared, &bad, &message);
            }

            self.consume(TokenKind::Identifier, "Expected IDENTIFIER in enum body");
            let entry_token = self.current.clone();

            // Entries land in the enclosing table so uses of the constant
            // resolve without naming the enum.
            self.scopes.current_mut().add(Symbol::new(
                entry_token.clone(),
                Type::from_token_kind(TokenKind::EnumLiteral),
                DeclarationState::Defined,
            ));

            entries.push(self.enum_entry(entry_token));
            self.match_kind(TokenKind::Comma);
        }

        self.consume(TokenKind::RCurly, "Expected '}' after enum body");

        if entries.is_empty() {
            self.error_at(
                ErrorCode::EmptyBody,
                enum_token,
                "Enum body cannot be empty",
            );
            return None;
        }

        Some(build_chain(entries))
    }

    fn enum_entry(&mut self, entry_token: Token) -> AstNode {
        if self.match_kind(TokenKind::Equals) {
            let expr = self.expression();
            return AstNode::from_token(
                NodeKind::EnumAssignment,
                entry_token,
                Type::from_token_kind(TokenKind::EnumLiteral),
            )
            .with_left(expr);
        }

        AstNode::from_token(
            NodeKind::EnumEntry,
            entry_token,
            Type::from_token_kind(TokenKind::EnumLiteral),
        )
    }

    // === Structs ===

    fn struct_declaration(&mut self) -> AstNode {
        self.consume(TokenKind::Identifier, "Expected IDENTIFIER after 'struct'");
        let struct_token = self.current.clone();

        let existing_line = self
            .scopes
            .current()
            .retrieve(&struct_token)
            .map(|s| s.declared_on_line);
        if let Some(declared_on) = existing_line {
            let message = format!(
                "Struct '{}' is already declared, on line {}",
                struct_token.lexeme, declared_on
            );
            self.error_at(ErrorCode::Redeclared, &struct_token, &message);
        }

        self.scopes.current_mut().add(Symbol::new(
            struct_token.clone(),
            Type::from_token_kind(TokenKind::Struct),
            DeclarationState::Declared,
        ));

        // Fields get their own namespace while the body parses.
        self.scopes.push_shadow(SymbolTable::new());

        self.consume(TokenKind::LCurly, "Expected '{' after struct declaration");

        let mut fields = Vec::new();
        while !self.next_is(TokenKind::RCurly) && !self.next_is(TokenKind::Eof) {
            fields.push(self.statement());
        }

        self.consume(TokenKind::RCurly, "Expected '}' after struct body");

        let fields_table = self.scopes.take_shadow();

        if fields.is_empty() {
            let message = format!("Struct '{}' has empty body", struct_token.lexeme);
            self.error_at(ErrorCode::EmptyBody, &struct_token, &message);
        }

        let mut ty = Type::from_token_kind(TokenKind::Struct);
        for field in fields_table.iter() {
            ty.add_member(field.token.clone(), field.ty().clone());
        }

        let mut symbol = Symbol::new(struct_token.clone(), ty.clone(), DeclarationState::Defined);
        symbol.fields = fields_table;
        self.scopes.current_mut().add(symbol);

        AstNode::from_token(NodeKind::StructDeclaration, struct_token, ty)
            .with_left(build_chain(fields))
    }

    /// Member access `A.f`, with optional subscript and assignment. The
    /// struct's field table shadows everything while the member parses.
    fn struct_field(&mut self, struct_token: Token) -> AstNode {
        let struct_symbol = self.resolve(&struct_token).unwrap_or_default();
        if struct_symbol.declaration_state != DeclarationState::Defined {
            let bad = self.next.clone();
            self.error_at(
                ErrorCode::Undefined,
                &bad,
                "Can't use a field from an undefined struct",
            );
        }

        self.scopes.push_shadow(struct_symbol.fields.clone());

        self.consume(TokenKind::Identifier, "Expected a field name after '.'");
        let field_token = self.current.clone();

        if !self.scopes.current().contains(&field_token) {
            let message = format!(
                "Struct '{}' has no field '{}'",
                struct_token.lexeme, field_token.lexeme
            );
            self.error_at(ErrorCode::Undefined, &field_token, &message);
        }

        let mut array_index = None;
        if self.match_kind(TokenKind::LBracket) {
            array_index = self.array_subscript();
        }

        let mut expr = None;
        if self.match_kind(TokenKind::Equals) {
            expr = Some(self.expression());
            self.scopes
                .current_mut()
                .set_declaration_state(&field_token, DeclarationState::Defined);
        }

        let field_symbol = self
            .scopes
            .current()
            .retrieve(&field_token)
            .cloned()
            .unwrap_or_default();
        if field_symbol.declaration_state != DeclarationState::Defined {
            let message = format!("Field '{}' has not been defined", field_token.lexeme);
            self.error_at(ErrorCode::Undefined, &field_token, &message);
        }

        let fields_table = self.scopes.take_shadow();
        if let Some(owner) = self.scopes.resolve_mut(&struct_token) {
            owner.fields = fields_table;
        }

        let mut node = AstNode::from_token(
            NodeKind::StructMemberIdentifier,
            field_token,
            field_symbol.ty().clone(),
        );
        node.left = expr.map(Box::new);
        node.middle = array_index.map(Box::new);
        node.right = Some(Box::new(AstNode::from_token(
            NodeKind::StructIdentifier,
            struct_token,
            struct_symbol.ty().clone(),
        )));
        node
    }

    // === Functions ===

    fn function_declaration(&mut self, symbol: Symbol) -> AstNode {
        if self.scopes.depth() != 0 {
            self.error_at(
                ErrorCode::ImproperDeclaration,
                &symbol.token.clone(),
                "Functions must be declared in module scope",
            );
        }

        let mut params_table = SymbolTable::new();
        let mut param_members = Vec::new();
        let params_node = self.function_params(&mut params_table, &mut param_members);
        let return_type_node = self.function_return_type();
        let return_kind = return_type_node.token.kind;
        let body = self.function_body(params_table);

        if symbol.declaration_state == DeclarationState::Declared && body.is_none() {
            let declared_on = symbol.declared_on_line;
            let message = format!(
                "Redeclaration of function '{}' (declared on line {})",
                symbol.token.lexeme, declared_on
            );
            self.error_at(ErrorCode::Redeclared, &symbol.token.clone(), &message);
        }

        let ty = if symbol.declaration_state == DeclarationState::Declared {
            // A prior forward declaration already fixed the signature.
            symbol.ty().clone()
        } else {
            let mut ty = Type::function(return_kind);
            for (token, param_ty) in &param_members {
                ty.add_param(token.clone(), param_ty.clone());
            }
            ty
        };

        let state = if body.is_none() {
            DeclarationState::Declared
        } else {
            DeclarationState::Defined
        };
        let stored = self
            .scopes
            .current_mut()
            .add(Symbol::new(symbol.token.clone(), ty, state));

        let kind = if body.is_none() {
            NodeKind::Declaration
        } else {
            NodeKind::Function
        };
        let mut node = AstNode::from_symbol(kind, &stored).with_left(return_type_node);
        node.middle = params_node.map(Box::new);
        node.right = body.map(Box::new);
        node
    }

    fn function_params(
        &mut self,
        table: &mut SymbolTable,
        members: &mut Vec<(Token, Type)>,
    ) -> Option<AstNode> {
        let mut param_nodes = Vec::new();

        while !self.next_is(TokenKind::RParen) && !self.next_is(TokenKind::Eof) {
            let message = format!("Expected a type, got '{}' instead", self.next.kind);
            self.consume_any_type(&message);
            let type_token = self.current.clone();

            if type_token.kind == TokenKind::Void {
                self.error_at(
                    ErrorCode::ImproperDeclaration,
                    &type_token,
                    "Cannot declare a function parameter VOID",
                );
            }

            let mut is_array = false;
            if self.match_kind(TokenKind::LBracket) {
                self.consume(TokenKind::RBracket, "Expected ']' after '['");
                is_array = true;
            }

            let message = format!(
                "Expected a parameter name, got '{}' instead",
                self.next.kind
            );
            self.consume(TokenKind::Identifier, &message);
            let param_token = self.current.clone();

            if table.contains(&param_token) {
                let message = format!("Duplicate parameter name '{}'", param_token.lexeme);
                self.error_at(ErrorCode::Redeclared, &param_token, &message);
            }

            let ty = if is_array {
                Type::array_of(type_token.kind, 0)
            } else {
                Type::from_token_kind(type_token.kind)
            };

            table.add(Symbol::new(
                param_token.clone(),
                ty.clone(),
                DeclarationState::Defined,
            ));
            members.push((param_token.clone(), ty.clone()));
            param_nodes.push(AstNode::from_token(NodeKind::FunctionParam, param_token, ty));

            self.match_kind(TokenKind::Comma);
        }

        link_through_left(param_nodes)
    }

    fn function_return_type(&mut self) -> AstNode {
        self.consume(TokenKind::RParen, "')' required after parameter list");
        self.consume(TokenKind::ColonSeparator, "'::' required after ')'");
        self.consume_any_type("Expected a return type after '::'");

        let return_token = self.current.clone();
        let ty = Type::from_token_kind(return_token.kind);
        AstNode::from_token(NodeKind::FunctionReturnType, return_token, ty)
    }

    fn function_body(&mut self, params_table: SymbolTable) -> Option<AstNode> {
        // A bare semicolon means forward declaration.
        if self.next_is(TokenKind::Semicolon) {
            return None;
        }

        self.consume(TokenKind::LCurly, "Expected '{' to begin function body");

        self.scopes.begin();
        self.scopes.push_shadow(params_table);

        let mut statements = Vec::new();
        while !self.next_is(TokenKind::RCurly) && !self.next_is(TokenKind::Eof) {
            statements.push(self.statement());
        }

        self.consume(TokenKind::RCurly, "Expected '}' after function body");

        self.scopes.take_shadow();
        self.scopes.end();

        if statements.is_empty() {
            // An empty body returns void implicitly.
            statements.push(AstNode::new(
                NodeKind::Return,
                Type::from_token_kind(TokenKind::Void),
            ));
        }

        let mut body = build_chain(statements);
        body.kind = NodeKind::FunctionBody;
        Some(body)
    }

    fn function_call(&mut self, function_token: Token) -> AstNode {
        let mut args = Vec::new();

        while !self.next_is(TokenKind::RParen) && !self.next_is(TokenKind::Eof) {
            if self.next_is(TokenKind::Identifier) {
                self.advance();
                let arg_token = self.current.clone();
                let arg_symbol = self.resolve(&arg_token).unwrap_or_default();

                if self.match_kind(TokenKind::LParen) {
                    args.push(self.function_call(arg_token));
                } else {
                    args.push(AstNode::from_token(
                        NodeKind::FunctionArgument,
                        arg_token,
                        arg_symbol.ty().clone(),
                    ));
                }
            } else if self.next.kind.is_literal() {
                self.advance();
                let literal_token = self.current.clone();
                let ty = Type::from_token_kind(literal_token.kind);
                args.push(AstNode::from_token(
                    NodeKind::FunctionArgument,
                    literal_token,
                    ty,
                ));
            } else {
                let bad = self.next.clone();
                let message = format!("Expected an argument, got '{}' instead", bad.kind);
                self.error_at(ErrorCode::Unexpected, &bad, &message);
                self.advance();
            }

            if self.match_kind(TokenKind::Comma) && self.next_is(TokenKind::RParen) {
                break;
            }
        }

        self.consume(TokenKind::RParen, "Expected ')' after call arguments");

        let fn_type = self
            .resolve(&function_token)
            .map(|s| s.ty().clone())
            .unwrap_or_default();

        let mut node = AstNode::from_token(NodeKind::FunctionCall, function_token, fn_type);
        node.middle = link_through_right(args).map(Box::new);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Reporter;

    fn parse(source: &str) -> (AstNode, SymbolTable, ErrorCode) {
        let mut reporter = Reporter::new("test.txt", source).quiet();
        let parser = Parser::new(source, &mut reporter);
        let (ast, symbols) = parser.build_ast();
        (ast, symbols, reporter.latched())
    }

    fn first_statement(ast: &AstNode) -> &AstNode {
        ast.chain_statements().next().expect("empty module")
    }

    #[test]
    fn test_declaration_with_assignment() {
        let (ast, symbols, code) = parse("i64 x = 10;");
        assert_eq!(code, ErrorCode::Ok);

        let stmt = first_statement(&ast);
        assert_eq!(stmt.kind, NodeKind::Assignment);
        assert_eq!(stmt.token.lexeme, "x");
        assert_eq!(
            stmt.left.as_ref().unwrap().kind,
            NodeKind::Literal
        );

        let symbol = symbols.retrieve_by_name("x").unwrap();
        assert_eq!(symbol.declaration_state, DeclarationState::Defined);
    }

    #[test]
    fn test_bare_declaration() {
        let (ast, symbols, code) = parse("i32 x;");
        assert_eq!(code, ErrorCode::Ok);
        assert_eq!(first_statement(&ast).kind, NodeKind::Declaration);
        assert_eq!(
            symbols.retrieve_by_name("x").unwrap().declaration_state,
            DeclarationState::Declared
        );
    }

    #[test]
    fn test_redeclaration_same_scope() {
        let (_, _, code) = parse("i8 x = 1; u8 x = 2;");
        assert_eq!(code, ErrorCode::Redeclared);
    }

    #[test]
    fn test_shadowing_in_nested_scope_is_fine() {
        let (_, _, code) = parse("i8 x = 1; if (true) { i8 x = 2; }");
        assert_eq!(code, ErrorCode::Ok);
    }

    #[test]
    fn test_undeclared_identifier() {
        let (_, _, code) = parse("x = 5;");
        assert_eq!(code, ErrorCode::Undeclared);
    }

    #[test]
    fn test_missing_semicolon() {
        let (_, _, code) = parse("i64 x = 10");
        assert_eq!(code, ErrorCode::MissingSemicolon);
    }

    #[test]
    fn test_void_variable_declaration() {
        let (_, _, code) = parse("void x;");
        assert_eq!(code, ErrorCode::ImproperDeclaration);
    }

    #[test]
    fn test_improper_declaration_shape() {
        let (_, _, code) = parse("i64 i + 1;");
        assert_eq!(code, ErrorCode::ImproperDeclaration);
    }

    #[test]
    fn test_stray_dot_is_unexpected() {
        let (_, _, code) = parse(".12345;");
        assert_eq!(code, ErrorCode::Unexpected);

        let (_, _, code) = parse("456.;");
        assert_eq!(code, ErrorCode::Unexpected);
    }

    #[test]
    fn test_lexer_error_latches() {
        let (_, _, code) = parse("char c = '';");
        assert_eq!(code, ErrorCode::LexerError);
    }

    #[test]
    fn test_terse_assignment_shape() {
        let (ast, _, code) = parse("i64 x = 10; x += 5;");
        assert_eq!(code, ErrorCode::Ok);

        let stmt = ast.chain_statements().nth(1).unwrap();
        assert_eq!(stmt.kind, NodeKind::TerseAssignment);
        assert_eq!(stmt.token.kind, TokenKind::PlusEquals);
        assert_eq!(stmt.left.as_ref().unwrap().kind, NodeKind::Identifier);
        assert_eq!(stmt.right.as_ref().unwrap().kind, NodeKind::Literal);
    }

    #[test]
    fn test_terse_assignment_requires_defined() {
        let (_, _, code) = parse("i64 x; x += 5;");
        assert_eq!(code, ErrorCode::Undefined);
    }

    #[test]
    fn test_binary_precedence() {
        // `1 + 2 * 3` hangs the multiplication under the addition.
        let (ast, _, code) = parse("i64 x = 1 + 2 * 3;");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = first_statement(&ast);
        let plus = assignment.left.as_ref().unwrap();
        assert_eq!(plus.kind, NodeKind::BinaryArithmetic);
        assert_eq!(plus.token.kind, TokenKind::Plus);
        let times = plus.right.as_ref().unwrap();
        assert_eq!(times.token.kind, TokenKind::Asterisk);
    }

    #[test]
    fn test_bitwise_binds_tighter_than_comparison() {
        let (ast, _, code) = parse("u8 a = 1; u8 b = 2; u8 c = 3; bool check = (a | b == c);");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().nth(3).unwrap();
        let eq = assignment.left.as_ref().unwrap();
        assert_eq!(eq.token.kind, TokenKind::Equality);
        assert_eq!(
            eq.left.as_ref().unwrap().token.kind,
            TokenKind::BitwiseOr
        );
    }

    #[test]
    fn test_ternary_after_parens() {
        let (ast, _, code) = parse("bool t = true; i64 x = (t) ? 1 : 2;");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().nth(1).unwrap();
        let ternary = assignment.left.as_ref().unwrap();
        assert_eq!(ternary.kind, NodeKind::TernaryIf);
        assert!(ternary.left.is_some());
        assert!(ternary.middle.is_some());
        assert!(ternary.right.is_some());
    }

    #[test]
    fn test_if_else_chain() {
        let (ast, _, code) = parse("i64 x = 1; if (x < 1) { x = 2; } else if (x < 2) { x = 3; } else { x = 4; }");
        assert_eq!(code, ErrorCode::Ok);

        let if_node = ast.chain_statements().nth(1).unwrap();
        assert_eq!(if_node.kind, NodeKind::If);
        let else_branch = if_node.right.as_ref().unwrap();
        assert_eq!(else_branch.kind, NodeKind::If);
        assert!(else_branch.right.is_some());
    }

    #[test]
    fn test_while_statement() {
        let (ast, _, code) = parse("i64 x = 0; while (x < 3) { x += 1; }");
        assert_eq!(code, ErrorCode::Ok);

        let while_node = ast.chain_statements().nth(1).unwrap();
        assert_eq!(while_node.kind, NodeKind::While);
        assert!(while_node.left.is_some());
        assert!(while_node.right.is_some());
    }

    #[test]
    fn test_for_desugars_to_while() {
        let (ast, _, code) = parse("for (i64 i = 0; i < 5; i++) { print(i); }");
        assert_eq!(code, ErrorCode::Ok);

        let for_node = first_statement(&ast);
        assert_eq!(for_node.kind, NodeKind::For);
        assert_eq!(for_node.left.as_ref().unwrap().kind, NodeKind::Assignment);

        let while_node = for_node.right.as_ref().unwrap();
        assert_eq!(while_node.kind, NodeKind::While);

        // The afterthought is appended as the body's last statement.
        let body = while_node.right.as_ref().unwrap();
        let last = body.chain_statements().last().unwrap();
        assert_eq!(last.kind, NodeKind::PostfixIncrement);
    }

    #[test]
    fn test_function_declaration_and_call() {
        let (ast, symbols, code) = parse("add(i64 a, i64 b) :: i64 { return a + b; } add(1, 2);");
        assert_eq!(code, ErrorCode::Ok);

        let function = first_statement(&ast);
        assert_eq!(function.kind, NodeKind::Function);
        assert_eq!(function.left.as_ref().unwrap().kind, NodeKind::FunctionReturnType);
        assert_eq!(function.middle.as_ref().unwrap().kind, NodeKind::FunctionParam);
        assert!(function.right.is_some());

        let call = ast.chain_statements().nth(1).unwrap();
        assert_eq!(call.kind, NodeKind::FunctionCall);
        let first_arg = call.middle.as_ref().unwrap();
        assert_eq!(first_arg.kind, NodeKind::FunctionArgument);
        assert!(first_arg.right.is_some());

        let symbol = symbols.retrieve_by_name("add").unwrap();
        assert!(symbol.ty().is_function());
        assert_eq!(symbol.ty().params.len(), 2);
    }

    #[test]
    fn test_function_must_be_module_scope() {
        let (_, _, code) = parse("if (true) { f() :: void { } }");
        assert_eq!(code, ErrorCode::ImproperDeclaration);
    }

    #[test]
    fn test_function_forward_declaration_then_definition() {
        let (_, symbols, code) = parse("f() :: i64; f() :: i64 { return 1; }");
        assert_eq!(code, ErrorCode::Ok);
        assert_eq!(
            symbols.retrieve_by_name("f").unwrap().declaration_state,
            DeclarationState::Defined
        );
    }

    #[test]
    fn test_function_double_forward_declaration() {
        let (_, _, code) = parse("f() :: i64; f() :: i64;");
        assert_eq!(code, ErrorCode::Redeclared);
    }

    #[test]
    fn test_call_before_definition() {
        let (_, _, code) = parse("f();");
        assert_eq!(code, ErrorCode::Undeclared);
    }

    #[test]
    fn test_typed_function_declaration_rejected() {
        let (_, _, code) = parse("i64 f() :: i64 { return 1; }");
        assert_eq!(code, ErrorCode::ImproperDeclaration);
    }

    #[test]
    fn test_enum_declaration() {
        let (ast, symbols, code) = parse("enum Nums { Zero, One, Two };");
        assert_eq!(code, ErrorCode::Ok);

        let enum_node = first_statement(&ast);
        assert_eq!(enum_node.kind, NodeKind::EnumIdentifier);
        let entries: Vec<_> = enum_node
            .left
            .as_ref()
            .unwrap()
            .chain_statements()
            .collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, NodeKind::EnumEntry);

        assert!(symbols.retrieve_by_name("Two").is_some());
        assert!(symbols.retrieve_by_name("Nums").unwrap().ty().is_enum());
    }

    #[test]
    fn test_enum_explicit_values() {
        let (ast, _, code) = parse("enum E { A = 5, B };");
        assert_eq!(code, ErrorCode::Ok);

        let enum_node = first_statement(&ast);
        let entries: Vec<_> = enum_node
            .left
            .as_ref()
            .unwrap()
            .chain_statements()
            .collect();
        assert_eq!(entries[0].kind, NodeKind::EnumAssignment);
        assert_eq!(entries[1].kind, NodeKind::EnumEntry);
    }

    #[test]
    fn test_empty_enum_body() {
        let (_, _, code) = parse("enum E { };");
        assert_eq!(code, ErrorCode::EmptyBody);
    }

    #[test]
    fn test_duplicate_enum_entry() {
        let (_, _, code) = parse("enum E { A, A };");
        assert_eq!(code, ErrorCode::Redeclared);
    }

    #[test]
    fn test_struct_declaration_and_field_access() {
        let (ast, symbols, code) = parse("struct T { f32 f = 4.5; } f32 check = T.f;");
        assert_eq!(code, ErrorCode::Ok);

        let struct_node = first_statement(&ast);
        assert_eq!(struct_node.kind, NodeKind::StructDeclaration);

        let symbol = symbols.retrieve_by_name("T").unwrap();
        assert!(symbol.ty().is_struct());
        assert!(symbol.ty().find_member("f").is_some());
        assert!(symbol.fields.retrieve_by_name("f").is_some());

        let access = ast.chain_statements().nth(1).unwrap();
        assert_eq!(access.kind, NodeKind::Assignment);
        let member = access.left.as_ref().unwrap();
        assert_eq!(member.kind, NodeKind::StructMemberIdentifier);
        assert_eq!(member.token.lexeme, "f");
        assert_eq!(
            member.right.as_ref().unwrap().kind,
            NodeKind::StructIdentifier
        );
    }

    #[test]
    fn test_struct_unknown_field() {
        let (_, _, code) = parse("struct T { i8 a = 1; } i8 x = T.b;");
        assert_eq!(code, ErrorCode::Undefined);
    }

    #[test]
    fn test_empty_struct_body() {
        let (_, _, code) = parse("struct T { };");
        assert_eq!(code, ErrorCode::EmptyBody);
    }

    #[test]
    fn test_array_declaration_and_initializer() {
        let (ast, _, code) = parse("u8[3] xs; xs = { 1, 2, 3 };");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().nth(1).unwrap();
        assert_eq!(assignment.kind, NodeKind::Assignment);
        let list = assignment.left.as_ref().unwrap();
        assert_eq!(list.kind, NodeKind::InitializerList);
        assert_eq!(list.chain_statements().count(), 3);
    }

    #[test]
    fn test_array_missing_size() {
        let (_, _, code) = parse("i8[] xs;");
        assert_eq!(code, ErrorCode::MissingSize);
    }

    #[test]
    fn test_array_scalar_assignment_rejected() {
        let (_, _, code) = parse("u8[3] xs; xs = 1;");
        assert_eq!(code, ErrorCode::ImproperAssignment);
    }

    #[test]
    fn test_array_subscript_with_literal() {
        let (ast, _, code) = parse("u8[3] xs; xs = { 1, 2, 3 }; u8 x = xs[1];");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().nth(2).unwrap();
        let identifier = assignment.left.as_ref().unwrap();
        assert_eq!(identifier.kind, NodeKind::Identifier);
        assert_eq!(
            identifier.middle.as_ref().unwrap().kind,
            NodeKind::ArraySubscript
        );
    }

    #[test]
    fn test_postfix_and_prefix_increment() {
        let (ast, _, code) = parse("i64 x = 1; x++; ++x;");
        assert_eq!(code, ErrorCode::Ok);

        assert_eq!(
            ast.chain_statements().nth(1).unwrap().kind,
            NodeKind::PostfixIncrement
        );
        assert_eq!(
            ast.chain_statements().nth(2).unwrap().kind,
            NodeKind::PrefixIncrement
        );
    }

    #[test]
    fn test_increment_undefined_rejected() {
        let (_, _, code) = parse("i64 x; x++;");
        assert_eq!(code, ErrorCode::Undefined);
    }

    #[test]
    fn test_print_statement() {
        let (ast, _, code) = parse("print(42);");
        assert_eq!(code, ErrorCode::Ok);

        let stmt = first_statement(&ast);
        assert_eq!(stmt.kind, NodeKind::PrintCall);
        assert_eq!(stmt.left.as_ref().unwrap().kind, NodeKind::Literal);
    }

    #[test]
    fn test_break_outside_statement_position() {
        let (ast, _, code) = parse("i64 x = 0; while (x < 3) { break; }");
        assert_eq!(code, ErrorCode::Ok);

        let while_node = ast.chain_statements().nth(1).unwrap();
        let body = while_node.right.as_ref().unwrap();
        assert_eq!(
            body.chain_statements().next().unwrap().kind,
            NodeKind::Break
        );
    }
}
