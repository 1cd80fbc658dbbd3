//! Tree-walking evaluator for Cedar
//!
//! Walks the checked AST and produces a `Value` per expression node.
//! Statements thread a control-flow signal so `break`, `continue`, and
//! `return` unwind to the construct that handles them. Scopes mirror
//! function-call nesting; the module table is passed in by the driver so
//! the values the type checker stored (enum entries in particular)
//! survive into execution.
//!
//! Runtime faults here — a lost function definition, a subscript out of
//! range, division by zero — are interpreter-internal errors. They do
//! not latch; they bubble up as `Err` and terminate with a distinct
//! exit path.

use crate::ast::{AstNode, NodeKind};
use crate::symbol_table::{DeclarationState, ScopeStack, Symbol, SymbolTable};
use crate::token::TokenKind;
use crate::value::{Payload, Value};

/// What a statement told the enclosing construct to do next.
enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter<'a> {
    scopes: ScopeStack,
    /// Function definitions registered while walking the module, resolved
    /// by lexeme at call sites.
    functions: Vec<&'a AstNode>,
    /// Captured `print` lines, in order.
    pub output: Vec<String>,
    echo: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(module: SymbolTable) -> Self {
        Interpreter {
            scopes: ScopeStack::with_module_table(module),
            functions: Vec::new(),
            output: Vec::new(),
            echo: true,
        }
    }

    /// Capture `print` output without echoing to stdout. Tests and the
    /// harness run this way.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn interpret(&mut self, root: &'a AstNode) -> Result<(), String> {
        for statement in root.chain_statements() {
            match self.exec(statement)? {
                Flow::Normal(_) => {}
                // Nothing above module level handles these; stop cleanly.
                Flow::Break | Flow::Continue | Flow::Return(_) => break,
            }
        }
        tracing::debug!(prints = self.output.len(), "interpretation complete");
        Ok(())
    }

    /// Hand the module table back, with every value execution produced.
    pub fn into_module(self) -> SymbolTable {
        self.scopes.into_module()
    }

    // === Statements ===

    fn exec(&mut self, node: &'a AstNode) -> Result<Flow, String> {
        match node.kind {
            NodeKind::Function => {
                self.functions.push(node);
                Ok(Flow::Normal(Value::none()))
            }

            // Declarations and enum definitions finished their work in
            // earlier phases.
            NodeKind::Declaration | NodeKind::EnumIdentifier | NodeKind::Untyped => {
                Ok(Flow::Normal(Value::none()))
            }

            NodeKind::StructDeclaration => {
                self.exec_struct_declaration(node)?;
                Ok(Flow::Normal(Value::none()))
            }

            NodeKind::If => {
                let condition = self.eval(required(node.left.as_deref(), "if condition")?)?;
                if condition.as_bool() {
                    return self.exec_chain(required(node.middle.as_deref(), "if body")?);
                }
                match node.right.as_deref() {
                    Some(branch) if branch.kind == NodeKind::If => self.exec(branch),
                    Some(branch) => self.exec_chain(branch),
                    None => Ok(Flow::Normal(Value::none())),
                }
            }

            NodeKind::While => {
                let condition = required(node.left.as_deref(), "while condition")?;
                let body = required(node.right.as_deref(), "while body")?;
                loop {
                    if !self.eval(condition)?.as_bool() {
                        break;
                    }
                    match self.exec_chain(body)? {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(Value::none()))
            }

            NodeKind::For => {
                self.exec(required(node.left.as_deref(), "for initialization")?)?;
                self.exec(required(node.right.as_deref(), "for loop")?)
            }

            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),

            NodeKind::Return => {
                let value = match node.left.as_deref() {
                    Some(expr) => self.eval(expr)?,
                    None => Value::none(),
                };
                Ok(Flow::Return(value))
            }

            NodeKind::PrintCall => {
                let value = self.eval(required(node.left.as_deref(), "print operand")?)?;
                let line = value.to_string();
                if self.echo {
                    println!("{}", line);
                }
                self.output.push(line);
                Ok(Flow::Normal(Value::none()))
            }

            _ => Ok(Flow::Normal(self.eval(node)?)),
        }
    }

    fn exec_chain(&mut self, chain: &'a AstNode) -> Result<Flow, String> {
        for statement in chain.chain_statements() {
            match self.exec(statement)? {
                Flow::Normal(_) => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(Value::none()))
    }

    // === Expressions ===

    fn eval(&mut self, node: &'a AstNode) -> Result<Value, String> {
        match node.kind {
            NodeKind::Literal => Value::from_token(&node.data_type, &node.token),

            NodeKind::Identifier => self.eval_identifier(node),

            NodeKind::ArraySubscript => {
                if node.token.kind == TokenKind::IntLiteral {
                    Value::from_token(&node.data_type, &node.token)
                } else {
                    self.lookup_value(&node.token)
                }
            }

            NodeKind::FunctionArgument => {
                if node.token.kind.is_literal() {
                    Value::from_token(&node.data_type, &node.token)
                } else {
                    self.lookup_value(&node.token)
                }
            }

            NodeKind::Assignment => self.eval_assignment(node),
            NodeKind::TerseAssignment => self.eval_terse_assignment(node),

            NodeKind::UnaryOp => self.eval_unary(node),
            NodeKind::BinaryArithmetic => self.eval_binary_arithmetic(node),
            NodeKind::BinaryLogical => self.eval_binary_logical(node),
            NodeKind::BinaryBitwise => self.eval_binary_bitwise(node),

            NodeKind::PrefixIncrement => self.step_symbol(node, 1, true),
            NodeKind::PrefixDecrement => self.step_symbol(node, -1, true),
            NodeKind::PostfixIncrement => self.step_symbol(node, 1, false),
            NodeKind::PostfixDecrement => self.step_symbol(node, -1, false),

            NodeKind::TernaryIf => {
                let condition = self.eval(required(node.left.as_deref(), "ternary condition")?)?;
                if condition.as_bool() {
                    self.eval(required(node.middle.as_deref(), "ternary branch")?)
                } else {
                    self.eval(required(node.right.as_deref(), "ternary branch")?)
                }
            }

            NodeKind::FunctionCall => self.call_function(node),

            NodeKind::StructMemberIdentifier => self.eval_struct_member(node),

            _ => Ok(Value::none()),
        }
    }

    fn eval_identifier(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let value = self.lookup_value(&node.token)?;

        let Some(index_node) = node.middle.as_deref() else {
            return Ok(value);
        };
        let index = self.subscript_index(index_node)?;

        match &value.payload {
            Payload::Str(s) => s.chars().nth(index).map(Value::char_value).ok_or_else(|| {
                format!(
                    "Index {} is out of range for string '{}'",
                    index, node.token.lexeme
                )
            }),
            Payload::Array(items) => items.get(index).cloned().ok_or_else(|| {
                format!(
                    "Index {} is out of range for array '{}'",
                    index, node.token.lexeme
                )
            }),
            _ => Err(format!("'{}' is not subscriptable", node.token.lexeme)),
        }
    }

    fn eval_assignment(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let value = match node.left.as_deref() {
            Some(list) if list.kind == NodeKind::InitializerList => {
                self.array_from_initializer(list)?
            }
            Some(expr) => self.eval(expr)?,
            None => Value::none(),
        };

        // A subscripted target writes one slot of an existing array.
        if let Some(index_node) = node.middle.as_deref() {
            let index = self.subscript_index(index_node)?;
            let name = node.token.lexeme.clone();
            let symbol = self
                .scopes
                .resolve_mut(&node.token)
                .ok_or_else(|| format!("Undefined symbol '{}'", name))?;

            match &mut symbol.value.payload {
                Payload::Array(items) => {
                    if index >= items.len() {
                        return Err(format!(
                            "Index {} is out of range for array '{}'",
                            index, name
                        ));
                    }
                    items[index] = value.clone();
                    return Ok(value);
                }
                _ => return Err(format!("'{}' is not an array", name)),
            }
        }

        match self.scopes.resolve_mut(&node.token) {
            Some(symbol) => {
                symbol.value = value.clone();
                symbol.declaration_state = DeclarationState::Defined;
            }
            None => {
                let mut symbol = Symbol::new(
                    node.token.clone(),
                    node.data_type.clone(),
                    DeclarationState::Defined,
                );
                symbol.value = value.clone();
                self.scopes.current_mut().add(symbol);
            }
        }
        Ok(value)
    }

    fn eval_terse_assignment(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let identifier = required(node.left.as_deref(), "terse assignment target")?;
        let rhs = required(node.right.as_deref(), "terse assignment operand")?;

        let current = self.lookup_value(&identifier.token)?;
        let operand = self.eval(rhs)?;
        let width = identifier.data_type.bit_width();

        let result = match node.token.kind {
            TokenKind::PlusEquals => current.add(&operand),
            TokenKind::MinusEquals => current.sub(&operand),
            TokenKind::TimesEquals => current.mul(&operand),
            TokenKind::DivideEquals => {
                self.guard_zero(&current, &operand)?;
                current.div(&operand)
            }
            TokenKind::ModuloEquals => {
                self.guard_zero(&current, &operand)?;
                current.rem(&operand)
            }

            TokenKind::BitwiseOrEquals => {
                Value::truncated_to(current.as_u64() | operand.as_u64(), width)
            }
            TokenKind::BitwiseAndEquals => {
                Value::truncated_to(current.as_u64() & operand.as_u64(), width)
            }
            TokenKind::BitwiseXorEquals => {
                Value::truncated_to(current.as_u64() ^ operand.as_u64(), width)
            }
            TokenKind::BitwiseLeftShiftEquals => {
                Value::truncated_to(current.as_u64() << operand.as_u64(), width)
            }
            TokenKind::BitwiseRightShiftEquals => {
                Value::truncated_to(current.as_u64() >> operand.as_u64(), width)
            }

            other => return Err(format!("'{}' is not a terse assignment operator", other)),
        };

        self.store(&identifier.token, result.clone())?;
        Ok(result)
    }

    fn eval_unary(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let operand_node = required(node.left.as_deref(), "unary operand")?;
        let operand = self.eval(operand_node)?;

        let value = match node.token.kind {
            TokenKind::BitwiseNot => {
                // `~` answers in the operand's declared width.
                Value::truncated_to(!operand.as_u64(), operand_node.data_type.bit_width())
            }
            TokenKind::LogicalNot => operand.not(),
            TokenKind::Minus => {
                if operand.ty.is_float() {
                    Value::float(-operand.as_f64())
                } else if operand.ty.is_int() {
                    Value::int(operand.as_i64().wrapping_neg())
                } else {
                    Value::int((operand.as_u64() as i64).wrapping_neg())
                }
            }
            other => return Err(format!("'{}' is not a unary operator", other)),
        };
        Ok(value)
    }

    fn eval_binary_arithmetic(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let left = self.eval(required(node.left.as_deref(), "operand")?)?;
        let right = self.eval(required(node.right.as_deref(), "operand")?)?;

        let value = match node.token.kind {
            TokenKind::Plus => left.add(&right),
            TokenKind::Minus => left.sub(&right),
            TokenKind::Asterisk => left.mul(&right),
            TokenKind::Divide => {
                self.guard_zero(&left, &right)?;
                left.div(&right)
            }
            TokenKind::Modulo => {
                self.guard_zero(&left, &right)?;
                left.rem(&right)
            }
            other => return Err(format!("'{}' is not an arithmetic operator", other)),
        };
        Ok(value)
    }

    fn eval_binary_logical(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let left = self.eval(required(node.left.as_deref(), "operand")?)?;
        let right = self.eval(required(node.right.as_deref(), "operand")?)?;

        let value = match node.token.kind {
            TokenKind::Equality => left.equals(&right),
            TokenKind::LogicalNotEquals => left.equals(&right).not(),
            TokenKind::GreaterThan => left.greater_than(&right),
            TokenKind::LessThan => left.less_than(&right),
            TokenKind::GreaterThanEquals => right.greater_than(&left).not(),
            TokenKind::LessThanEquals => right.less_than(&left).not(),
            TokenKind::LogicalAnd => left.logical_and(&right),
            TokenKind::LogicalOr => left.logical_or(&right),
            other => return Err(format!("'{}' is not a comparison operator", other)),
        };
        Ok(value)
    }

    fn eval_binary_bitwise(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let left = self.eval(required(node.left.as_deref(), "operand")?)?;
        let right = self.eval(required(node.right.as_deref(), "operand")?)?;

        let value = match node.token.kind {
            TokenKind::BitwiseXor => Value::uint(left.as_u64() ^ right.as_u64()),
            TokenKind::BitwiseOr => Value::uint(left.as_u64() | right.as_u64()),
            TokenKind::BitwiseAnd => Value::uint(left.as_u64() & right.as_u64()),
            TokenKind::BitwiseLeftShift => Value::uint(left.as_u64() << right.as_u64()),
            TokenKind::BitwiseRightShift => Value::uint(left.as_u64() >> right.as_u64()),
            other => return Err(format!("'{}' is not a bitwise operator", other)),
        };
        Ok(value)
    }

    /// Shared read-modify-write for the four increment/decrement forms.
    /// Prefix forms answer the post-state, postfix forms the pre-state.
    fn step_symbol(&mut self, node: &'a AstNode, delta: i64, prefix: bool) -> Result<Value, String> {
        let token = if prefix {
            &required(node.left.as_deref(), "increment target")?.token
        } else {
            &node.token
        };

        let before = self.lookup_value(token)?;
        let after = if before.ty.is_int() {
            Value::int(before.as_i64().wrapping_add(delta))
        } else {
            Value::uint(before.as_u64().wrapping_add(delta as u64))
        };

        self.store(token, after.clone())?;
        Ok(if prefix { after } else { before })
    }

    // === Functions ===

    fn call_function(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let fn_def = self
            .functions
            .iter()
            .find(|f| f.token.lexeme == node.token.lexeme)
            .copied()
            .ok_or_else(|| {
                format!("Couldn't find a definition for {}()", node.token.lexeme)
            })?;

        // Arguments evaluate in the caller's scope, then bind as the
        // callee's parameter symbols.
        let mut bindings = Vec::new();
        let mut param = fn_def.middle.as_deref();
        let mut argument = node.middle.as_deref();
        while let (Some(p), Some(a)) = (param, argument) {
            let value = self.eval(a)?;
            bindings.push((p.token.clone(), p.data_type.clone(), value));
            param = p.left.as_deref();
            argument = a.right.as_deref();
        }

        self.scopes.begin();
        for (token, ty, value) in bindings {
            let mut symbol = Symbol::new(token, ty, DeclarationState::Defined);
            symbol.value = value;
            self.scopes.current_mut().add(symbol);
        }

        let mut result = Value::none();
        if let Some(body) = fn_def.right.as_deref() {
            match self.exec_chain(body) {
                Ok(Flow::Return(value)) => result = value,
                Ok(_) => {}
                Err(e) => {
                    self.scopes.end();
                    return Err(e);
                }
            }
        }

        self.scopes.end();
        Ok(result)
    }

    // === Structs ===

    fn exec_struct_declaration(&mut self, node: &'a AstNode) -> Result<(), String> {
        let Some(fields) = node.left.as_deref() else {
            return Ok(());
        };

        let mut updates = Vec::new();
        for field in fields.chain_statements() {
            if field.kind == NodeKind::Assignment {
                if let Some(expr) = field.left.as_deref() {
                    let value = self.eval(expr)?;
                    updates.push((field.token.clone(), value));
                }
            }
        }

        if let Some(symbol) = self.scopes.resolve_mut(&node.token) {
            for (token, value) in updates {
                symbol.fields.set_value(&token, value);
                symbol
                    .fields
                    .set_declaration_state(&token, DeclarationState::Defined);
            }
        }
        Ok(())
    }

    fn eval_struct_member(&mut self, node: &'a AstNode) -> Result<Value, String> {
        let owner = required(node.right.as_deref(), "struct member owner")?
            .token
            .clone();

        if let Some(expr) = node.left.as_deref() {
            let value = self.eval(expr)?;
            let symbol = self
                .scopes
                .resolve_mut(&owner)
                .ok_or_else(|| format!("Undefined struct '{}'", owner.lexeme))?;
            symbol.fields.set_value(&node.token, value);
        }

        let field_value = self
            .scopes
            .exists_in_outer_scope(&owner)
            .and_then(|s| s.fields.retrieve(&node.token))
            .map(|f| f.value.clone())
            .ok_or_else(|| {
                format!(
                    "Struct '{}' has no field '{}'",
                    owner.lexeme, node.token.lexeme
                )
            })?;

        let Some(index_node) = node.middle.as_deref() else {
            return Ok(field_value);
        };
        let index = self.subscript_index(index_node)?;
        match &field_value.payload {
            Payload::Array(items) => items.get(index).cloned().ok_or_else(|| {
                format!(
                    "Index {} is out of range for field '{}'",
                    index, node.token.lexeme
                )
            }),
            Payload::Str(s) => s.chars().nth(index).map(Value::char_value).ok_or_else(|| {
                format!(
                    "Index {} is out of range for field '{}'",
                    index, node.token.lexeme
                )
            }),
            _ => Ok(field_value),
        }
    }

    // === Helpers ===

    fn array_from_initializer(&mut self, list: &'a AstNode) -> Result<Value, String> {
        let mut items = Vec::new();
        for element in list.chain_statements() {
            items.push(self.eval(element)?);
        }
        Ok(Value::array(list.data_type.clone(), items))
    }

    fn subscript_index(&mut self, node: &'a AstNode) -> Result<usize, String> {
        let value = self.eval(node)?;
        let index = value.as_i64();
        if index < 0 {
            return Err(format!("Array subscript {} is negative", index));
        }
        Ok(index as usize)
    }

    fn guard_zero(&self, left: &Value, right: &Value) -> Result<(), String> {
        if (left.ty.is_int() || left.ty.is_uint()) && right.is_zero() {
            return Err("Division by zero".to_string());
        }
        Ok(())
    }

    fn lookup_value(&self, token: &crate::token::Token) -> Result<Value, String> {
        self.scopes
            .exists_in_outer_scope(token)
            .map(|s| s.value.clone())
            .ok_or_else(|| format!("Undefined symbol '{}'", token.lexeme))
    }

    fn store(&mut self, token: &crate::token::Token, value: Value) -> Result<(), String> {
        match self.scopes.resolve_mut(token) {
            Some(symbol) => {
                symbol.value = value;
                Ok(())
            }
            None => Err(format!("Undefined symbol '{}'", token.lexeme)),
        }
    }
}

fn required<'a>(node: Option<&'a AstNode>, what: &str) -> Result<&'a AstNode, String> {
    node.ok_or_else(|| format!("Malformed tree: missing {}", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCode, Reporter};
    use crate::parser::Parser;
    use crate::typechecker::TypeChecker;
    use crate::types::TypeSpecifier;

    fn run(source: &str) -> (SymbolTable, Vec<String>) {
        let mut reporter = Reporter::new("test.txt", source).quiet();
        let parser = Parser::new(source, &mut reporter);
        let (mut ast, mut symbols) = parser.build_ast();
        TypeChecker::new(&mut symbols, &mut reporter).check(&mut ast);
        assert_eq!(reporter.latched(), ErrorCode::Ok, "compile errors in test source");

        let mut interpreter = Interpreter::new(symbols).quiet();
        interpreter.interpret(&ast).expect("runtime error");
        let output = interpreter.output.clone();
        (interpreter.into_module(), output)
    }

    fn check_value(source: &str) -> Value {
        let (symbols, _) = run(source);
        symbols
            .retrieve_by_name("check")
            .expect("no `check` symbol")
            .value
            .clone()
    }

    #[test]
    fn test_terse_add() {
        let value = check_value("i64 check = 10; check += 5;");
        assert_eq!(value.payload, Payload::Int(15));
    }

    #[test]
    fn test_terse_bitwise_or() {
        let value = check_value("u8 check = `1111 0000`; check |= `0000 1111`;");
        assert_eq!(value.payload, Payload::Uint(255));
        assert_eq!(value.ty.specifier, TypeSpecifier::U8);
    }

    #[test]
    fn test_terse_shift_truncates_to_width() {
        // 0xF0 << 2 is 0x3C0; a u8 keeps only 0xC0.
        let value = check_value("u8 check = 0xF0; check <<= 0x02;");
        assert_eq!(value.payload, Payload::Uint(0xC0));
    }

    #[test]
    fn test_enum_member_read() {
        let value = check_value("enum Nums { Zero, One, Two }; i8 check = Two;");
        assert_eq!(value.payload, Payload::Int(2));
    }

    #[test]
    fn test_logical_expression() {
        let value = check_value("bool check = (true && (false || true) && !false);");
        assert_eq!(value.payload, Payload::Bool(true));
    }

    #[test]
    fn test_float_round_trips_bit_exact() {
        let value =
            check_value("f32 check = 340282346638528859811704183484516925440.000000;");
        assert_eq!(value.payload, Payload::Float(f32::MAX as f64));
        assert_eq!(value.ty.specifier, TypeSpecifier::F32);
    }

    #[test]
    fn test_struct_field_default() {
        let value = check_value("struct T { f32 f = 4.5; } f32 check = T.f;");
        assert_eq!(value.payload, Payload::Float(4.5));
    }

    #[test]
    fn test_struct_field_assignment() {
        let value = check_value("struct T { i8 a = 1; } T.a = 7; i8 check = T.a;");
        assert_eq!(value.payload, Payload::Int(7));
    }

    #[test]
    fn test_bitwise_not_masks_to_width() {
        let value = check_value("u8 x = 0x0F; u8 check = ~x;");
        assert_eq!(value.payload, Payload::Uint(0xF0));

        let value = check_value("u16 x = 0x00FF; u16 check = ~x;");
        assert_eq!(value.payload, Payload::Uint(0xFF00));
    }

    #[test]
    fn test_postfix_returns_pre_state() {
        let (symbols, _) = run("i64 x = 1; i64 check = x++;");
        assert_eq!(
            symbols.retrieve_by_name("check").unwrap().value.payload,
            Payload::Int(1)
        );
        assert_eq!(
            symbols.retrieve_by_name("x").unwrap().value.payload,
            Payload::Int(2)
        );
    }

    #[test]
    fn test_prefix_returns_post_state() {
        let (symbols, _) = run("i64 x = 1; i64 check = ++x;");
        assert_eq!(
            symbols.retrieve_by_name("check").unwrap().value.payload,
            Payload::Int(2)
        );
    }

    #[test]
    fn test_while_loop_accumulates() {
        let value = check_value("i64 check = 0; i64 i = 0; while (i < 5) { check += i; i += 1; }");
        assert_eq!(value.payload, Payload::Int(10));
    }

    #[test]
    fn test_break_exits_loop() {
        let value = check_value(
            "i64 check = 0; while (true) { check += 1; if (check > 3) { break; } }",
        );
        assert_eq!(value.payload, Payload::Int(4));
    }

    #[test]
    fn test_continue_skips_rest_of_pass() {
        let source = "i64 check = 0; i64 i = 0; \
                      while (i < 5) { i += 1; if (i == 3) { continue; } check += i; }";
        let value = check_value(source);
        // 1 + 2 + 4 + 5, skipping 3.
        assert_eq!(value.payload, Payload::Int(12));
    }

    #[test]
    fn test_for_loop() {
        let value = check_value("i64 check = 0; for (i64 i = 0; i < 5; i++) { check += i; }");
        assert_eq!(value.payload, Payload::Int(10));
    }

    #[test]
    fn test_if_takes_only_one_branch() {
        let value = check_value(
            "i64 check = 0; i64 x = 1; if (x > 0) { check = 1; } else { check = 2; }",
        );
        assert_eq!(value.payload, Payload::Int(1));
    }

    #[test]
    fn test_ternary_value() {
        let value = check_value("bool t = false; i64 check = (t) ? 1 : 2;");
        assert_eq!(value.payload, Payload::Int(2));
    }

    #[test]
    fn test_function_call_returns_value() {
        let value = check_value("add(i64 a, i64 b) :: i64 { return a + b; } i64 check = add(1, 2);");
        assert_eq!(value.payload, Payload::Int(3));
    }

    #[test]
    fn test_function_parameters_bind_per_call() {
        let source = "double(i64 n) :: i64 { return n + n; } \
                      i64 a = double(3); i64 b = double(5); i64 check = a + b;";
        let value = check_value(source);
        assert_eq!(value.payload, Payload::Int(16));
    }

    #[test]
    fn test_array_initializer_and_subscript() {
        let (symbols, _) = run("u8[3] xs; xs = { 1, 2, 3 }; u8 check = xs[1];");
        assert_eq!(
            symbols.retrieve_by_name("check").unwrap().value.payload,
            Payload::Uint(2)
        );
    }

    #[test]
    fn test_array_slot_assignment() {
        let value = check_value("u8[3] xs; xs = { 1, 2, 3 }; xs[0] = 9; u8 check = xs[0];");
        assert_eq!(value.payload, Payload::Uint(9));
    }

    #[test]
    fn test_string_subscript_reads_char() {
        let value = check_value("string s = \"hello\"; char check = s[1];");
        assert_eq!(value.payload, Payload::Char('e'));
    }

    #[test]
    fn test_print_formats_by_type() {
        let (_, output) = run(
            "print(42); print(4.5); print(true); print(\"hi\"); print('x');",
        );
        assert_eq!(output, vec!["42", "4.500000", "true", "hi", "x"]);
    }

    #[test]
    fn test_print_enum_member_prints_number() {
        let (_, output) = run("enum E { A, B }; print(B);");
        assert_eq!(output, vec!["1"]);
    }

    #[test]
    fn test_division_by_zero_is_runtime_error() {
        let source = "i64 a = 1; i64 b = 0; i64 c = a / b;";
        let mut reporter = Reporter::new("test.txt", source).quiet();
        let parser = Parser::new(source, &mut reporter);
        let (mut ast, mut symbols) = parser.build_ast();
        TypeChecker::new(&mut symbols, &mut reporter).check(&mut ast);

        let mut interpreter = Interpreter::new(symbols).quiet();
        let result = interpreter.interpret(&ast);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Division by zero"));
    }

    #[test]
    fn test_subscript_out_of_range_is_runtime_error() {
        let source = "u8[2] xs; xs = { 1, 2 }; u8 x = xs[5];";
        let mut reporter = Reporter::new("test.txt", source).quiet();
        let parser = Parser::new(source, &mut reporter);
        let (mut ast, mut symbols) = parser.build_ast();
        TypeChecker::new(&mut symbols, &mut reporter).check(&mut ast);

        let mut interpreter = Interpreter::new(symbols).quiet();
        assert!(interpreter.interpret(&ast).is_err());
    }

    #[test]
    fn test_integer_literal_round_trip() {
        for (source, expected) in [
            ("i64 check = 127;", Payload::Int(127)),
            ("i64 check = -32768;", Payload::Int(-32768)),
            ("i64 check = 9223372036854775807;", Payload::Int(i64::MAX)),
            ("u64 check = 0xFFFFFFFFFFFFFFFF;", Payload::Uint(u64::MAX)),
        ] {
            let value = check_value(source);
            assert_eq!(value.payload, expected, "source: {}", source);
        }
    }
}
