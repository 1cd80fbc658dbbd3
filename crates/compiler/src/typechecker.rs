//! Type checker for Cedar
//!
//! A post-order walk over the parsed tree. Each node's `data_type` is
//! actualized: literals shrink to the smallest specifier that holds
//! their value, identifiers adopt their symbol's type, operators derive
//! from their operands. Enum entries are assigned their numeric values
//! here and written back into the module symbol table so every later
//! phase sees them. Checking continues after an error; the reporter
//! keeps the first code.
//!
//! Conversion rules: numeric literals convert within their family when
//! the value fits the target's range. Identifiers, field accesses, and
//! call results are already typed, so they require an exact specifier
//! match. Everything else matches exactly or not at all.

use crate::ast::{AstNode, NodeKind};
use crate::errors::{ErrorCode, Reporter};
use crate::symbol_table::SymbolTable;
use crate::token::TokenKind;
use crate::types::Type;
use crate::value::{base_of, parse_f64, parse_i64, parse_u64, Value};

pub struct TypeChecker<'a> {
    symbols: &'a mut SymbolTable,
    reporter: &'a mut Reporter,
    /// Function type of the enclosing function definition, used to
    /// resolve parameter mentions that live in no table.
    in_function: Option<Type>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(symbols: &'a mut SymbolTable, reporter: &'a mut Reporter) -> Self {
        TypeChecker {
            symbols,
            reporter,
            in_function: None,
        }
    }

    pub fn check(&mut self, root: &mut AstNode) {
        self.check_recurse(root);
        tracing::debug!(errors = self.reporter.error_count(), "type check complete");
    }

    fn check_recurse(&mut self, node: &mut AstNode) {
        // Enum bodies carry their own value-propagation walk.
        if node.kind == NodeKind::EnumIdentifier {
            self.check_enum(node);
            return;
        }

        let entering_function = node.kind == NodeKind::Function;
        if entering_function {
            self.in_function = Some(node.data_type.clone());
        }

        if let Some(left) = node.left.as_deref_mut() {
            self.check_recurse(left);
        }
        if let Some(middle) = node.middle.as_deref_mut() {
            self.check_recurse(middle);
        }
        if let Some(right) = node.right.as_deref_mut() {
            self.check_recurse(right);
        }

        if entering_function {
            self.in_function = None;
        }

        match node.kind {
            NodeKind::Literal => self.check_literal(node),
            NodeKind::Identifier => self.check_identifier(node),
            NodeKind::UnaryOp => self.check_unary(node),
            NodeKind::BinaryArithmetic => self.check_binary_arithmetic(node),
            NodeKind::BinaryLogical => self.check_binary_logical(node),
            NodeKind::BinaryBitwise => self.check_binary_bitwise(node),
            NodeKind::ArraySubscript => self.check_array_subscript(node),
            NodeKind::Assignment => self.check_assignment(node),
            NodeKind::TerseAssignment => self.check_terse_assignment(node),
            NodeKind::TernaryIf => self.check_ternary(node),
            NodeKind::PrefixIncrement | NodeKind::PrefixDecrement => {
                if let Some(left) = node.left.as_deref() {
                    node.data_type = left.data_type.clone();
                }
            }
            NodeKind::PostfixIncrement | NodeKind::PostfixDecrement => {
                // The parser already stamped the symbol's type.
            }
            NodeKind::Return => self.check_return(node),
            NodeKind::Function => self.check_function(node),
            NodeKind::FunctionCall => self.check_function_call(node),
            NodeKind::StructMemberIdentifier => self.check_struct_member(node),
            NodeKind::InitializerList => self.check_initializer_list(node),
            _ => {}
        }
    }

    // === Literals and shrinking ===

    fn check_literal(&mut self, node: &mut AstNode) {
        if node.data_type.is_numeric() {
            match Value::from_token(&node.data_type, &node.token) {
                Ok(value) => {
                    // The value constructors shrink; adopt their type.
                    node.data_type = value.ty.clone();
                    node.value = value;
                }
                Err(message) => {
                    self.reporter
                        .error_at(ErrorCode::Overflow, &node.token, &message);
                    node.data_type = Type::none();
                }
            }
            return;
        }

        if node.data_type.is_string() {
            node.data_type.array_size = node.token.lexeme.len();
            if let Ok(value) = Value::from_token(&node.data_type, &node.token) {
                node.value = value;
            }
            return;
        }

        if node.data_type.is_bool() || node.data_type.is_char() {
            if let Ok(value) = Value::from_token(&node.data_type, &node.token) {
                node.value = value;
            }
            return;
        }

        let message = format!("Literal of type '{}' is not supported", node.data_type);
        self.reporter
            .error_at(ErrorCode::Pebcak, &node.token, &message);
    }

    fn check_identifier(&mut self, node: &mut AstNode) {
        let symbol_ty = self
            .symbols
            .retrieve(&node.token)
            .map(|s| s.ty().clone())
            .or_else(|| {
                self.in_function
                    .as_ref()
                    .and_then(|f| f.find_param(&node.token.lexeme))
                    .map(|p| p.ty.clone())
            });

        // Block-local symbols lived in tables that closed with their
        // scope; their mentions keep the type the parser stamped.
        let mut ty = symbol_ty.unwrap_or_else(|| node.data_type.clone());

        if node
            .middle
            .as_deref()
            .is_some_and(|m| m.kind == NodeKind::ArraySubscript)
        {
            if ty.is_string() {
                ty = Type::from_token_kind(TokenKind::Char);
            } else if ty.is_array() {
                ty = ty.element_type();
            }
        }

        node.data_type = ty;
    }

    fn check_array_subscript(&mut self, node: &mut AstNode) {
        if node.token.kind == TokenKind::IntLiteral {
            match parse_i64(&node.token.lexeme, 10) {
                Some(v) if v >= 0 => {
                    node.data_type = Type::smallest_int(v);
                    node.value = Value::int(v);
                }
                _ => {
                    self.reporter.error_at(
                        ErrorCode::ImproperAccess,
                        &node.token,
                        "Array subscript must be a non-negative integer",
                    );
                }
            }
        }
        // Identifier subscripts keep the type the parser resolved.
    }

    // === Convertibility ===

    /// Can `from` be used where a `target`-typed slot is expected?
    /// Literal sources get a textual range check; already-typed sources
    /// (identifiers, field accesses, call results) need their specifier
    /// to match exactly.
    fn type_is_convertible(&mut self, from: &AstNode, target: &Type) -> bool {
        // A return converts the way its operand does.
        if from.kind == NodeKind::Return {
            if let Some(operand) = from.left.as_deref() {
                return self.type_is_convertible(operand, target);
            }
        }

        let from_ty = &from.data_type;
        let same_family = from_ty.matches_exactly(target)
            || (from_ty.is_int() && target.is_int())
            || (from_ty.is_uint() && target.is_uint())
            || (from_ty.is_float() && target.is_float());
        let non_numeric = !(from_ty.is_numeric() && target.is_numeric());

        if !same_family && non_numeric {
            return false;
        }
        if same_family && non_numeric {
            return true;
        }

        if matches!(
            from.kind,
            NodeKind::Identifier
                | NodeKind::StructMemberIdentifier
                | NodeKind::FunctionCall
                | NodeKind::PrefixIncrement
                | NodeKind::PrefixDecrement
                | NodeKind::PostfixIncrement
                | NodeKind::PostfixDecrement
        ) {
            return from_ty.specifier == target.specifier;
        }

        // Floats never cross into the integer families, or back.
        if from_ty.is_float() != target.is_float() {
            return false;
        }

        if target.is_float() {
            self.can_convert_to_float(from, target)
        } else if target.is_uint() {
            self.can_convert_to_uint(from, target)
        } else {
            self.can_convert_to_int(from, target)
        }
    }

    /// Signed source value: the literal's text when there is one, the
    /// node's computed value otherwise.
    fn source_i64(&mut self, from: &AstNode) -> Option<i64> {
        if from.token.kind.is_literal() {
            let parsed = parse_i64(&from.token.lexeme, base_of(from.token.kind));
            if parsed.is_none() {
                self.reporter.error_at(
                    ErrorCode::Overflow,
                    &from.token,
                    "Literal value overflows 64 bits",
                );
            }
            return parsed;
        }
        Some(from.value.as_i64())
    }

    fn source_u64(&mut self, from: &AstNode) -> Option<u64> {
        if from.token.kind.is_literal() {
            let parsed = parse_u64(&from.token.lexeme, base_of(from.token.kind));
            if parsed.is_none() {
                self.reporter.error_at(
                    ErrorCode::Overflow,
                    &from.token,
                    "Literal value overflows 64 bits",
                );
            }
            return parsed;
        }
        Some(from.value.as_u64())
    }

    fn range_error(&mut self, from: &AstNode, target: &Type) -> bool {
        let message = format!("Literal value does not fit type '{}'", target);
        self.reporter
            .error_at(ErrorCode::TypeDisagreement, &from.token, &message);
        false
    }

    fn can_convert_to_int(&mut self, from: &AstNode, target: &Type) -> bool {
        let Some(value) = self.source_i64(from) else {
            return false;
        };

        let fits = match target.bit_width() {
            8 => value >= i8::MIN as i64 && value <= i8::MAX as i64,
            16 => value >= i16::MIN as i64 && value <= i16::MAX as i64,
            32 => value >= i32::MIN as i64 && value <= i32::MAX as i64,
            _ => true,
        };
        if fits {
            return true;
        }
        self.range_error(from, target)
    }

    fn can_convert_to_uint(&mut self, from: &AstNode, target: &Type) -> bool {
        if from.data_type.is_signed() {
            match self.source_i64(from) {
                Some(v) if v < 0 => return self.range_error(from, target),
                None => return false,
                _ => {}
            }
        }

        let Some(value) = self.source_u64(from) else {
            return false;
        };

        let fits = match target.bit_width() {
            8 => value <= u8::MAX as u64,
            16 => value <= u16::MAX as u64,
            32 => value <= u32::MAX as u64,
            _ => true,
        };
        if fits {
            return true;
        }
        self.range_error(from, target)
    }

    fn can_convert_to_float(&mut self, from: &AstNode, target: &Type) -> bool {
        let value = if from.token.kind.is_literal() {
            match parse_f64(&from.token.lexeme) {
                Some(v) => v,
                None => {
                    self.reporter.error_at(
                        ErrorCode::Overflow,
                        &from.token,
                        "Float literal overflows f64",
                    );
                    return false;
                }
            }
        } else {
            from.value.as_f64()
        };

        if target.bit_width() == 32 && !(value >= -(f32::MAX as f64) && value <= f32::MAX as f64) {
            return self.range_error(from, target);
        }
        true
    }

    // === Assignments ===

    fn check_assignment(&mut self, node: &mut AstNode) {
        if !node.data_type.is_array() && node.middle.is_some() {
            let message = format!("'{}' is not an array", node.token.lexeme);
            self.reporter
                .error_at(ErrorCode::ImproperAssignment, &node.token, &message);
        }

        let Some(value_node) = node.left.as_deref_mut() else {
            return;
        };

        // Hex and binary literals only land in unsigned slots.
        if !node.data_type.is_uint()
            && matches!(
                value_node.token.kind,
                TokenKind::HexLiteral | TokenKind::BinaryLiteral
            )
        {
            let message = format!(
                "'{}' cannot be assigned to non-Uint types",
                value_node.token.kind
            );
            self.reporter
                .error_at(ErrorCode::TypeDisagreement, &value_node.token, &message);
        }

        let target = node.data_type.clone();
        if self.type_is_convertible(value_node, &target) {
            if node.data_type.is_string() {
                // Adopt the value's length so the identifier knows its size.
                node.data_type = value_node.data_type.clone();
            }

            // Synchronize the RHS with the slot it lands in; a slot of an
            // array takes the element view.
            let slot_assignment = node.data_type.is_array() && !value_node.data_type.is_array();
            value_node.data_type = node.data_type.clone();
            if slot_assignment {
                value_node.data_type = value_node.data_type.element_type();
            }

            if value_node.kind == NodeKind::Identifier {
                if let Some(s) = self.symbols.retrieve(&value_node.token) {
                    node.value = s.value.clone();
                }
            }
            return;
        }

        if value_node.data_type.is_enum() {
            self.reporter.error_at(
                ErrorCode::ImproperAssignment,
                &node.token,
                "An enum name is not a value",
            );
            return;
        }

        let message = format!(
            "Type disagreement between '{}' ({}) and ({})",
            node.token.lexeme, node.data_type, value_node.data_type
        );
        self.reporter
            .error_at(ErrorCode::TypeDisagreement, &node.token, &message);
    }

    fn check_terse_assignment(&mut self, node: &mut AstNode) {
        let lhs_ty = node
            .left
            .as_deref()
            .map(|n| n.data_type.clone())
            .unwrap_or_default();

        let bitwise_op = matches!(
            node.token.kind,
            TokenKind::BitwiseAndEquals
                | TokenKind::BitwiseOrEquals
                | TokenKind::BitwiseXorEquals
                | TokenKind::BitwiseLeftShiftEquals
                | TokenKind::BitwiseRightShiftEquals
        );

        if bitwise_op && !lhs_ty.is_uint() {
            if let Some(lhs) = node.left.as_deref() {
                let message = format!("Expected UINT, got '{}'", lhs.data_type);
                self.reporter
                    .error_at(ErrorCode::TypeDisagreement, &lhs.token, &message);
            }
        }

        if let Some(rhs) = node.right.as_deref() {
            if !self.type_is_convertible(rhs, &lhs_ty) {
                let message = format!(
                    "Can't convert from type {} to {}",
                    rhs.data_type, lhs_ty
                );
                self.reporter
                    .error_at(ErrorCode::TypeDisagreement, &rhs.token, &message);
            }
        }

        // The result narrows back into the identifier's type.
        node.data_type = lhs_ty;
    }

    fn check_initializer_list(&mut self, node: &mut AstNode) {
        let declared = node.data_type.clone();
        let element_ty = declared.element_type();

        let mut count = 0;
        let mut current = Some(node);
        while let Some(link) = current {
            if let Some(element) = link.left.as_deref_mut() {
                if self.type_is_convertible(element, &element_ty) {
                    // Elements take the array's element type.
                    element.data_type = element_ty.clone();
                } else {
                    let message = format!(
                        "Can't convert from {} to {}",
                        element.data_type, element_ty
                    );
                    self.reporter
                        .error_at(ErrorCode::TypeDisagreement, &element.token, &message);
                }

                count += 1;
                if count > declared.array_size {
                    let message = format!(
                        "Too many elements ({}) in initializer list (array size is {})",
                        count, declared.array_size
                    );
                    self.reporter
                        .error_at(ErrorCode::TooMany, &element.token, &message);
                }
            }
            current = link.right.as_deref_mut();
        }
    }

    // === Operators ===

    fn check_unary(&mut self, node: &mut AstNode) {
        let Some(operand) = node.left.as_deref_mut() else {
            return;
        };

        match node.token.kind {
            TokenKind::LogicalNot => {
                if !operand.data_type.is_bool() {
                    let message = format!("Expected type 'bool', got '{}'", operand.data_type);
                    self.reporter.error_at(
                        ErrorCode::TypeDisagreement,
                        &operand.token,
                        &message,
                    );
                }
                node.data_type = Type::from_token_kind(TokenKind::Bool);
            }
            TokenKind::BitwiseNot => {
                if !operand.data_type.is_uint() {
                    self.reporter.error_at(
                        ErrorCode::TypeDisagreement,
                        &operand.token,
                        "Operand must be of type Uint",
                    );
                }
                node.data_type = operand.data_type.clone();
            }
            TokenKind::Minus => {
                if matches!(
                    operand.token.kind,
                    TokenKind::HexLiteral | TokenKind::BinaryLiteral
                ) {
                    let message =
                        format!("'{}' not allowed with unary '-'", operand.token.kind);
                    self.reporter.error_at(
                        ErrorCode::TypeDisagreement,
                        &operand.token,
                        &message,
                    );
                    return;
                }

                if operand.data_type.is_int() {
                    node.value = Value::int(operand.value.as_i64().wrapping_neg());
                    node.data_type = node.value.ty.clone();
                } else if operand.data_type.is_uint() {
                    // The magnitude reinterpreted as a signed value.
                    let negated = Value::int((operand.value.as_u64() as i64).wrapping_neg());
                    operand.data_type = negated.ty.clone();
                    node.data_type = negated.ty.clone();
                    node.value = negated;
                } else if operand.data_type.is_float() {
                    node.value = Value::float(-operand.value.as_f64());
                    node.data_type = node.value.ty.clone();
                } else {
                    let message = format!(
                        "Expected INT or FLOAT, got '{}' instead",
                        operand.data_type
                    );
                    self.reporter
                        .error_at(ErrorCode::TypeDisagreement, &node.token, &message);
                }
            }
            _ => {}
        }
    }

    fn check_binary_arithmetic(&mut self, node: &mut AstNode) {
        let lhs_ty = node
            .left
            .as_deref()
            .map(|n| n.data_type.clone())
            .unwrap_or_default();
        node.data_type = lhs_ty.clone();

        let Some(rhs) = node.right.as_deref_mut() else {
            return;
        };
        if !self.type_is_convertible(rhs, &lhs_ty) {
            let message = format!(
                "Can't convert from type {} to {}",
                rhs.data_type, lhs_ty
            );
            self.reporter
                .error_at(ErrorCode::TypeDisagreement, &rhs.token, &message);
        }
        rhs.data_type = lhs_ty;
    }

    fn check_binary_logical(&mut self, node: &mut AstNode) {
        let (Some(left), Some(right)) = (node.left.as_deref_mut(), node.right.as_deref_mut())
        else {
            return;
        };

        match node.token.kind {
            TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::LessThanEquals
            | TokenKind::GreaterThanEquals
            | TokenKind::Equality
            | TokenKind::LogicalNotEquals => {
                let relational = !matches!(
                    node.token.kind,
                    TokenKind::Equality | TokenKind::LogicalNotEquals
                );

                if relational {
                    if !left.data_type.is_numeric() {
                        let message =
                            format!("Expected a numeric operand, got '{}'", left.data_type);
                        self.reporter
                            .error_at(ErrorCode::Unexpected, &left.token, &message);
                    }
                    if !right.data_type.is_numeric() {
                        let message =
                            format!("Expected a numeric operand, got '{}'", right.data_type);
                        self.reporter
                            .error_at(ErrorCode::Unexpected, &right.token, &message);
                    }
                }

                // A signed/unsigned mismatch resolves by converting one
                // side to the other where the value allows it.
                if left.data_type.is_int() && right.data_type.is_uint() {
                    let target = left.data_type.clone();
                    if self.type_is_convertible(right, &target) {
                        right.data_type = target;
                    } else {
                        let message = format!(
                            "Can't convert from {} to {}",
                            right.data_type, left.data_type
                        );
                        self.reporter.error_at(
                            ErrorCode::TypeDisagreement,
                            &right.token,
                            &message,
                        );
                    }
                } else if left.data_type.is_uint() && right.data_type.is_int() {
                    let target = right.data_type.clone();
                    if self.type_is_convertible(left, &target) {
                        left.data_type = target;
                    } else {
                        let message = format!(
                            "Can't convert from {} to {}",
                            left.data_type, right.data_type
                        );
                        self.reporter.error_at(
                            ErrorCode::TypeDisagreement,
                            &left.token,
                            &message,
                        );
                    }
                }
            }

            TokenKind::LogicalAnd | TokenKind::LogicalOr => {
                if !left.data_type.is_bool() {
                    let message = format!("Expected BOOL, got '{}'", left.data_type);
                    self.reporter
                        .error_at(ErrorCode::Unexpected, &left.token, &message);
                }
                if !right.data_type.is_bool() {
                    let message = format!("Expected BOOL, got '{}'", right.data_type);
                    self.reporter
                        .error_at(ErrorCode::Unexpected, &right.token, &message);
                }
            }

            _ => {}
        }
        // Comparison results are boolean; the parser stamped that already.
    }

    fn check_binary_bitwise(&mut self, node: &mut AstNode) {
        let (Some(left), Some(right)) = (node.left.as_deref(), node.right.as_deref()) else {
            return;
        };

        if !left.data_type.is_uint() {
            let message = format!("Expected UINT, got '{}'", left.data_type);
            self.reporter
                .error_at(ErrorCode::TypeDisagreement, &left.token, &message);
        }
        if !right.data_type.is_uint() {
            let message = format!("Expected UINT, got '{}'", right.data_type);
            self.reporter
                .error_at(ErrorCode::TypeDisagreement, &right.token, &message);
        }

        // The result takes the wider operand's width.
        node.data_type = if left.data_type.bit_width() >= right.data_type.bit_width() {
            left.data_type.clone()
        } else {
            right.data_type.clone()
        };
    }

    fn check_ternary(&mut self, node: &mut AstNode) {
        if let Some(condition) = node.left.as_deref() {
            if !condition.data_type.is_bool() {
                let message = format!("Expected BOOL, got '{}'", condition.data_type);
                self.reporter
                    .error_at(ErrorCode::Unexpected, &condition.token, &message);
            }
        }

        let then_ty = node
            .middle
            .as_deref()
            .map(|n| n.data_type.clone())
            .unwrap_or_default();
        if let Some(else_branch) = node.right.as_deref() {
            if !self.type_is_convertible(else_branch, &then_ty) {
                let message = format!(
                    "Ternary branches disagree: {} vs {}",
                    then_ty, else_branch.data_type
                );
                self.reporter.error_at(
                    ErrorCode::TypeDisagreement,
                    &else_branch.token,
                    &message,
                );
            }
        }
        node.data_type = then_ty;
    }

    // === Enums ===

    fn check_enum(&mut self, node: &mut AstNode) {
        let mut implicit: i64 = 0;
        let mut current = node.left.as_deref_mut();

        while let Some(link) = current {
            if let Some(entry) = link.left.as_deref_mut() {
                match entry.kind {
                    NodeKind::EnumAssignment => {
                        if let Some(expr) = entry.left.as_deref_mut() {
                            self.check_recurse(expr);

                            let integral =
                                expr.data_type.is_int() || expr.data_type.is_uint();
                            if !integral || expr.kind == NodeKind::Identifier {
                                self.reporter.error_at(
                                    ErrorCode::ImproperAssignment,
                                    &expr.token,
                                    "Assignment to enum identifier must be of type INT",
                                );
                            }

                            let value = Value::int(expr.value.as_i64());
                            implicit = value.as_i64() + 1;
                            entry.data_type = value.ty.clone();
                            entry.value = value.clone();
                            self.symbols.set_value(&entry.token, value);
                        }
                    }
                    NodeKind::EnumEntry => {
                        let value = Value::int(implicit);
                        implicit += 1;
                        entry.data_type = value.ty.clone();
                        entry.value = value.clone();
                        self.symbols.set_value(&entry.token, value);
                    }
                    _ => {}
                }
            }
            current = link.right.as_deref_mut();
        }
    }

    // === Structs ===

    fn check_struct_member(&mut self, node: &mut AstNode) {
        let Some(owner) = node.right.as_deref() else {
            return;
        };

        let member_ty = self
            .symbols
            .retrieve(&owner.token)
            .and_then(|s| s.ty().find_member(&node.token.lexeme))
            .map(|m| m.ty.clone());

        if let Some(mut ty) = member_ty {
            if node
                .middle
                .as_deref()
                .is_some_and(|m| m.kind == NodeKind::ArraySubscript)
            {
                if ty.is_string() {
                    ty = Type::from_token_kind(TokenKind::Char);
                } else if ty.is_array() {
                    ty = ty.element_type();
                }
            }
            node.data_type = ty;
        }
    }

    // === Functions ===

    fn check_return(&mut self, node: &mut AstNode) {
        if node.data_type.is_void() {
            return;
        }
        if let Some(operand) = node.left.as_deref() {
            node.data_type = operand.data_type.clone();
        }
    }

    /// Verify every path through a function body ends in a compatible
    /// return, and that nothing follows a taken return.
    fn check_function(&mut self, node: &mut AstNode) {
        let return_ty = node
            .left
            .as_deref()
            .map(|n| n.data_type.clone())
            .unwrap_or_default();

        let Some(body) = node.right.as_deref() else {
            return;
        };

        let mut check = Some(body);
        while let Some(link) = check {
            if let Some(statement) = link.left.as_deref() {
                if statement.is_loop_or_branch() {
                    self.check_nested_returns(statement, &return_ty);
                }

                if statement.is_return() {
                    if self.type_is_convertible(statement, &return_ty) {
                        if let Some(rest) = link.right.as_deref() {
                            if !rest.is_dead_end() {
                                let at = rest
                                    .left
                                    .as_deref()
                                    .map(|n| n.token.clone())
                                    .unwrap_or_else(|| node.token.clone());
                                self.reporter.error_at(
                                    ErrorCode::UnreachableCode,
                                    &at,
                                    "Unreachable code after return",
                                );
                            }
                        }
                        return;
                    } else if statement.data_type.is_void() {
                        // The implicit void return the parser inserts
                        // into an empty body; the missing-return error
                        // below does the reporting.
                    } else {
                        let message = format!(
                            "{}(): can't convert from return type {} to {}",
                            node.token.lexeme, statement.data_type, return_ty
                        );
                        self.reporter.error_at(
                            ErrorCode::TypeDisagreement,
                            &statement.token,
                            &message,
                        );
                    }
                }
            }

            check = link.right.as_deref().filter(|rest| !rest.is_dead_end());
        }

        if !return_ty.is_void() {
            let message = format!("Function '{}' is missing a return", node.token.lexeme);
            self.reporter
                .error_at(ErrorCode::MissingReturn, &node.token, &message);
        }
    }

    fn check_nested_returns(&mut self, node: &AstNode, return_ty: &Type) {
        let mut current = Some(node);
        while let Some(link) = current {
            if let Some(left) = link.left.as_deref() {
                if left.is_loop_or_branch() {
                    self.check_nested_returns(left, return_ty);
                }
            }
            if let Some(middle) = link.middle.as_deref() {
                if middle.is_loop_or_branch() || middle.is_chain() {
                    self.check_nested_returns(middle, return_ty);
                }
            }

            if let Some(statement) = link.left.as_deref() {
                if statement.is_return() && !self.type_is_convertible(statement, return_ty) {
                    let message = format!(
                        "Can't convert from {} to {}",
                        statement.data_type, return_ty
                    );
                    self.reporter.error_at(
                        ErrorCode::TypeDisagreement,
                        &statement.token,
                        &message,
                    );
                }
            }

            current = link.right.as_deref().filter(|rest| !rest.is_dead_end());
        }
    }

    /// Arity and argument types against the registered parameter list.
    fn check_function_call(&mut self, node: &mut AstNode) {
        let fn_ty = self
            .symbols
            .retrieve(&node.token)
            .map(|s| s.ty().clone())
            .unwrap_or_else(|| node.data_type.clone());

        let mut argument = node.middle.as_deref();
        for param in &fn_ty.params {
            match argument {
                None => {
                    let message = format!(
                        "{}(): missing '{}' argument",
                        node.token.lexeme, param.token.lexeme
                    );
                    self.reporter
                        .error_at(ErrorCode::TooFew, &node.token, &message);
                    break;
                }
                Some(arg) => {
                    if !self.type_is_convertible(arg, &param.ty) {
                        let message = format!(
                            "{}(): can't convert argument '{}' from {} to {}",
                            node.token.lexeme, arg.token.lexeme, arg.data_type, param.ty
                        );
                        self.reporter.error_at(
                            ErrorCode::TypeDisagreement,
                            &arg.token,
                            &message,
                        );
                    }
                    argument = arg.right.as_deref();
                }
            }
        }

        if let Some(extra) = argument {
            let message = format!("{}(): too many arguments", node.token.lexeme);
            self.reporter
                .error_at(ErrorCode::TooMany, &extra.token, &message);
        }

        // The call produces a plain value of the declared return type.
        node.data_type = Type {
            specifier: fn_ty.specifier,
            ..Type::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::types::TypeSpecifier;
    use crate::value::Payload;

    fn check(source: &str) -> (AstNode, SymbolTable, ErrorCode) {
        let mut reporter = Reporter::new("test.txt", source).quiet();
        let parser = Parser::new(source, &mut reporter);
        let (mut ast, mut symbols) = parser.build_ast();
        TypeChecker::new(&mut symbols, &mut reporter).check(&mut ast);
        (ast, symbols, reporter.latched())
    }

    fn check_code(source: &str) -> ErrorCode {
        check(source).2
    }

    #[test]
    fn test_literal_shrinks_to_minimal_type() {
        let (ast, _, code) = check("i64 x = 5;");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().next().unwrap();
        let literal = assignment.left.as_ref().unwrap();
        assert_eq!(literal.data_type.specifier, TypeSpecifier::I8);
        assert_eq!(literal.value.payload, Payload::Int(5));
    }

    #[test]
    fn test_i8_boundaries() {
        assert_eq!(check_code("i8 check = 127;"), ErrorCode::Ok);
        assert_eq!(check_code("i8 check = 128;"), ErrorCode::TypeDisagreement);
        assert_eq!(check_code("i8 check = -128;"), ErrorCode::Ok);
    }

    #[test]
    fn test_i64_overflow() {
        assert_eq!(check_code("i64 check = 9223372036854775807;"), ErrorCode::Ok);
        assert_eq!(
            check_code("i64 check = 9223372036854775808;"),
            ErrorCode::Overflow
        );
    }

    #[test]
    fn test_hex_range_against_target() {
        assert_eq!(check_code("u8 check = 0xFF;"), ErrorCode::Ok);
        assert_eq!(check_code("u8 check = 0x1FF;"), ErrorCode::TypeDisagreement);
    }

    #[test]
    fn test_hex_requires_unsigned_target() {
        assert_eq!(check_code("i8 check = 0x01;"), ErrorCode::TypeDisagreement);
        assert_eq!(check_code("u64 check = 0xFF;"), ErrorCode::Ok);
    }

    #[test]
    fn test_bool_is_not_numeric() {
        assert_eq!(check_code("bool check = 2;"), ErrorCode::TypeDisagreement);
        assert_eq!(check_code("bool check = true;"), ErrorCode::Ok);
    }

    #[test]
    fn test_string_into_char_rejected() {
        assert_eq!(
            check_code("char check = \"a\";"),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_float_shrink_prefers_f32() {
        let (ast, _, code) =
            check("f32 check = 340282346638528859811704183484516925440.000000;");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().next().unwrap();
        let literal = assignment.left.as_ref().unwrap();
        assert_eq!(literal.data_type.specifier, TypeSpecifier::F32);
    }

    #[test]
    fn test_float_wider_than_f32_needs_f64() {
        assert_eq!(
            check_code("f32 check = 440282346638528859811704183484516925440.0;"),
            ErrorCode::TypeDisagreement
        );
        assert_eq!(
            check_code("f64 check = 440282346638528859811704183484516925440.0;"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_identifier_requires_exact_specifier() {
        assert_eq!(check_code("i64 a = 10; i64 b = a;"), ErrorCode::Ok);
        assert_eq!(
            check_code("i64 a = 10; i8 b = a;"),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_enum_value_propagation() {
        let (_, symbols, code) = check("enum Nums { Zero, One, Two };");
        assert_eq!(code, ErrorCode::Ok);

        let two = symbols.retrieve_by_name("Two").unwrap();
        assert_eq!(two.value.payload, Payload::Int(2));
        assert_eq!(two.value.ty.specifier, TypeSpecifier::I8);
    }

    #[test]
    fn test_enum_explicit_value_resets_counter() {
        let (_, symbols, code) = check("enum E { A = 5, B, C = -2, D };");
        assert_eq!(code, ErrorCode::Ok);

        assert_eq!(symbols.retrieve_by_name("B").unwrap().value.payload, Payload::Int(6));
        assert_eq!(symbols.retrieve_by_name("C").unwrap().value.payload, Payload::Int(-2));
        assert_eq!(symbols.retrieve_by_name("D").unwrap().value.payload, Payload::Int(-1));
    }

    #[test]
    fn test_enum_rejects_non_integer_values() {
        assert_eq!(
            check_code("enum E { A = 3.0 };"),
            ErrorCode::ImproperAssignment
        );
        assert_eq!(
            check_code("enum E { A = false };"),
            ErrorCode::ImproperAssignment
        );
        assert_eq!(
            check_code("i64 x = 1; enum E { A = x };"),
            ErrorCode::ImproperAssignment
        );
    }

    #[test]
    fn test_enum_member_assignment() {
        assert_eq!(check_code("enum Nums { Zero, One, Two }; i8 i = Two;"), ErrorCode::Ok);
    }

    #[test]
    fn test_logical_ops_require_bool() {
        assert_eq!(
            check_code("bool check = (true && (false || true) && !false);"),
            ErrorCode::Ok
        );
        assert_eq!(check_code("bool check = (1 && true);"), ErrorCode::Unexpected);
        assert_eq!(check_code("bool check = !5;"), ErrorCode::TypeDisagreement);
    }

    #[test]
    fn test_comparison_sign_resolution() {
        // A literal on the unsigned side converts over to the signed side.
        assert_eq!(
            check_code("i64 a = 10; bool check = (a > 0x05);"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_bitwise_requires_unsigned() {
        assert_eq!(
            check_code("u8 a = 0x0F; u8 b = 0xF0; u8 c = a | b;"),
            ErrorCode::Ok
        );
        assert_eq!(
            check_code("i8 a = 1; i8 b = 2; i8 c = a | b;"),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_bitwise_result_takes_wider_width() {
        let (ast, _, code) = check("u8 a = 0x01; u32 b = 0x1FFFF; u32 c = a | b;");
        assert_eq!(code, ErrorCode::Ok);

        let assignment = ast.chain_statements().nth(2).unwrap();
        let or_node = assignment.left.as_ref().unwrap();
        assert_eq!(or_node.data_type.specifier, TypeSpecifier::U32);
    }

    #[test]
    fn test_unary_minus_on_unsigned_reinterprets() {
        let (ast, _, code) = check("i8 x = -0; i64 y = -10;");
        assert_eq!(code, ErrorCode::Ok);
        let assignment = ast.chain_statements().nth(1).unwrap();
        let negation = assignment.left.as_ref().unwrap();
        assert_eq!(negation.value.payload, Payload::Int(-10));
    }

    #[test]
    fn test_unary_minus_rejects_hex() {
        assert_eq!(check_code("u8 x = -0xFF;"), ErrorCode::TypeDisagreement);
    }

    #[test]
    fn test_bitwise_not_requires_unsigned() {
        assert_eq!(check_code("u8 a = 0x0F; u8 b = ~a;"), ErrorCode::Ok);
        assert_eq!(check_code("i8 a = 1; i8 b = ~a;"), ErrorCode::TypeDisagreement);
    }

    #[test]
    fn test_missing_return() {
        assert_eq!(
            check_code("f() :: i64 { i64 x = 1; }"),
            ErrorCode::MissingReturn
        );
        assert_eq!(check_code("f() :: i64 { return 1; }"), ErrorCode::Ok);
        assert_eq!(check_code("f() :: void { }"), ErrorCode::Ok);
    }

    #[test]
    fn test_unreachable_code_after_return() {
        assert_eq!(
            check_code("f() :: i64 { return 1; i64 x = 2; }"),
            ErrorCode::UnreachableCode
        );
    }

    #[test]
    fn test_return_type_must_convert() {
        assert_eq!(
            check_code("f() :: i64 { return 1.5; }"),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_nested_return_checked() {
        assert_eq!(
            check_code("f(i64 a) :: i64 { if (a > 1) { return 1.5; } return 1; }"),
            ErrorCode::TypeDisagreement
        );
        assert_eq!(
            check_code("f(i64 a) :: i64 { if (a > 1) { return 2; } return 1; }"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_call_arity_checking() {
        let source = "add(i64 a, i64 b) :: i64 { return a + b; }";
        assert_eq!(check_code(&format!("{} add(1, 2);", source)), ErrorCode::Ok);
        assert_eq!(check_code(&format!("{} add(1);", source)), ErrorCode::TooFew);
        assert_eq!(
            check_code(&format!("{} add(1, 2, 3);", source)),
            ErrorCode::TooMany
        );
    }

    #[test]
    fn test_call_argument_types() {
        let source = "add(i64 a, i64 b) :: i64 { return a + b; }";
        assert_eq!(
            check_code(&format!("{} add(1.5, 2);", source)),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_call_result_assignment() {
        assert_eq!(
            check_code("one() :: i64 { return 1; } i64 x = one();"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_initializer_list_elements_checked() {
        assert_eq!(check_code("u8[3] xs; xs = { 1, 2, 3 };"), ErrorCode::Ok);
        assert_eq!(
            check_code("u8[3] xs; xs = { 1, 2, 300 };"),
            ErrorCode::TypeDisagreement
        );
        assert_eq!(
            check_code("u8[2] xs; xs = { 1, 2, 3 };"),
            ErrorCode::TooMany
        );
    }

    #[test]
    fn test_string_adopts_length() {
        let (_, symbols, code) = check("string s = \"hello\";");
        assert_eq!(code, ErrorCode::Ok);
        assert!(symbols.retrieve_by_name("s").unwrap().ty().is_string());
    }

    #[test]
    fn test_string_subscript_yields_char() {
        assert_eq!(
            check_code("string s = \"hello\"; char c = s[1];"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_array_subscript_yields_element_type() {
        assert_eq!(
            check_code("u8[3] xs; xs = { 1, 2, 3 }; u8 x = xs[0];"),
            ErrorCode::Ok
        );
    }

    #[test]
    fn test_struct_member_type() {
        assert_eq!(
            check_code("struct T { f32 f = 4.5; } f32 check = T.f;"),
            ErrorCode::Ok
        );
        assert_eq!(
            check_code("struct T { f32 f = 4.5; } bool check = T.f;"),
            ErrorCode::TypeDisagreement
        );
    }

    #[test]
    fn test_terse_assignment_types() {
        assert_eq!(check_code("i64 x = 10; x += 5;"), ErrorCode::Ok);
        assert_eq!(
            check_code("i64 x = 10; x += 1.5;"),
            ErrorCode::TypeDisagreement
        );
        assert_eq!(
            check_code("i64 x = 10; x |= 1;"),
            ErrorCode::TypeDisagreement
        );
        assert_eq!(check_code("u8 x = 0x01; x |= 0x02;"), ErrorCode::Ok);
    }

    #[test]
    fn test_ternary_branch_types() {
        assert_eq!(
            check_code("bool t = true; i64 x = (t) ? 1 : 2;"),
            ErrorCode::Ok
        );
        assert_eq!(
            check_code("i64 a = 1; i64 x = (a) ? 1 : 2;"),
            ErrorCode::Unexpected
        );
    }
}
