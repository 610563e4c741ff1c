use std::rc::Rc;

use tamarin_lexer::{Lexer, Token, TokenKind};

use crate::chunk::Chunk;
use crate::error::CompileError;
use crate::object::LoxFunction;
use crate::opcode::Op;
use crate::value::{Obj, Value};

/// Precedence levels, strictly increasing. `parse_precedence` only descends
/// into an infix handler whose rule's precedence is at least the level it
/// was called with, which is what makes binary operators left-associative
/// (`compile_binary` recurses one level higher than its own rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn = fn(&mut Parser, bool);

struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

impl ParseRule {
    fn none() -> ParseRule {
        ParseRule { prefix: None, infix: None, precedence: Precedence::None }
    }
}

/// Dense table of parse rules, one per token-kind case. Built as a `match`
/// rather than an array indexed by discriminant because several `TokenKind`
/// variants carry payload (`Number(f64)`, `Error(String)`); the match is
/// still exhaustive over every case exactly once, which is what a table
/// lookup buys you.
fn get_rule(kind: &TokenKind) -> ParseRule {
    use TokenKind::*;
    match kind {
        LeftParen => ParseRule { prefix: Some(Parser::grouping), infix: Some(Parser::call), precedence: Precedence::Call },
        Dot => ParseRule { prefix: None, infix: Some(Parser::dot), precedence: Precedence::Call },
        Minus => ParseRule { prefix: Some(Parser::unary), infix: Some(Parser::binary), precedence: Precedence::Term },
        Plus => ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Term },
        Slash => ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Factor },
        Star => ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Factor },
        Bang => ParseRule { prefix: Some(Parser::unary), infix: None, precedence: Precedence::None },
        BangEqual => ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Equality },
        EqualEqual => ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Equality },
        Greater | GreaterEqual | Less | LessEqual => {
            ParseRule { prefix: None, infix: Some(Parser::binary), precedence: Precedence::Comparison }
        }
        Identifier => ParseRule { prefix: Some(Parser::variable), infix: None, precedence: Precedence::None },
        String => ParseRule { prefix: Some(Parser::string), infix: None, precedence: Precedence::None },
        Number(_) => ParseRule { prefix: Some(Parser::number), infix: None, precedence: Precedence::None },
        And => ParseRule { prefix: None, infix: Some(Parser::and_), precedence: Precedence::And },
        Or => ParseRule { prefix: None, infix: Some(Parser::or_), precedence: Precedence::Or },
        False | True | Nil => ParseRule { prefix: Some(Parser::literal), infix: None, precedence: Precedence::None },
        Super => ParseRule { prefix: Some(Parser::super_), infix: None, precedence: Precedence::None },
        This => ParseRule { prefix: Some(Parser::this_), infix: None, precedence: Precedence::None },
        RightParen | LeftBrace | RightBrace | Comma | Semicolon | Equal | Class | Else | For
        | Fun | If | Var | While | Print | Return | Eof | Error(_) => ParseRule::none(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

struct Local {
    name: String,
    depth: i32,
}

/// Per-function compile-time state. `enclosing` holds the parent compiler
/// for the duration of this one's compilation and nothing longer — pushed
/// in `Parser::push_compiler`, taken back out in `Parser::end_compiler`.
struct CompilerState {
    enclosing: Option<Box<CompilerState>>,
    locals: Vec<Local>,
    scope_depth: i32,
    chunk: Chunk,
    arity: u8,
    func_type: FunctionType,
    name: Option<Rc<str>>,
}

impl CompilerState {
    fn new(func_type: FunctionType, name: Option<Rc<str>>) -> CompilerState {
        let reserved = match func_type {
            FunctionType::Method | FunctionType::Initializer => "this",
            FunctionType::Function | FunctionType::Script => "",
        };
        CompilerState {
            enclosing: None,
            locals: vec![Local { name: reserved.to_string(), depth: 0 }],
            scope_depth: 0,
            chunk: Chunk::new(),
            arity: 0,
            func_type,
            name,
        }
    }
}

/// Compile-time stack tracking nested class bodies, independent of runtime
/// classes — it exists only so `this`/`super` can be validated.
struct ClassCompilerFrame {
    has_superclass: bool,
}

/// Drives the scanner one token at a time and emits bytecode directly as it
/// parses — there is no intermediate syntax tree at any point.
struct Parser {
    lexer: Lexer,
    previous: Token,
    current: Token,
    had_error: bool,
    panic_mode: bool,
    too_many_constants: bool,
    compiler: CompilerState,
    class_compilers: Vec<ClassCompilerFrame>,
}

/// Compiles `source` into a top-level function ready for `Vm::run`.
/// Returns `Err(CompileError::TooManyConstants)` if a chunk's constant pool
/// overflowed the 3-byte index space, `Err(CompileError::HadError)` if any
/// other compile error was reported; callers never get a partially-usable
/// chunk back.
pub fn compile(source: &str) -> Result<Rc<LoxFunction>, CompileError> {
    let _span = tracing::debug_span!("compile").entered();
    let mut parser = Parser::new(source);
    parser.advance();
    while !parser.check(TokenKind::Eof) {
        parser.declaration();
    }
    parser.consume(TokenKind::Eof, "Expect end of expression.");
    parser.emit_return();

    if parser.too_many_constants {
        return Err(CompileError::TooManyConstants);
    }
    if parser.had_error {
        return Err(CompileError::HadError);
    }

    let CompilerState { chunk, arity, name, .. } = parser.compiler;
    Ok(Rc::new(LoxFunction::new(name, arity, chunk)))
}

impl Parser {
    fn new(source: &str) -> Parser {
        let placeholder = Token::new(TokenKind::Eof, "", 0);
        Parser {
            lexer: Lexer::new(source),
            previous: placeholder.clone(),
            current: placeholder,
            had_error: false,
            panic_mode: false,
            too_many_constants: false,
            compiler: CompilerState::new(FunctionType::Script, None),
            class_compilers: Vec::new(),
        }
    }

    // ---- token stream plumbing ----

    fn advance(&mut self) {
        self.previous = self.current.clone();
        loop {
            self.current = self.lexer.scan_token();
            if let TokenKind::Error(message) = self.current.kind.clone() {
                self.error_at_current(&message);
                continue;
            }
            break;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(&kind)
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.report(&token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous.clone();
        self.report(&token, message);
    }

    fn report(&mut self, token: &Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let location = match &token.kind {
            TokenKind::Eof => " at end".to_string(),
            TokenKind::Error(_) => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        eprintln!("[line {}] Error{}: {}", token.line, location, message);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::Eof) {
            if matches!(self.previous.kind, TokenKind::Semicolon) {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ---- emission helpers ----

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.compiler.chunk
    }

    fn emit_op(&mut self, op: Op) {
        let line = self.previous.line;
        self.current_chunk().write_op(op, line);
    }

    fn emit_bytes(&mut self, op: Op, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write_op(op, line);
        self.current_chunk().write_u8(byte, line);
    }

    fn emit_return(&mut self) {
        if self.compiler.func_type == FunctionType::Initializer {
            self.emit_index(Op::GetLocal, Op::GetLocalLong, 0);
        } else {
            self.emit_op(Op::Nil);
        }
        self.emit_op(Op::Return);
    }

    fn make_constant(&mut self, value: Value) -> usize {
        let idx = self.current_chunk().add_constant(value);
        if idx > 0xff_ffff {
            self.too_many_constants = true;
            self.error("Too many constants in one chunk.");
            return 0;
        }
        idx
    }

    fn identifier_constant(&mut self, name: &str) -> usize {
        self.make_constant(Value::string(name))
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_index(Op::Constant, Op::ConstantLong, idx);
    }

    /// Emits `short_op idx` when `idx` fits a byte, `long_op idx` (3-byte
    /// little-endian) otherwise — the single decision point every
    /// constant/local/global-indexed opcode pair goes through.
    fn emit_index(&mut self, short_op: Op, long_op: Op, idx: usize) {
        let line = self.previous.line;
        if idx < 256 {
            self.current_chunk().write_op(short_op, line);
            self.current_chunk().write_u8(idx as u8, line);
        } else {
            self.current_chunk().write_op(long_op, line);
            self.current_chunk().write_u24(idx, line);
        }
    }

    fn emit_jump(&mut self, op: Op) -> usize {
        self.emit_op(op);
        let line = self.previous.line;
        self.current_chunk().write_placeholder_u16(line)
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk().len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        self.current_chunk().patch_u16(offset, jump as u16);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(Op::Loop);
        let offset = self.current_chunk().len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        let line = self.previous.line;
        let bytes = (offset as u16).to_be_bytes();
        self.current_chunk().write_u8(bytes[0], line);
        self.current_chunk().write_u8(bytes[1], line);
    }

    // ---- nested compiler lifetime ----

    fn push_compiler(&mut self, func_type: FunctionType, name: Option<Rc<str>>) {
        let new_state = CompilerState::new(func_type, name);
        let parent = std::mem::replace(&mut self.compiler, new_state);
        self.compiler.enclosing = Some(Box::new(parent));
    }

    fn end_compiler(&mut self) -> LoxFunction {
        self.emit_return();
        let enclosing = self.compiler.enclosing.take().expect("end_compiler on root compiler");
        let finished = std::mem::replace(&mut self.compiler, *enclosing);
        LoxFunction::new(finished.name, finished.arity, finished.chunk)
    }

    // ---- locals & scopes ----

    fn begin_scope(&mut self) {
        self.compiler.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.compiler.scope_depth -= 1;
        while let Some(local) = self.compiler.locals.last() {
            if local.depth > self.compiler.scope_depth {
                self.emit_op(Op::Pop);
                self.compiler.locals.pop();
            } else {
                break;
            }
        }
    }

    fn add_local(&mut self, name: String) {
        self.compiler.locals.push(Local { name, depth: -1 });
    }

    fn declare_variable(&mut self) {
        if self.compiler.scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();
        let mut duplicate = false;
        for local in self.compiler.locals.iter().rev() {
            if local.depth != -1 && local.depth < self.compiler.scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    fn mark_initialized(&mut self) {
        if self.compiler.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.compiler.locals.last_mut() {
            local.depth = self.compiler.scope_depth;
        }
    }

    fn parse_variable(&mut self, message: &str) -> usize {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.compiler.scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    fn define_variable(&mut self, global: usize) {
        if self.compiler.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_index(Op::DefineGlobal, Op::DefineGlobalLong, global);
    }

    fn resolve_local(&mut self, name: &str) -> Option<usize> {
        for (i, local) in self.compiler.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(i);
            }
        }
        None
    }

    fn named_variable(&mut self, name: String, can_assign: bool) {
        let (get_short, get_long, set_short, set_long, idx) =
            if let Some(slot) = self.resolve_local(&name) {
                (Op::GetLocal, Op::GetLocalLong, Op::SetLocal, Op::SetLocalLong, slot)
            } else {
                let idx = self.identifier_constant(&name);
                (Op::GetGlobal, Op::GetGlobalLong, Op::SetGlobal, Op::SetGlobalLong, idx)
            };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_index(set_short, set_long, idx);
        } else {
            self.emit_index(get_short, get_long, idx);
        }
    }

    // ---- expressions ----

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix_rule) = get_rule(&self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix_rule(self, can_assign);

        while precedence <= get_rule(&self.current.kind).precedence {
            self.advance();
            let infix_rule =
                get_rule(&self.previous.kind).infix.expect("token with precedence has an infix rule");
            infix_rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        if let TokenKind::Number(value) = self.previous.kind {
            self.emit_constant(Value::Number(value));
        }
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = &self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        self.emit_constant(Value::string(contents));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(Op::False),
            TokenKind::True => self.emit_op(Op::True),
            TokenKind::Nil => self.emit_op(Op::Nil),
            _ => unreachable!("literal() called on a non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.clone();
        self.named_variable(name, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind.clone();
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(Op::Negate),
            TokenKind::Bang => self.emit_op(Op::Not),
            _ => unreachable!("unary() called on a non-unary-operator token"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind.clone();
        let rule_precedence = get_rule(&operator).precedence;
        self.parse_precedence(rule_precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(Op::Add),
            TokenKind::Minus => self.emit_op(Op::Subtract),
            TokenKind::Star => self.emit_op(Op::Multiply),
            TokenKind::Slash => self.emit_op(Op::Divide),
            TokenKind::EqualEqual => self.emit_op(Op::Equal),
            TokenKind::BangEqual => {
                self.emit_op(Op::Equal);
                self.emit_op(Op::Not);
            }
            TokenKind::Greater => self.emit_op(Op::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(Op::Less);
                self.emit_op(Op::Not);
            }
            TokenKind::Less => self.emit_op(Op::Less),
            TokenKind::LessEqual => {
                self.emit_op(Op::Greater);
                self.emit_op(Op::Not);
            }
            _ => unreachable!("binary() called on a non-binary-operator token"),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(Op::JumpIfFalse);
        let end_jump = self.emit_jump(Op::Jump);
        self.patch_jump(else_jump);
        self.emit_op(Op::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_bytes(Op::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u32 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme.clone();
        let idx = self.identifier_constant(&name);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_index(Op::SetProperty, Op::SetPropertyLong, idx);
        } else {
            self.emit_index(Op::GetProperty, Op::GetPropertyLong, idx);
        }
    }

    fn this_(&mut self, _can_assign: bool) {
        if self.class_compilers.is_empty() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }
        self.named_variable("this".to_string(), false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.class_compilers.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.class_compilers.last().unwrap().has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }
        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let name = self.previous.lexeme.clone();
        let idx = self.identifier_constant(&name);
        self.named_variable("this".to_string(), false);
        self.named_variable("super".to_string(), false);
        self.emit_index(Op::GetSuper, Op::GetSuperLong, idx);
    }

    // ---- statements ----

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(Op::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(Op::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.statement();

        let else_jump = self.emit_jump(Op::Jump);
        self.patch_jump(then_jump);
        self.emit_op(Op::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(Op::JumpIfFalse);
        self.emit_op(Op::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(Op::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.match_token(TokenKind::Semicolon) {
            // no initializer clause
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().len();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(Op::JumpIfFalse));
            self.emit_op(Op::Pop);
        }

        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(Op::Jump);
            let increment_start = self.current_chunk().len();
            self.expression();
            self.emit_op(Op::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(Op::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.compiler.func_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.compiler.func_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(Op::Return);
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(Op::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, func_type: FunctionType) {
        let name = self.previous.lexeme.clone();
        self.push_compiler(func_type, Some(Rc::from(name.as_str())));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.compiler.arity == 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                self.compiler.arity = self.compiler.arity.saturating_add(1);
                let param = self.parse_variable("Expect parameter name.");
                self.define_variable(param);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        let function = self.end_compiler();
        let idx = self.make_constant(Value::Object(Obj::Function(Rc::new(function))));
        self.emit_index(Op::Constant, Op::ConstantLong, idx);
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let name = self.previous.lexeme.clone();
        let idx = self.identifier_constant(&name);
        let func_type = if name == "init" { FunctionType::Initializer } else { FunctionType::Method };
        self.function(func_type);
        self.emit_index(Op::Method, Op::MethodLong, idx);
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous.lexeme.clone();
        let name_const = self.identifier_constant(&class_name);
        self.declare_variable();

        self.emit_index(Op::Class, Op::ClassLong, name_const);
        self.define_variable(name_const);

        self.class_compilers.push(ClassCompilerFrame { has_superclass: false });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            let super_name = self.previous.lexeme.clone();
            if super_name == class_name {
                self.error("A class can't inherit from itself.");
            }
            self.named_variable(super_name, false);

            self.begin_scope();
            self.add_local("super".to_string());
            self.define_variable(0);

            self.named_variable(class_name.clone(), false);
            self.emit_op(Op::Inherit);
            self.class_compilers.last_mut().unwrap().has_superclass = true;
        }

        self.named_variable(class_name, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_op(Op::Pop);

        if self.class_compilers.last().unwrap().has_superclass {
            self.end_scope();
        }
        self.class_compilers.pop();
    }
}
