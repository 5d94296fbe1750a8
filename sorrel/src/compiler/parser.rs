use std::rc::Rc;

use crate::common::heap::{FunObj, Handle, Heap, Object};
use crate::common::opcode::Opcode;
use crate::common::source::Source;
use crate::common::span::Span;
use crate::common::value::Value;
use crate::compiler::error::{ErrorContext, SyntaxError};
use crate::compiler::scanner::Scanner;
use crate::compiler::token::{Token, TokenKind};

/// Lowest to highest binding power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . () []
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
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'a> = fn(&mut Parser<'a>, bool);

struct ParseRule<'a> {
    prefix: Option<ParseFn<'a>>,
    infix: Option<ParseFn<'a>>,
    precedence: Precedence,
}

fn get_rule<'a>(kind: &TokenKind) -> ParseRule<'a> {
    use TokenKind::*;

    let (prefix, infix, precedence): (Option<ParseFn<'a>>, Option<ParseFn<'a>>, Precedence) =
        match kind {
            LeftParen => (Some(Parser::grouping), Some(Parser::call), Precedence::Call),
            LeftBracket => (Some(Parser::map), Some(Parser::index), Precedence::Call),
            Dot => (None, Some(Parser::dot), Precedence::Call),

            Minus => (Some(Parser::unary), Some(Parser::binary), Precedence::Term),
            Plus => (None, Some(Parser::binary), Precedence::Term),
            Slash | Star => (None, Some(Parser::binary), Precedence::Factor),

            Bang => (Some(Parser::unary), None, Precedence::None),
            BangEqual | EqualEqual => (None, Some(Parser::binary), Precedence::Equality),
            Greater | GreaterEqual | Less | LessEqual => {
                (None, Some(Parser::binary), Precedence::Comparison)
            }

            Ident => (Some(Parser::variable), None, Precedence::None),
            Str => (Some(Parser::string), None, Precedence::None),
            Number => (Some(Parser::number), None, Precedence::None),

            And => (None, Some(Parser::and), Precedence::And),
            Or => (None, Some(Parser::or), Precedence::Or),
            False | Nil | True => (Some(Parser::literal), None, Precedence::None),

            _ => (None, None, Precedence::None),
        };

    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Script,
    Function,
}

struct Local {
    name: Token,
    /// `-1` until the declaring statement completes, which is what
    /// makes `var x = x;` detectable.
    depth: i32,
}

/// One function being compiled. The innermost is the last element of
/// the parser's `frames` vector.
struct Frame {
    fun: FunObj,
    kind: FrameKind,
    locals: Vec<Local>,
    scope_depth: i32,
}

impl Frame {
    fn new(kind: FrameKind, name: Option<Handle>) -> Frame {
        Frame {
            fun: FunObj {
                arity: 0,
                chunk: Default::default(),
                name,
            },
            kind,
            locals: vec![Local {
                // Slot zero belongs to the callee itself.
                name: Token::empty(),
                depth: 0,
            }],
            scope_depth: 0,
        }
    }
}

const MAX_LOCALS: usize = 256;
const MAX_ARGS: u8 = 32;
const MAX_PRINT_ARGS: u8 = 32;

/// Single-pass parser and code generator. Each grammar production
/// emits bytecode as it parses; there is no syntax tree.
pub struct Parser<'a> {
    heap: &'a mut Heap,
    scanner: Scanner,
    frames: Vec<Frame>,
    current: Token,
    previous: Token,
    // Expression-statement bookkeeping; see `expression_statement`.
    sub_exprs: usize,
    had_call: bool,
    had_assign: bool,
    // Eval mode: keep top-level expression values so the last one
    // becomes the script's result.
    repl: bool,
    has_result: bool,
    panic_mode: bool,
    errors: Vec<SyntaxError>,
}

/// Compile a whole source to a function object in `heap`. Any error
/// means no function is produced, but parsing continues past errors so
/// every independent one is reported.
pub fn compile(heap: &mut Heap, source: &Rc<Source>) -> Result<Handle, Vec<SyntaxError>> {
    compile_with(heap, source, false)
}

/// Like [`compile`], but in eval mode: a top-level expression
/// statement is legal on its own and its value becomes the script's
/// result, which is what a REPL echoes back.
pub fn compile_repl(heap: &mut Heap, source: &Rc<Source>) -> Result<Handle, Vec<SyntaxError>> {
    compile_with(heap, source, true)
}

fn compile_with(
    heap: &mut Heap,
    source: &Rc<Source>,
    repl: bool,
) -> Result<Handle, Vec<SyntaxError>> {
    let mut parser = Parser {
        heap,
        scanner: Scanner::new(Rc::clone(source)),
        frames: vec![Frame::new(FrameKind::Script, None)],
        current: Token::empty(),
        previous: Token::empty(),
        sub_exprs: 0,
        had_call: false,
        had_assign: false,
        repl,
        has_result: false,
        panic_mode: false,
        errors: Vec::new(),
    };

    parser.advance();
    while !parser.match_(TokenKind::Eof) {
        parser.declaration();
    }

    let fun = if parser.has_result {
        parser.emit_op(Opcode::Return);
        parser.frames.pop().expect("no active function").fun
    } else {
        parser.end_frame()
    };
    if parser.errors.is_empty() {
        Ok(parser.heap.alloc(Object::Fun(fun)))
    } else {
        Err(parser.errors)
    }
}

impl<'a> Parser<'a> {
    fn frame(&self) -> &Frame {
        self.frames.last().expect("no active function")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active function")
    }

    fn chunk_mut(&mut self) -> &mut crate::common::chunk::Chunk {
        &mut self.frame_mut().fun.chunk
    }

    fn error_at(&mut self, token: &Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let context = match &token.kind {
            TokenKind::Eof => ErrorContext::End,
            TokenKind::Error(_) => ErrorContext::Bare,
            _ => ErrorContext::Lexeme,
        };

        self.errors.push(SyntaxError::new(
            message,
            Span::from(&token.span),
            token.line,
            token.column,
            context,
        ));
    }

    fn error(&mut self, message: &str) {
        let token = self.previous.clone();
        self.error_at(&token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.error_at(&token, message);
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, Token::empty());

        loop {
            self.current = self.scanner.scan_token();
            let message = match &self.current.kind {
                TokenKind::Error(message) => message.to_string(),
                _ => break,
            };
            self.error_at_current(&message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }

        self.error_at_current(message);
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn match_(&mut self, kind: TokenKind) -> bool {
        if !self.check(&kind) {
            return false;
        }
        self.advance();
        true
    }

    fn emit_byte(&mut self, byte: u8) {
        let (line, column) = (self.previous.line, self.previous.column);
        self.chunk_mut().emit(byte, line, column);
    }

    fn emit_op(&mut self, op: Opcode) {
        self.emit_byte(op as u8);
    }

    fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit_op(op);
        self.emit_byte(0);
        self.emit_byte(0);
        self.chunk_mut().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        // -2 to adjust for the two offset bytes themselves.
        let jump = self.chunk_mut().code.len() - offset - 2;

        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }

        self.chunk_mut().patch(offset, ((jump >> 8) & 0xff) as u8);
        self.chunk_mut().patch(offset + 1, (jump & 0xff) as u8);
    }

    fn emit_return(&mut self) {
        self.emit_op(Opcode::Nil);
        self.emit_op(Opcode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk_mut().add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }

        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let constant = self.make_constant(value);
        self.emit_op(Opcode::LoadConst);
        self.emit_byte(constant);
    }

    fn identifier_constant(&mut self, name: &Token) -> u8 {
        let handle = self.heap.copy_string(name.lexeme());
        let index = self.chunk_mut().add_identifier(handle);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }

        index as u8
    }

    fn end_frame(&mut self) -> FunObj {
        self.emit_return();
        self.frames.pop().expect("no active function").fun
    }

    fn begin_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.frame_mut().scope_depth -= 1;

        while self
            .frame()
            .locals
            .last()
            .map_or(false, |local| local.depth > self.frame().scope_depth)
        {
            self.emit_op(Opcode::Del);
            self.frame_mut().locals.pop();
        }
    }

    fn resolve_local(&mut self, name: &Token) -> Option<u8> {
        let mut uninitialized = false;
        let mut found = None;

        for (index, local) in self.frame().locals.iter().enumerate().rev() {
            if local.name.lexeme() == name.lexeme() {
                uninitialized = local.depth == -1;
                found = Some(index as u8);
                break;
            }
        }

        if uninitialized {
            self.error("Cannot read local variable in its own initializer.");
        }
        found
    }

    fn add_local(&mut self, name: Token) {
        if self.frame().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }

        self.frame_mut().locals.push(Local { name, depth: -1 });
    }

    fn declare_variable(&mut self) {
        // Global variables are implicitly declared.
        if self.frame().scope_depth == 0 {
            return;
        }

        let name = self.previous.clone();
        let mut duplicate = false;
        for local in self.frame().locals.iter().rev() {
            if local.depth != -1 && local.depth < self.frame().scope_depth {
                break;
            }
            if local.name.lexeme() == name.lexeme() {
                duplicate = true;
                break;
            }
        }

        if duplicate {
            self.error("Variable with this name already declared in this scope.");
        }
        self.add_local(name);
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Ident, message);

        self.declare_variable();
        if self.frame().scope_depth > 0 {
            return 0;
        }

        let name = self.previous.clone();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let frame = self.frame_mut();
        if frame.scope_depth == 0 {
            return;
        }
        let depth = frame.scope_depth;
        if let Some(local) = frame.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.frame().scope_depth > 0 {
            self.mark_initialized();
            return;
        }

        self.emit_op(Opcode::DefGlobal);
        self.emit_byte(global);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u8 = 0;
        if !self.check(&TokenKind::RightParen) {
            loop {
                self.expression();
                count = count.saturating_add(1);
                if count == MAX_ARGS {
                    self.error("Cannot have more than 32 arguments.");
                }
                if !self.match_(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count
    }

    fn and(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(Opcode::JumpIfFalse);

        self.emit_op(Opcode::Del);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    fn or(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(Opcode::JumpIfFalse);
        let end_jump = self.emit_jump(Opcode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(Opcode::Del);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind.clone();

        // Compile the right operand.
        let rule = get_rule(&operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::EqualEqual => self.emit_op(Opcode::CmpEq),
            TokenKind::Less => self.emit_op(Opcode::CmpLT),
            TokenKind::LessEqual => self.emit_op(Opcode::CmpLTEq),

            // The missing comparisons are the negations of the ones
            // the machine has.
            TokenKind::BangEqual => {
                self.emit_op(Opcode::CmpEq);
                self.emit_op(Opcode::Not);
            }
            TokenKind::Greater => {
                self.emit_op(Opcode::CmpLTEq);
                self.emit_op(Opcode::Not);
            }
            TokenKind::GreaterEqual => {
                self.emit_op(Opcode::CmpLT);
                self.emit_op(Opcode::Not);
            }

            TokenKind::Plus => self.emit_op(Opcode::Add),
            TokenKind::Minus => self.emit_op(Opcode::Sub),
            TokenKind::Star => self.emit_op(Opcode::Mul),
            TokenKind::Slash => self.emit_op(Opcode::Div),
            _ => unreachable!("not a binary operator"),
        }
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_op(Opcode::Call);
        self.emit_byte(arg_count);
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Ident, "Expect member name.");
        let token = self.previous.clone();
        let name = self.identifier_constant(&token);

        if can_assign && self.match_(TokenKind::Equal) {
            self.expression();
            self.emit_op(Opcode::SaveField);
            self.emit_byte(name);
        } else {
            self.emit_op(Opcode::LoadField);
            self.emit_byte(name);
        }
    }

    fn index(&mut self, can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightBracket, "Expected closing ']'");

        if can_assign && self.match_(TokenKind::Equal) {
            self.expression();
            self.emit_op(Opcode::SaveIndex);

            self.had_assign = true;
        } else {
            self.emit_op(Opcode::LoadIndex);
        }
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(Opcode::False),
            TokenKind::Nil => self.emit_op(Opcode::Nil),
            TokenKind::True => self.emit_op(Opcode::True),
            _ => unreachable!("not a literal"),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let num: f64 = self.previous.lexeme().parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(num));
    }

    fn string(&mut self, _can_assign: bool) {
        let handle = {
            let lexeme = self.previous.lexeme();
            // Trim the delimiters.
            let content = &lexeme[1..lexeme.len() - 1];
            self.heap.copy_string(content)
        };
        self.emit_constant(Value::Object(handle));
    }

    fn map(&mut self, _can_assign: bool) {
        let mut count: usize = 0;

        if !self.check(&TokenKind::RightBracket) {
            loop {
                self.expression();
                count += 1;
                if !self.match_(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightBracket, "Expected closing ']'.");
        if count > u8::MAX as usize {
            self.error("Too many values in a map literal.");
            return;
        }
        self.emit_op(Opcode::BuildMap);
        self.emit_byte(count as u8);
    }

    fn named_variable(&mut self, name: Token, can_assign: bool) {
        let (get_op, set_op, arg) = match self.resolve_local(&name) {
            Some(slot) => (Opcode::LoadLocal, Opcode::SaveLocal, slot),
            None => (
                Opcode::LoadGlobal,
                Opcode::SaveGlobal,
                self.identifier_constant(&name),
            ),
        };

        if can_assign && self.match_(TokenKind::Equal) {
            self.expression();
            self.emit_op(set_op);
            self.emit_byte(arg);

            self.had_assign = true;
        } else {
            self.emit_op(get_op);
            self.emit_byte(arg);
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.clone();
        self.named_variable(name, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind.clone();

        // Compile the operand.
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Bang => self.emit_op(Opcode::Not),
            TokenKind::Minus => self.emit_op(Opcode::Neg),
            _ => unreachable!("not a unary operator"),
        }
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = match get_rule(&self.previous.kind).prefix {
            Some(rule) => rule,
            None => {
                self.error("Expect expression.");
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);
        self.sub_exprs += 1;

        while precedence <= get_rule(&self.current.kind).precedence {
            // An operator on a later line starts a new statement
            // instead of continuing this expression.
            if self.current.line > self.previous.line {
                break;
            }
            if self.check(&TokenKind::LeftParen) {
                self.had_call = true;
            }
            self.advance();
            if let Some(infix) = get_rule(&self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn block(&mut self) {
        while !self.check(&TokenKind::RightBrace) && !self.check(&TokenKind::Eof) {
            self.declaration();
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn function(&mut self, kind: FrameKind) {
        let name = self.heap.copy_string(self.previous.lexeme());
        self.frames.push(Frame::new(kind, Some(name)));
        self.begin_scope();

        // Compile the parameter list.
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(&TokenKind::RightParen) {
            loop {
                let arity = {
                    let fun = &mut self.frame_mut().fun;
                    fun.arity = fun.arity.saturating_add(1);
                    fun.arity
                };
                if arity > MAX_ARGS {
                    self.error_at_current("Cannot have more than 32 parameters.");
                }
                let param = self.parse_variable("Expect parameter name.");
                self.define_variable(param);
                if !self.match_(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");

        // The body.
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        // Hand the finished function to the enclosing chunk.
        let fun = self.end_frame();
        let handle = self.heap.alloc(Object::Fun(fun));
        let constant = self.make_constant(Value::Object(handle));

        self.emit_op(Opcode::LoadConst);
        self.emit_byte(constant);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FrameKind::Function);
        self.define_variable(global);
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(Opcode::Nil);
        }

        self.define_variable(global);
    }

    fn expression_statement(&mut self) {
        self.had_call = false;
        self.had_assign = false;
        self.sub_exprs = 0;

        self.expression();

        if self.repl && self.frame().kind == FrameKind::Script && self.frame().scope_depth == 0 {
            // Eval mode: the value stays on the stack as the script's
            // candidate result.
            self.has_result = true;
        } else {
            self.emit_op(Opcode::Del);

            // A lone primary that neither calls nor assigns does
            // nothing; treat it as a mistake.
            if self.sub_exprs <= 1 && !self.had_call && !self.had_assign {
                self.error("Unexpected expression syntax.");
                return;
            }
        }

        self.match_(TokenKind::Semicolon);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit_op(Opcode::Del);
        self.statement();

        let else_jump = self.emit_jump(Opcode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(Opcode::Del);

        if self.match_(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn print_statement(&mut self) {
        let mut count: u8 = 0;

        loop {
            self.expression();
            count = count.saturating_add(1);
            if count > MAX_PRINT_ARGS {
                self.error("Too many values in 'print' statement.");
                return;
            }
            if !self.match_(TokenKind::Comma) {
                break;
            }
        }

        self.emit_op(Opcode::Print);
        self.emit_byte(count);

        // Consume an optional terminator so `else` can follow an
        // unbraced `print` branch.
        self.match_(TokenKind::Semicolon);
    }

    fn return_statement(&mut self) {
        if self.frame().kind == FrameKind::Script {
            self.error("Cannot return from top-level code.");
        }

        if self.match_(TokenKind::Semicolon) || self.check(&TokenKind::RightBrace) {
            self.emit_return();
        } else {
            self.expression();
            self.emit_op(Opcode::Return);
            self.match_(TokenKind::Semicolon);
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
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

    fn declaration(&mut self) {
        if self.match_(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_(TokenKind::Print) {
            self.print_statement();
        } else if self.match_(TokenKind::If) {
            self.if_statement();
        } else if self.match_(TokenKind::Return) {
            self.return_statement();
        } else if self.match_(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else if self.match_(TokenKind::Semicolon) {
            // An empty statement.
        } else {
            self.expression_statement();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_src(src: &str) -> (Heap, Result<Handle, Vec<SyntaxError>>) {
        let mut heap = Heap::new();
        let source = Source::source(src);
        let result = compile(&mut heap, &source);
        (heap, result)
    }

    fn code(heap: &Heap, handle: Handle) -> &[u8] {
        &heap.get_fun(handle).chunk.code
    }

    #[test]
    fn arithmetic_statement() {
        let (heap, result) = compile_src("print 1 + 2;");
        let handle = result.unwrap();

        assert_eq!(
            code(&heap, handle),
            &[
                Opcode::LoadConst as u8,
                0,
                Opcode::LoadConst as u8,
                1,
                Opcode::Add as u8,
                Opcode::Print as u8,
                1,
                Opcode::Nil as u8,
                Opcode::Return as u8,
            ]
        );

        let constants = &heap.get_fun(handle).chunk.constants.values;
        assert_eq!(constants, &[Value::Number(1.0), Value::Number(2.0)]);
    }

    #[test]
    fn greater_compiles_to_negated_less_equal() {
        let (heap, result) = compile_src("print 2 > 1;");
        let handle = result.unwrap();

        assert_eq!(
            code(&heap, handle),
            &[
                Opcode::LoadConst as u8,
                0,
                Opcode::LoadConst as u8,
                1,
                Opcode::CmpLTEq as u8,
                Opcode::Not as u8,
                Opcode::Print as u8,
                1,
                Opcode::Nil as u8,
                Opcode::Return as u8,
            ]
        );
    }

    #[test]
    fn if_else_jumps_are_patched() {
        let (heap, result) = compile_src("if (true) print 1; else print 2;");
        let handle = result.unwrap();
        let code = code(&heap, handle);

        assert_eq!(code[0], Opcode::True as u8);
        assert_eq!(code[1], Opcode::JumpIfFalse as u8);
        // Jump over Del + LoadConst k + Print n + Jump s,s = 8 bytes.
        assert_eq!((code[2], code[3]), (0, 8));
        assert_eq!(code[9], Opcode::Jump as u8);
        // Jump over Del + LoadConst k + Print n = 5 bytes.
        assert_eq!((code[10], code[11]), (0, 5));
    }

    #[test]
    fn locals_resolve_by_slot() {
        let (heap, result) = compile_src("{ var a = 1; print a; }");
        let handle = result.unwrap();

        assert_eq!(
            code(&heap, handle),
            &[
                Opcode::LoadConst as u8,
                0,
                Opcode::LoadLocal as u8,
                1,
                Opcode::Print as u8,
                1,
                Opcode::Del as u8,
                Opcode::Nil as u8,
                Opcode::Return as u8,
            ]
        );
    }

    #[test]
    fn self_referential_initializer_is_an_error() {
        let (_, result) = compile_src("{ var a = a; }");
        let errors = result.unwrap_err();
        assert_eq!(
            errors[0].message,
            "Cannot read local variable in its own initializer."
        );
    }

    #[test]
    fn redeclaration_in_scope_is_an_error() {
        let (_, result) = compile_src("{ var a = 1; var a = 2; }");
        let errors = result.unwrap_err();
        assert_eq!(
            errors[0].message,
            "Variable with this name already declared in this scope."
        );
    }

    #[test]
    fn lone_expression_is_rejected() {
        let (_, result) = compile_src("5;");
        let errors = result.unwrap_err();
        assert_eq!(errors[0].message, "Unexpected expression syntax.");
    }

    #[test]
    fn calls_and_assignments_are_valid_statements() {
        let (_, result) = compile_src("var x; x = 1; clock();");
        assert!(result.is_ok());
    }

    #[test]
    fn return_at_top_level_is_an_error() {
        let (_, result) = compile_src("return 1;");
        let errors = result.unwrap_err();
        assert_eq!(errors[0].message, "Cannot return from top-level code.");
    }

    #[test]
    fn invalid_assignment_target() {
        let (_, result) = compile_src("1 = 2;");
        let errors = result.unwrap_err();
        assert_eq!(errors[0].message, "Invalid assignment target.");
    }

    #[test]
    fn line_break_ends_the_expression() {
        // The `+` on the next line cannot continue the print argument,
        // so it starts a (broken) statement of its own.
        let (_, result) = compile_src("print 1\n+ 2;");
        let errors = result.unwrap_err();
        assert_eq!(errors[0].message, "Expect expression.");
    }

    #[test]
    fn several_independent_errors_are_reported() {
        let (_, result) = compile_src("var 1;\nvar 2;");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.message == "Expect variable name."));
    }

    #[test]
    fn too_many_constants() {
        let mut src = String::new();
        for i in 0..300 {
            src.push_str(&format!("print {}.5;\n", i));
        }
        let (_, result) = compile_src(&src);
        let errors = result.unwrap_err();
        assert_eq!(errors[0].message, "Too many constants in one chunk.");
    }

    #[test]
    fn constants_under_the_limit_compile() {
        let mut src = String::new();
        for i in 0..255 {
            src.push_str(&format!("print {}.5;\n", i));
        }
        let (_, result) = compile_src(&src);
        assert!(result.is_ok());
    }

    #[test]
    fn functions_nest() {
        let (heap, result) = compile_src("fun add(a, b) { return a + b; }");
        let handle = result.unwrap();

        let script = heap.get_fun(handle);
        let inner = match &script.chunk.constants.values[1] {
            Value::Object(inner) => heap.get_fun(*inner),
            other => panic!("expected a function constant, got {:?}", other),
        };
        assert_eq!(inner.arity, 2);
        assert_eq!(
            inner.chunk.code,
            vec![
                Opcode::LoadLocal as u8,
                1,
                Opcode::LoadLocal as u8,
                2,
                Opcode::Add as u8,
                Opcode::Return as u8,
                Opcode::Nil as u8,
                Opcode::Return as u8,
            ]
        );
    }

    #[test]
    fn map_literal_and_index() {
        let (heap, result) = compile_src("var m = [1, 2]; print m[0];");
        let handle = result.unwrap();
        let code = code(&heap, handle);

        let build = code
            .iter()
            .position(|b| *b == Opcode::BuildMap as u8)
            .unwrap();
        assert_eq!(code[build + 1], 2);
        assert!(code.contains(&(Opcode::LoadIndex as u8)));
    }

    #[test]
    fn eval_mode_keeps_the_last_expression() {
        let mut heap = Heap::new();
        let source = Source::source("1 + 2");
        let handle = compile_repl(&mut heap, &source).unwrap();

        // The value is returned instead of being discarded.
        assert_eq!(
            code(&heap, handle),
            &[
                Opcode::LoadConst as u8,
                0,
                Opcode::LoadConst as u8,
                1,
                Opcode::Add as u8,
                Opcode::Return as u8,
            ]
        );
    }
}
