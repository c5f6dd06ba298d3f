//! Recursive-descent parser, one function per grammar production, in
//! ascending precedence order (`expr` lowest, `primary` highest).

use crate::ast::{Ast, AstHandle, AstNode, BinOp, ParamDecl};
use crate::span::Span;
use crate::token::{Keyword, Mode, Tag, TokenCursor, TokenKind, Tokenizer};

pub struct Parser {
    cursor: TokenCursor,
    ast: Ast,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, String> {
        let tokens = Tokenizer::new(source, Mode::Source).tokenize()?;
        Ok(Parser {
            cursor: TokenCursor::new(tokens),
            ast: Ast::new(),
        })
    }

    /// Parse a full translation unit and hand back the finished arena.
    pub fn parse(mut self) -> Result<(Ast, AstHandle), String> {
        let start = self.cursor.current_span().offset;
        let mut items = Vec::new();
        while !self.cursor.peek_kind(Tag::Eof, 0) {
            items.push(self.parse_function_def()?);
        }
        let span = self.span_from(start);
        let root = self.ast.push(AstNode::TranslationUnit { items }, span);
        Ok((self.ast, root))
    }

    fn span_from(&self, start: u32) -> Span {
        let end = self.cursor.current_span().offset;
        Span::new(start, end.saturating_sub(start))
    }

    fn parse_function_def(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let public = self.cursor.consume(Tag::Keyword(Keyword::Pub));
        self.cursor.expect(Tag::Keyword(Keyword::Fn))?;
        let name_token = self.cursor.expect_ident()?;
        let name = self.cursor.ident_text(name_token).to_string();

        self.cursor.expect(Tag::LParen)?;
        let mut params = Vec::new();
        if !self.cursor.peek_kind(Tag::RParen, 0) {
            params.push(self.parse_param()?);
            while self.cursor.consume(Tag::Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.cursor.expect(Tag::RParen)?;

        let body = self.parse_block()?;
        let span = self.span_from(start);

        Ok(self.ast.push(
            AstNode::FunctionDef {
                name,
                name_token,
                params,
                body,
                public,
            },
            span,
        ))
    }

    fn parse_param(&mut self) -> Result<ParamDecl, String> {
        let handle = self.cursor.expect_ident()?;
        let span = self.cursor.get_token(handle).span;
        Ok(ParamDecl {
            name: self.cursor.ident_text(handle).to_string(),
            span,
        })
    }

    fn parse_block(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        self.cursor.expect(Tag::LBrace)?;
        let mut stmts = Vec::new();
        while !self.cursor.peek_kind(Tag::RBrace, 0) {
            stmts.push(self.parse_stmt()?);
        }
        self.cursor.expect(Tag::RBrace)?;
        let span = self.span_from(start);
        Ok(self.ast.push(AstNode::Block { stmts }, span))
    }

    fn parse_stmt(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;

        if self.cursor.consume(Tag::Keyword(Keyword::Return)) {
            let value = self.parse_expr()?;
            self.cursor.expect(Tag::Semi)?;
            let span = self.span_from(start);
            return Ok(self.ast.push(AstNode::Return { value }, span));
        }
        if self.cursor.peek_kind(Tag::Keyword(Keyword::If), 0) {
            return self.parse_if();
        }
        if self.cursor.consume(Tag::Keyword(Keyword::While)) {
            let cond = self.parse_expr()?;
            let body = self.parse_block()?;
            let span = self.span_from(start);
            return Ok(self.ast.push(AstNode::While { cond, body }, span));
        }
        if self.cursor.consume(Tag::Keyword(Keyword::Let)) {
            let mutable = self.cursor.consume(Tag::Keyword(Keyword::Mut));
            let name_token = self.cursor.expect_ident()?;
            let name = self.cursor.ident_text(name_token).to_string();
            self.cursor.expect(Tag::Semi)?;
            let span = self.span_from(start);
            return Ok(self.ast.push(
                AstNode::Let {
                    name,
                    name_token,
                    mutable,
                },
                span,
            ));
        }
        if self.cursor.consume(Tag::Keyword(Keyword::Import)) {
            let name_token = self.cursor.expect_ident()?;
            let name = self.cursor.ident_text(name_token).to_string();
            self.cursor.expect(Tag::Semi)?;
            let span = self.span_from(start);
            return Ok(self.ast.push(AstNode::Import { name, name_token }, span));
        }
        if self.cursor.peek_kind(Tag::LBrace, 0) {
            return self.parse_block();
        }
        // Two-token lookahead for assignment: IDENT "=" ...
        if self.cursor.peek_kind(Tag::Ident, 0) && self.cursor.peek_kind(Tag::Equal, 1) {
            let name_token = self.cursor.expect_ident()?;
            let name = self.cursor.ident_text(name_token).to_string();
            self.cursor.expect(Tag::Equal)?;
            let value = self.parse_expr()?;
            self.cursor.expect(Tag::Semi)?;
            let span = self.span_from(start);
            return Ok(self.ast.push(
                AstNode::Assign {
                    name,
                    name_token,
                    value,
                },
                span,
            ));
        }
        let expr = self.parse_expr()?;
        self.cursor.expect(Tag::Semi)?;
        let span = self.span_from(start);
        Ok(self.ast.push(AstNode::ExprStmt { expr }, span))
    }

    fn parse_if(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        self.cursor.expect(Tag::Keyword(Keyword::If))?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.cursor.consume(Tag::Keyword(Keyword::Else)) {
            if self.cursor.peek_kind(Tag::Keyword(Keyword::If), 0) {
                Some(self.parse_if()?)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        let span = self.span_from(start);
        Ok(self.ast.push(
            AstNode::If {
                cond,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn parse_expr(&mut self) -> Result<AstHandle, String> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_logical_and()?;
        while self.cursor.consume(Tag::PipePipe) {
            let rhs = self.parse_logical_and()?;
            lhs = self.push_binary(BinOp::Or, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_bit_or()?;
        while self.cursor.consume(Tag::AmpAmp) {
            let rhs = self.parse_bit_or()?;
            lhs = self.push_binary(BinOp::And, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_bit_xor()?;
        while self.cursor.consume(Tag::Pipe) {
            let rhs = self.parse_bit_xor()?;
            lhs = self.push_binary(BinOp::BitOr, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_bit_and()?;
        while self.cursor.consume(Tag::Caret) {
            let rhs = self.parse_bit_and()?;
            lhs = self.push_binary(BinOp::BitXor, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_equality()?;
        while self.cursor.consume(Tag::Amp) {
            let rhs = self.parse_equality()?;
            lhs = self.push_binary(BinOp::BitAnd, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.cursor.consume(Tag::EqEq) {
                BinOp::Eq
            } else if self.cursor.consume(Tag::NotEq) {
                BinOp::Neq
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = self.push_binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_shift()?;
        loop {
            let op = if self.cursor.consume(Tag::Lt) {
                BinOp::Lt
            } else if self.cursor.consume(Tag::Le) {
                BinOp::Le
            } else {
                break;
            };
            let rhs = self.parse_shift()?;
            lhs = self.push_binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_add()?;
        loop {
            let op = if self.cursor.consume(Tag::Shl) {
                BinOp::Shl
            } else if self.cursor.consume(Tag::Shr) {
                BinOp::Shr
            } else {
                break;
            };
            let rhs = self.parse_add()?;
            lhs = self.push_binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.cursor.consume(Tag::Plus) {
                BinOp::Add
            } else if self.cursor.consume(Tag::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_mul()?;
            lhs = self.push_binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.cursor.consume(Tag::Star) {
                BinOp::Mul
            } else if self.cursor.consume(Tag::Slash) {
                BinOp::Div
            } else if self.cursor.consume(Tag::Percent) {
                BinOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = self.push_binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;
        if self.cursor.consume(Tag::Plus) {
            return self.parse_primary();
        }
        if self.cursor.consume(Tag::Minus) {
            let rhs = self.parse_primary()?;
            let zero = self.ast.push(AstNode::Number { value: 0 }, Span::new(start, 0));
            let span = self.span_from(start);
            return Ok(self.ast.push(AstNode::Binary { op: BinOp::Sub, lhs: zero, rhs }, span));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<AstHandle, String> {
        let start = self.cursor.current_span().offset;

        if self.cursor.consume(Tag::LParen) {
            let inner = self.parse_expr()?;
            self.cursor.expect(Tag::RParen)?;
            return Ok(inner);
        }
        if self.cursor.consume(Tag::Keyword(Keyword::Switch)) {
            return self.parse_switch(start);
        }
        if self.cursor.peek_kind(Tag::Ident, 0) {
            let name_token = self.cursor.expect_ident()?;
            let name = self.cursor.ident_text(name_token).to_string();
            if self.cursor.consume(Tag::LParen) {
                let mut args = Vec::new();
                if !self.cursor.peek_kind(Tag::RParen, 0) {
                    args.push(self.parse_expr()?);
                    while self.cursor.consume(Tag::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.cursor.expect(Tag::RParen)?;
                let span = self.span_from(start);
                return Ok(self.ast.push(
                    AstNode::Call {
                        callee: name,
                        callee_token: name_token,
                        args,
                    },
                    span,
                ));
            }
            let span = self.cursor.get_token(name_token).span;
            return Ok(self.ast.push(AstNode::Ident { name, name_token }, span));
        }
        if let Some(value) = self.cursor.peek_int() {
            self.cursor.expect_num()?;
            let span = self.span_from(start);
            return Ok(self.ast.push(AstNode::Number { value }, span));
        }
        if self.cursor.peek_kind(Tag::Str, 0) {
            let handle = self.cursor.expect_string()?;
            let value = match &self.cursor.get_token(handle).kind {
                TokenKind::Str(s) => s.clone(),
                _ => unreachable!(),
            };
            let span = self.cursor.get_token(handle).span;
            return Ok(self.ast.push(AstNode::Str { value }, span));
        }
        Err("expected an expression".to_string())
    }

    fn parse_switch(&mut self, start: u32) -> Result<AstHandle, String> {
        let cond = self.parse_expr()?;
        self.cursor.expect(Tag::LBrace)?;
        let mut arms = Vec::new();
        loop {
            if self.cursor.peek_kind(Tag::RBrace, 0) {
                break;
            }
            let arm_start = self.cursor.current_span().offset;
            let value = self.parse_expr()?;
            self.cursor.expect(Tag::FatArrow)?;
            let result = self.parse_expr()?;
            let arm_span = self.span_from(arm_start);
            arms.push(self.ast.push(AstNode::Case { value, result }, arm_span));
            if !self.cursor.consume(Tag::Comma) {
                break;
            }
        }
        self.cursor.expect(Tag::RBrace)?;
        let span = self.span_from(start);
        Ok(self.ast.push(AstNode::Switch { cond, arms }, span))
    }

    fn push_binary(&mut self, op: BinOp, lhs: AstHandle, rhs: AstHandle, start: u32) -> AstHandle {
        let span = self.span_from(start);
        self.ast.push(AstNode::Binary { op, lhs, rhs }, span)
    }
}
