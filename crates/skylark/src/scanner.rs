//! Byte stream → token stream, with significant newlines and INDENT/DEDENT
//! synthesized from an indent-width stack.

use crate::ast::Span;
use crate::error::{RunResult, SkylarkError};
use crate::token::{Keyword, Token, TokenKind};

pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    indent_stack: Vec<usize>,
    paren_depth: i32,
    tokens: Vec<Token>,
    /// Whether any non-whitespace token has been emitted on the current
    /// logical line yet (blank lines emit no NEWLINE).
    line_has_token: bool,
    at_line_start: bool,
}

pub fn tokenize(src: &str) -> RunResult<Vec<Token>> {
    let mut scanner = Scanner {
        src: src.as_bytes(),
        pos: 0,
        indent_stack: vec![0],
        paren_depth: 0,
        tokens: Vec::new(),
        line_has_token: false,
        at_line_start: true,
    };
    scanner.run()?;
    Ok(scanner.tokens)
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.line_has_token = !matches!(kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent);
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn run(&mut self) -> RunResult<()> {
        loop {
            if self.at_line_start && self.paren_depth == 0 {
                self.handle_line_start()?;
                if self.peek().is_none() {
                    break;
                }
            }
            match self.peek() {
                None => break,
                Some(b' ' | b'\t') => {
                    self.pos += 1;
                }
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => {
                    self.pos += 2;
                }
                Some(b'\\') if self.peek_at(1) == Some(b'\r') && self.peek_at(2) == Some(b'\n') => {
                    self.pos += 3;
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'\n') => {
                    self.pos += 1;
                    if self.paren_depth > 0 {
                        continue;
                    }
                    if self.line_has_token {
                        self.push(TokenKind::Newline, self.pos - 1);
                    }
                    self.at_line_start = true;
                }
                Some(b'\r') => {
                    self.pos += 1;
                }
                Some(c) if c.is_ascii_digit() => self.scan_number()?,
                Some(c) if is_ident_start(c) => self.scan_identifier_or_string()?,
                Some(b'"' | b'\'') => self.scan_string(false, false)?,
                Some(_) => self.scan_punct()?,
            }
        }
        // Close off the final logical line.
        if self.line_has_token {
            self.push(TokenKind::Newline, self.pos);
        }
        if self.paren_depth > 0 {
            return Err(SkylarkError::syntax("unexpected end of file inside brackets"));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, self.pos);
        }
        self.push(TokenKind::Eof, self.pos);
        Ok(())
    }

    /// Consumes leading whitespace of a new logical line and synthesizes
    /// INDENT/DEDENT tokens, skipping blank and comment-only lines entirely.
    fn handle_line_start(&mut self) -> RunResult<()> {
        loop {
            let line_start = self.pos;
            let mut width = 0usize;
            loop {
                match self.peek() {
                    Some(b' ') => {
                        width += 1;
                        self.pos += 1;
                    }
                    Some(b'\t') => {
                        width += 8 - (width % 8);
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => {
                    self.pos = line_start;
                    return Ok(());
                }
                Some(b'\n') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'\r') if self.peek_at(1) == Some(b'\n') => {
                    self.pos += 2;
                    continue;
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    continue;
                }
                _ => {}
            }
            self.at_line_start = false;
            let current = *self.indent_stack.last().unwrap();
            if width > current {
                self.indent_stack.push(width);
                self.push(TokenKind::Indent, line_start);
            } else if width < current {
                while *self.indent_stack.last().unwrap() > width {
                    self.indent_stack.pop();
                    self.push(TokenKind::Dedent, self.pos);
                }
                if *self.indent_stack.last().unwrap() != width {
                    return Err(SkylarkError::syntax("inconsistent indentation"));
                }
            }
            return Ok(());
        }
    }

    fn scan_identifier_or_string(&mut self) -> RunResult<()> {
        let start = self.pos;
        // Raw/byte string prefixes: r"...", b"...", rb"...", br"...".
        let c = self.peek().unwrap();
        if (c == b'r' || c == b'R' || c == b'b' || c == b'B') {
            let mut raw = false;
            let mut bytes = false;
            let mut look = self.pos;
            for _ in 0..2 {
                match self.src.get(look) {
                    Some(b'r' | b'R') if !raw => {
                        raw = true;
                        look += 1;
                    }
                    Some(b'b' | b'B') if !bytes => {
                        bytes = true;
                        look += 1;
                    }
                    _ => break,
                }
            }
            if matches!(self.src.get(look), Some(b'"' | b'\'')) {
                self.pos = look;
                return self.scan_string(raw, bytes);
            }
        }
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| SkylarkError::syntax("invalid UTF-8 in identifier"))?
            .to_string();
        if let Some(kw) = Keyword::lookup(&word) {
            self.push(TokenKind::Keyword(kw), start);
        } else {
            self.push(TokenKind::Identifier(word), start);
        }
        Ok(())
    }

    fn scan_number(&mut self) -> RunResult<()> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')) {
            self.pos += 2;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string();
            self.push(TokenKind::Int(text), start);
            return Ok(());
        }
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) || self.peek() == Some(b'.') && self.peek_at(1) != Some(b'.') {
            // Starlark allows `1.` style floats too.
            if self.peek() == Some(b'.') {
                is_float = true;
                self.pos += 1;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| SkylarkError::syntax(format!("invalid float literal {text:?}")))?;
            self.push(TokenKind::Float(value), start);
        } else {
            self.push(TokenKind::Int(text.to_string()), start);
        }
        Ok(())
    }

    fn scan_string(&mut self, raw: bool, bytes: bool) -> RunResult<()> {
        let start = self.pos;
        let quote = self.advance().unwrap();
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }
        let mut out = String::new();
        let mut raw_bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(SkylarkError::syntax("unterminated string literal")),
                Some(c) if c == quote => {
                    if triple {
                        if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                            self.pos += 3;
                            break;
                        }
                        self.pos += 1;
                        out.push(quote as char);
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(b'\n') if !triple => {
                    return Err(SkylarkError::syntax("unterminated string literal (newline in single-quoted string)"));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.scan_escape(raw, &mut out, &mut raw_bytes)?;
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c as char);
                }
            }
        }
        if bytes {
            self.push(TokenKind::Bytes(out.into_bytes()), start);
        } else {
            self.push(TokenKind::Str(out), start);
        }
        Ok(())
    }

    fn scan_escape(&mut self, raw: bool, out: &mut String, _raw_bytes: &mut Vec<u8>) -> RunResult<()> {
        let c = self.peek().ok_or_else(|| SkylarkError::syntax("unterminated escape sequence"))?;
        if raw {
            // Raw strings only special-case \' \" and \<newline>.
            match c {
                b'\'' | b'"' => {
                    out.push(c as char);
                    self.pos += 1;
                }
                b'\n' => {
                    out.push('\\');
                    out.push('\n');
                    self.pos += 1;
                }
                _ => {
                    out.push('\\');
                }
            }
            return Ok(());
        }
        match c {
            b'a' => {
                out.push('\u{07}');
                self.pos += 1;
            }
            b'b' => {
                out.push('\u{08}');
                self.pos += 1;
            }
            b'f' => {
                out.push('\u{0C}');
                self.pos += 1;
            }
            b'n' => {
                out.push('\n');
                self.pos += 1;
            }
            b'r' => {
                out.push('\r');
                self.pos += 1;
            }
            b't' => {
                out.push('\t');
                self.pos += 1;
            }
            b'v' => {
                out.push('\u{0B}');
                self.pos += 1;
            }
            b'\\' => {
                out.push('\\');
                self.pos += 1;
            }
            b'\'' => {
                out.push('\'');
                self.pos += 1;
            }
            b'"' => {
                out.push('"');
                self.pos += 1;
            }
            b'\n' => {
                self.pos += 1;
            }
            b'x' => {
                self.pos += 1;
                let hi = self.hex_digit()?;
                let lo = self.hex_digit()?;
                out.push(((hi << 4) | lo) as u8 as char);
            }
            b'0'..=b'7' => {
                let mut value: u32 = 0;
                let mut count = 0;
                while count < 3 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.pos += 1;
                            count += 1;
                        }
                        _ => break,
                    }
                }
                if value > 255 {
                    return Err(SkylarkError::syntax("octal escape out of range"));
                }
                out.push(value as u8 as char);
            }
            _ => {
                return Err(SkylarkError::syntax(format!("invalid escape sequence \\{}", c as char)));
            }
        }
        Ok(())
    }

    fn hex_digit(&mut self) -> RunResult<u32> {
        let c = self.advance().ok_or_else(|| SkylarkError::syntax("incomplete hex escape"))?;
        (c as char)
            .to_digit(16)
            .ok_or_else(|| SkylarkError::syntax("invalid hex escape digit"))
    }

    fn scan_punct(&mut self) -> RunResult<()> {
        let start = self.pos;
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr) => {{
                self.pos += 1;
                if self.peek() == Some($second) {
                    self.pos += 1;
                    self.push($two_kind, start);
                } else {
                    self.push($one_kind, start);
                }
            }};
        }
        let c = self.advance().unwrap();
        match c {
            b'(' => {
                self.paren_depth += 1;
                self.push(TokenKind::LParen, start);
            }
            b')' => {
                self.paren_depth -= 1;
                self.push(TokenKind::RParen, start);
            }
            b'[' => {
                self.paren_depth += 1;
                self.push(TokenKind::LBracket, start);
            }
            b']' => {
                self.paren_depth -= 1;
                self.push(TokenKind::RBracket, start);
            }
            b'{' => {
                self.paren_depth += 1;
                self.push(TokenKind::LBrace, start);
            }
            b'}' => {
                self.paren_depth -= 1;
                self.push(TokenKind::RBrace, start);
            }
            b',' => self.push(TokenKind::Comma, start),
            b':' => self.push(TokenKind::Colon, start),
            b'.' => self.push(TokenKind::Dot, start),
            b';' => self.push(TokenKind::Semi, start),
            b'~' => self.push(TokenKind::Tilde, start),
            b'+' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::PlusEq, start);
                } else {
                    self.push(TokenKind::Plus, start);
                }
            }
            b'-' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::MinusEq, start);
                } else {
                    self.push(TokenKind::Minus, start);
                }
            }
            b'*' => {
                if self.peek() == Some(b'*') {
                    self.pos += 1;
                    self.push(TokenKind::DoubleStar, start);
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::StarEq, start);
                } else {
                    self.push(TokenKind::Star, start);
                }
            }
            b'/' => {
                if self.peek() == Some(b'/') {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(TokenKind::DoubleSlashEq, start);
                    } else {
                        self.push(TokenKind::DoubleSlash, start);
                    }
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::SlashEq, start);
                } else {
                    self.push(TokenKind::Slash, start);
                }
            }
            b'%' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::PercentEq, start);
                } else {
                    self.push(TokenKind::Percent, start);
                }
            }
            b'|' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::PipeEq, start);
                } else {
                    self.push(TokenKind::Pipe, start);
                }
            }
            b'&' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::AmpEq, start);
                } else {
                    self.push(TokenKind::Amp, start);
                }
            }
            b'^' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::CaretEq, start);
                } else {
                    self.push(TokenKind::Caret, start);
                }
            }
            b'=' => two!(b'=', TokenKind::Eq, TokenKind::Assign),
            b'<' => {
                if self.peek() == Some(b'<') {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(TokenKind::ShlEq, start);
                    } else {
                        self.push(TokenKind::Shl, start);
                    }
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::Le, start);
                } else {
                    self.push(TokenKind::Lt, start);
                }
            }
            b'>' => {
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(TokenKind::ShrEq, start);
                    } else {
                        self.push(TokenKind::Shr, start);
                    }
                } else if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::Ge, start);
                } else {
                    self.push(TokenKind::Gt, start);
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push(TokenKind::Ne, start);
                } else {
                    return Err(SkylarkError::syntax("unexpected character '!'"));
                }
            }
            other => {
                return Err(SkylarkError::syntax(format!(
                    "unexpected character {:?}",
                    other as char
                )));
            }
        }
        Ok(())
    }
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}
