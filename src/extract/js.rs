//! A small token scanner for JavaScript/TypeScript migration sources.
//!
//! The extractors do not need a full ECMAScript parser: they locate one
//! function, walk its body for call expressions, and lift literal arguments.
//! A token stream with brace matching and a conditional-depth estimate is
//! enough for that, and it keeps the extractors immune to syntax the full
//! grammar would choke on (decorators, type annotations, satisfies, ...).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident,
    /// `'...'` or `"..."`; `text` holds the decoded value.
    Str,
    /// `` `...` ``; `text` holds the raw cooked value when there is no
    /// interpolation.
    Template { interpolated: bool },
    Number,
    /// Single punctuation character.
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source position of the token start.
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    /// The literal value, for a plain string or a template without
    /// interpolations.
    pub fn literal_value(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str => Some(&self.text),
            TokenKind::Template {
                interpolated: false,
            } => Some(&self.text),
            _ => None,
        }
    }
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner {
            chars: src.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize a JS/TS source. Comments are skipped; strings and templates are
/// decoded; everything else becomes single-character punctuation.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(src);
    let mut tokens = Vec::new();

    while let Some(c) = scanner.peek() {
        let line = scanner.line;
        let col = scanner.col;
        if c.is_whitespace() {
            scanner.bump();
            continue;
        }
        if c == '/' {
            scanner.bump();
            match scanner.peek() {
                Some('/') => {
                    while let Some(c) = scanner.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('*') => {
                    scanner.bump();
                    let mut prev = ' ';
                    while let Some(c) = scanner.bump() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => tokens.push(Token {
                    kind: TokenKind::Punct('/'),
                    text: "/".to_string(),
                    line,
                    col,
                }),
            }
            continue;
        }
        if c == '\'' || c == '"' {
            scanner.bump();
            let mut value = String::new();
            while let Some(next) = scanner.bump() {
                if next == '\\' {
                    if let Some(escaped) = scanner.bump() {
                        value.push(unescape(escaped));
                    }
                } else if next == c {
                    break;
                } else {
                    value.push(next);
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str,
                text: value,
                line,
                col,
            });
            continue;
        }
        if c == '`' {
            scanner.bump();
            let mut value = String::new();
            let mut interpolated = false;
            while let Some(next) = scanner.bump() {
                if next == '\\' {
                    if let Some(escaped) = scanner.bump() {
                        value.push(unescape(escaped));
                    }
                } else if next == '$' && scanner.peek() == Some('{') {
                    interpolated = true;
                    scanner.bump();
                    let mut depth = 1usize;
                    while let Some(inner) = scanner.bump() {
                        match inner {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                } else if next == '`' {
                    break;
                } else {
                    value.push(next);
                }
            }
            tokens.push(Token {
                kind: TokenKind::Template { interpolated },
                text: value,
                line,
                col,
            });
            continue;
        }
        if is_ident_start(c) {
            let mut name = String::new();
            while let Some(next) = scanner.peek() {
                if is_ident_continue(next) {
                    name.push(next);
                    scanner.bump();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text: name,
                line,
                col,
            });
            continue;
        }
        if c.is_ascii_digit() {
            let mut number = String::new();
            while let Some(next) = scanner.peek() {
                if next.is_ascii_alphanumeric() || next == '.' || next == '_' {
                    number.push(next);
                    scanner.bump();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                text: number,
                line,
                col,
            });
            continue;
        }
        scanner.bump();
        tokens.push(Token {
            kind: TokenKind::Punct(c),
            text: c.to_string(),
            line,
            col,
        });
    }

    tokens
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

/// Index of the token closing the bracket opened at `open`, for `(`, `[`
/// and `{`.
pub fn matching(tokens: &[Token], open: usize) -> Option<usize> {
    let (open_char, close_char) = match tokens.get(open)?.kind {
        TokenKind::Punct('(') => ('(', ')'),
        TokenKind::Punct('[') => ('[', ']'),
        TokenKind::Punct('{') => ('{', '}'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (ix, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct(open_char) {
            depth += 1;
        } else if token.is_punct(close_char) {
            depth -= 1;
            if depth == 0 {
                return Some(ix);
            }
        }
    }
    None
}

/// Split the argument list of a call whose `(` sits at `open` into
/// top-level comma-separated token ranges. Returns the ranges and the
/// index of the closing `)`.
pub fn call_args(tokens: &[Token], open: usize) -> Option<(Vec<std::ops::Range<usize>>, usize)> {
    let close = matching(tokens, open)?;
    let mut args = Vec::new();
    let mut start = open + 1;
    let mut ix = open + 1;
    while ix < close {
        match tokens[ix].kind {
            TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => {
                ix = matching(tokens, ix)?;
            }
            TokenKind::Punct(',') => {
                args.push(start..ix);
                start = ix + 1;
            }
            _ => {}
        }
        ix += 1;
    }
    if start < close {
        args.push(start..close);
    }
    Some((args, close))
}

/// For each token, an estimate of how many conditional constructs enclose
/// it: `if`/`else` blocks, `switch` bodies, ternary branches, and brace-less
/// `if` statements. Used to flag SQL that may or may not execute.
pub fn conditional_depths(tokens: &[Token]) -> Vec<usize> {
    let mut depths = vec![0usize; tokens.len()];
    // true entries are braces opened by a conditional construct
    let mut brace_stack: Vec<bool> = Vec::new();
    // ternary `?` spans until `;`, `,` at depth, or the end of the group
    let mut ternary_stack: Vec<usize> = Vec::new();
    let mut pending_conditional = false;
    // a brace-less `if (...)` body runs until the next `;` at this depth
    let mut stmt_conditional: Option<usize> = None;
    let mut ix = 0;

    while ix < tokens.len() {
        let token = &tokens[ix];
        let conditional_braces = brace_stack.iter().filter(|flag| **flag).count();
        depths[ix] = conditional_braces
            + ternary_stack.len()
            + usize::from(stmt_conditional.is_some())
            + usize::from(pending_conditional && !token.is_punct('{'));

        match &token.kind {
            TokenKind::Ident if token.text == "if" || token.text == "switch" => {
                depths[ix] = conditional_braces + ternary_stack.len();
                // skip the parenthesized condition
                if let Some(open) = tokens[ix + 1..]
                    .iter()
                    .position(|t| t.is_punct('('))
                    .map(|offset| ix + 1 + offset)
                {
                    if let Some(close) = matching(tokens, open) {
                        for slot in depths.iter_mut().take(close + 1).skip(ix) {
                            *slot = conditional_braces + ternary_stack.len();
                        }
                        ix = close;
                    }
                }
                pending_conditional = true;
            }
            TokenKind::Ident if token.text == "else" => {
                depths[ix] = conditional_braces + ternary_stack.len();
                pending_conditional = true;
            }
            TokenKind::Punct('{') => {
                brace_stack.push(pending_conditional);
                pending_conditional = false;
            }
            TokenKind::Punct('}') => {
                brace_stack.pop();
                ternary_stack.retain(|depth| *depth < brace_stack.len() + 1);
            }
            TokenKind::Punct('?') => {
                // `?.`, `??` and TS `?:` annotations are not ternaries
                let next_is_ternary = !matches!(
                    tokens.get(ix + 1).map(|t| &t.kind),
                    Some(TokenKind::Punct('.'))
                        | Some(TokenKind::Punct('?'))
                        | Some(TokenKind::Punct(':'))
                        | Some(TokenKind::Punct(')'))
                );
                if next_is_ternary {
                    ternary_stack.push(brace_stack.len());
                }
            }
            TokenKind::Punct(';') => {
                ternary_stack.clear();
                if stmt_conditional == Some(brace_stack.len()) {
                    stmt_conditional = None;
                }
            }
            _ => {
                if pending_conditional {
                    // `if (...)` without braces: the statement is conditional
                    pending_conditional = false;
                    stmt_conditional = Some(brace_stack.len());
                    depths[ix] = conditional_braces
                        + ternary_stack.len()
                        + usize::from(stmt_conditional.is_some());
                }
            }
        }
        ix += 1;
    }

    depths
}

/// A call site `receiver.method(...)` or `a.b.method(...)` found in a token
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Identifier chain up to the method, e.g. `["knex", "schema", "raw"]`.
    pub chain: Vec<String>,
    /// Index of the opening `(`.
    pub open_paren: usize,
    pub line: usize,
    pub col: usize,
}

/// Scan `tokens[range]` for call sites whose callee is a dotted identifier
/// chain.
pub fn find_calls(tokens: &[Token], range: std::ops::Range<usize>) -> Vec<CallSite> {
    let mut calls = Vec::new();
    let mut ix = range.start;
    while ix < range.end {
        let starts_chain = tokens[ix].kind == TokenKind::Ident
            && (ix == 0 || !tokens[ix - 1].is_punct('.'));
        if starts_chain {
            let mut chain = vec![tokens[ix].text.clone()];
            let line = tokens[ix].line;
            let col = tokens[ix].col;
            let mut jx = ix + 1;
            while jx + 1 < range.end
                && tokens[jx].is_punct('.')
                && tokens[jx + 1].kind == TokenKind::Ident
            {
                chain.push(tokens[jx + 1].text.clone());
                jx += 2;
            }
            if chain.len() > 1 && jx < range.end && tokens[jx].is_punct('(') {
                calls.push(CallSite {
                    chain,
                    open_paren: jx,
                    line,
                    col,
                });
            }
            // continue from the token after the receiver ident so chained
            // calls on a call result are still discovered
            ix += 1;
        } else {
            ix += 1;
        }
    }
    calls
}

/// Locate the body of the function assigned or declared at/after the `up`
/// identifier: skips parameters, return type annotations and `=>`, and
/// handles both block bodies and expression-bodied arrows.
pub fn function_body_after(tokens: &[Token], from: usize) -> Option<std::ops::Range<usize>> {
    let mut ix = from;
    // skip to the parameter list, tolerating `= async (…)`, `function (…)`
    while ix < tokens.len() && !tokens[ix].is_punct('(') {
        if tokens[ix].is_punct('{') {
            // object/method shorthand landed directly on a body
            let close = matching(tokens, ix)?;
            return Some(ix + 1..close);
        }
        ix += 1;
    }
    let close_params = matching(tokens, ix)?;
    let mut jx = close_params + 1;
    while jx < tokens.len() {
        if tokens[jx].is_punct('{') {
            let close = matching(tokens, jx)?;
            return Some(jx + 1..close);
        }
        if tokens[jx].is_punct('=')
            && tokens.get(jx + 1).map(|t| t.is_punct('>')).unwrap_or(false)
        {
            jx += 2;
            if tokens.get(jx).map(|t| t.is_punct('{')).unwrap_or(false) {
                let close = matching(tokens, jx)?;
                return Some(jx + 1..close);
            }
            // expression-bodied arrow: the body runs to the statement end
            let start = jx;
            let mut depth = 0usize;
            while jx < tokens.len() {
                match tokens[jx].kind {
                    TokenKind::Punct('(') | TokenKind::Punct('[') | TokenKind::Punct('{') => {
                        depth += 1
                    }
                    TokenKind::Punct(')') | TokenKind::Punct(']') | TokenKind::Punct('}') => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    TokenKind::Punct(';') | TokenKind::Punct(',') if depth == 0 => break,
                    _ => {}
                }
                jx += 1;
            }
            return Some(start..jx);
        }
        if tokens[jx].is_punct(';') {
            return None;
        }
        jx += 1;
    }
    None
}

/// The first parameter name of the function whose parameter list opens at
/// or after `from`.
pub fn first_param_name(tokens: &[Token], from: usize) -> Option<String> {
    let open = (from..tokens.len()).find(|ix| tokens[*ix].is_punct('('))?;
    let close = matching(tokens, open)?;
    tokens[open + 1..close]
        .iter()
        .find(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text.clone())
}
