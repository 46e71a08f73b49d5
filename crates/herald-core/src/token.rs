//! Tokenization of raw command input and the cursor resolvers read from.

use std::ops::Range;

use crate::error::CommandError;

/// A single input token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
    span: Range<usize>,
    quoted: bool,
}

impl Token {
    /// Creates a token that did not come from the input line, such as a
    /// default value parsed by a resolver.
    #[must_use]
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: 0..0,
            quoted: false,
        }
    }

    /// Returns the token text with any surrounding quotes removed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the byte span of the token in the raw input, quotes included.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Returns `true` when the token was written in quotes.
    #[must_use]
    pub const fn is_quoted(&self) -> bool {
        self.quoted
    }
}

/// Splits `input` into tokens.
///
/// Tokens are separated by runs of whitespace. A token starting with `'` or
/// `"` runs to the next occurrence of the same quote character, may contain
/// whitespace, and has its quotes removed. Escape sequences are not
/// processed. Text directly after a closing quote begins a new token.
///
/// # Errors
///
/// Returns [`CommandError::UnclosedQuote`] with the byte offset of the
/// opening quote when a quoted token never closes.
///
/// # Example
///
/// ```
/// use herald_core::tokenize;
///
/// let tokens = tokenize(r#"say "hello world" twice"#).unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|token| token.text()).collect();
/// assert_eq!(texts, ["say", "hello world", "twice"]);
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, CommandError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, first)) = chars.peek() {
        if first.is_whitespace() {
            chars.next();
            continue;
        }

        if first == '"' || first == '\'' {
            chars.next();
            let content_start = start + first.len_utf8();
            let close = chars.by_ref().find(|&(_, c)| c == first);
            let Some((end, _)) = close else {
                return Err(CommandError::UnclosedQuote { offset: start });
            };
            tokens.push(Token {
                text: input.get(content_start..end).unwrap_or_default().to_owned(),
                span: start..end + first.len_utf8(),
                quoted: true,
            });
            continue;
        }

        let mut end = input.len();
        while let Some(&(index, c)) = chars.peek() {
            if c.is_whitespace() {
                end = index;
                break;
            }
            chars.next();
        }
        tokens.push(Token {
            text: input.get(start..end).unwrap_or_default().to_owned(),
            span: start..end,
            quoted: false,
        });
    }

    Ok(tokens)
}

/// Forward-only view over a token list.
///
/// Value resolvers pull tokens from the cursor; the pipeline checks after
/// resolution that nothing is left over.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> TokenCursor<'a> {
    /// Creates a cursor at the first token.
    #[must_use]
    pub const fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Creates a cursor at `position`.
    #[must_use]
    pub const fn at(tokens: &'a [Token], position: usize) -> Self {
        Self { tokens, position }
    }

    /// Returns the next token without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    /// Returns the tokens not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [Token] {
        self.tokens.get(self.position..).unwrap_or_default()
    }

    /// Returns `true` when every token has been consumed.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Returns the index of the next token.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.position
    }

    /// Consumes the next token or fails naming `parameter`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotEnoughArguments`] when the cursor is
    /// exhausted.
    pub fn require(&mut self, parameter: &str) -> Result<&'a Token, CommandError> {
        self.next()
            .ok_or_else(|| CommandError::not_enough_arguments(parameter))
    }

    /// Consumes every remaining token and joins their texts with single
    /// spaces.
    pub fn join_remaining(&mut self) -> String {
        let joined = self
            .remaining()
            .iter()
            .map(Token::text)
            .collect::<Vec<_>>()
            .join(" ");
        self.position = self.tokens.len();
        joined
    }
}

impl<'a> Iterator for TokenCursor<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }
}
