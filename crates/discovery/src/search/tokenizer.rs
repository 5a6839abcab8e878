//! Tokenizer for mixed Chinese and Latin text
//!
//! Each Han ideograph, hiragana and katakana character is its own token; runs
//! of other alphanumeric characters form word tokens. Multi-character Chinese
//! queries therefore become phrase queries over consecutive ideographs.

use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, TextAnalyzer, Token, TokenStream, Tokenizer};

/// Name the analyzer is registered under on every index
pub const CJK_TOKENIZER: &str = "cjk";

/// Word tokens longer than this many bytes are dropped
const MAX_TOKEN_BYTES: usize = 40;

/// Han, kana and CJK compatibility ranges
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2EBEF
        | 0x30000..=0x3134F)
}

/// True when `token` is a single ideograph emitted by [`CjkTokenizer`]
pub fn is_cjk_token(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if is_cjk(c))
}

/// The analyzer every text field is indexed and queried with
pub fn cjk_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(CjkTokenizer)
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .filter(LowerCaser)
        .build()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CjkTokenizer;

pub struct CjkTokenStream {
    /// Remaining tokens, last first
    pending: Vec<Token>,
    current: Token,
}

impl Tokenizer for CjkTokenizer {
    type TokenStream<'a> = CjkTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> CjkTokenStream {
        let mut tokens = split(text);
        tokens.reverse();
        CjkTokenStream {
            pending: tokens,
            current: Token::default(),
        }
    }
}

impl TokenStream for CjkTokenStream {
    fn advance(&mut self) -> bool {
        match self.pending.pop() {
            Some(token) => {
                self.current = token;
                true
            }
            None => false,
        }
    }

    fn token(&self) -> &Token {
        &self.current
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.current
    }
}

fn split(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    let push = |tokens: &mut Vec<Token>, from: usize, to: usize| {
        let position = tokens.len();
        tokens.push(Token {
            offset_from: from,
            offset_to: to,
            position,
            text: text[from..to].to_string(),
            position_length: 1,
        });
    };

    for (offset, c) in text.char_indices() {
        if is_cjk(c) {
            if let Some(start) = word_start.take() {
                push(&mut tokens, start, offset);
            }
            push(&mut tokens, offset, offset + c.len_utf8());
        } else if c.is_alphanumeric() {
            word_start.get_or_insert(offset);
        } else if let Some(start) = word_start.take() {
            push(&mut tokens, start, offset);
        }
    }
    if let Some(start) = word_start {
        push(&mut tokens, start, text.len());
    }
    tokens
}
