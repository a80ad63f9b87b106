//! Request text parsing.
//!
//! A request is one or more statements, each closed by `;`:
//!
//! ```text
//! set container values c1, /data/sst.bin, raw;
//! define d as c1 with c1.constraint="sst[0:9]";
//! get dds for d return as json;
//! ```
//!
//! Tokens split on whitespace; `,` and `;` are tokens of their own; double
//! quotes group text (whitespace, commas and semicolons included) into the
//! surrounding token and are removed.

use bes_core::{DispatchError, DispatchResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Comma,
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Self::Word(word) => Some(word),
            Self::Comma => None,
        }
    }
}

/// One `;`-terminated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub tokens: Vec<Token>,
}

impl Statement {
    pub fn word(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).and_then(Token::as_word)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Lexeme {
    Word(String),
    Comma,
    Semicolon,
}

fn tokenize(text: &str) -> DispatchResult<Vec<Lexeme>> {
    let mut lexemes = Vec::new();
    let mut current = String::new();
    // Distinguishes `""` (an empty word) from no word at all.
    let mut in_word = false;
    let mut in_quotes = false;

    let flush = |current: &mut String, in_word: &mut bool, lexemes: &mut Vec<Lexeme>| {
        if *in_word {
            lexemes.push(Lexeme::Word(std::mem::take(current)));
            *in_word = false;
        }
    };

    for ch in text.chars() {
        if in_quotes {
            if ch == '"' {
                in_quotes = false;
            } else {
                current.push(ch);
            }
            continue;
        }

        match ch {
            '"' => {
                in_quotes = true;
                in_word = true;
            }
            ',' => {
                flush(&mut current, &mut in_word, &mut lexemes);
                lexemes.push(Lexeme::Comma);
            }
            ';' => {
                flush(&mut current, &mut in_word, &mut lexemes);
                lexemes.push(Lexeme::Semicolon);
            }
            c if c.is_whitespace() => flush(&mut current, &mut in_word, &mut lexemes),
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_quotes {
        return Err(DispatchError::syntax("unterminated quoted string"));
    }
    flush(&mut current, &mut in_word, &mut lexemes);
    Ok(lexemes)
}

/// Splits request text into statements.
///
/// # Errors
/// - `DispatchError::Syntax` for an unterminated quote, a statement without
///   its closing `;`, or a request with no statements at all
pub fn parse(text: &str) -> DispatchResult<Vec<Statement>> {
    let mut statements = Vec::new();
    let mut tokens = Vec::new();

    for lexeme in tokenize(text)? {
        match lexeme {
            Lexeme::Word(word) => tokens.push(Token::Word(word)),
            Lexeme::Comma => tokens.push(Token::Comma),
            Lexeme::Semicolon => {
                if !tokens.is_empty() {
                    statements.push(Statement {
                        tokens: std::mem::take(&mut tokens),
                    });
                }
            }
        }
    }

    if let Some(first) = tokens.first() {
        let start = first.as_word().unwrap_or(",");
        return Err(DispatchError::syntax(format!(
            "statement starting with '{start}' must be terminated by ';'"
        )));
    }
    if statements.is_empty() {
        return Err(DispatchError::syntax("empty request"));
    }
    Ok(statements)
}

/// Cursor over a command's arguments.
#[derive(Debug)]
pub struct Args<'a> {
    command: &'a str,
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Args<'a> {
    pub fn new(command: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            command,
            tokens,
            position: 0,
        }
    }

    pub fn command(&self) -> &'a str {
        self.command
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    pub fn peek_word(&self) -> Option<&'a str> {
        self.peek().and_then(Token::as_word)
    }

    /// Consumes the next word.
    pub fn word(&mut self, what: &str) -> DispatchResult<&'a str> {
        match self.peek() {
            Some(Token::Word(word)) => {
                self.position += 1;
                Ok(word)
            }
            Some(Token::Comma) => Err(self.error(format!("expected {what}, found ','"))),
            None => Err(self.error(format!("expected {what}"))),
        }
    }

    /// Consumes `keyword` or fails.
    pub fn expect(&mut self, keyword: &str) -> DispatchResult<()> {
        if self.accept(keyword) {
            Ok(())
        } else {
            let found = self.peek().map_or("end of statement", |t| t.as_word().unwrap_or(","));
            Err(self.error(format!("expected '{keyword}', found '{found}'")))
        }
    }

    /// Consumes `keyword` if it is next.
    pub fn accept(&mut self, keyword: &str) -> bool {
        if self.peek_word() == Some(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn accept_comma(&mut self) -> bool {
        if self.peek() == Some(&Token::Comma) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `word (, word)*`.
    pub fn word_list(&mut self, what: &str) -> DispatchResult<Vec<&'a str>> {
        let mut words = vec![self.word(what)?];
        while self.accept_comma() {
            words.push(self.word(what)?);
        }
        Ok(words)
    }

    /// Fails if anything is left.
    pub fn finish(&self) -> DispatchResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => {
                let extra = token.as_word().unwrap_or(",");
                Err(self.error(format!("unexpected '{extra}'")))
            }
        }
    }

    pub fn error(&self, message: String) -> DispatchError {
        DispatchError::syntax(format!("{}: {message}", self.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(statement: &Statement) -> Vec<String> {
        statement
            .tokens
            .iter()
            .map(|t| t.as_word().unwrap_or(",").to_string())
            .collect()
    }

    #[test]
    fn test_parse_multiple_statements() {
        let statements = parse("show version; get dds for d;").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(words(&statements[0]), vec!["show", "version"]);
        assert_eq!(words(&statements[1]), vec!["get", "dds", "for", "d"]);
    }

    #[test]
    fn test_commas_and_semicolons_split_without_whitespace() {
        let statements = parse("set container values c1,/data/a.bin,raw;").unwrap();
        assert_eq!(
            statements[0].tokens,
            vec![
                Token::Word("set".into()),
                Token::Word("container".into()),
                Token::Word("values".into()),
                Token::Word("c1".into()),
                Token::Comma,
                Token::Word("/data/a.bin".into()),
                Token::Comma,
                Token::Word("raw".into()),
            ]
        );
    }

    #[test]
    fn test_quotes_group_text() {
        let statements =
            parse(r#"define d as c with c.constraint="a[0:1], b; c"; set context x to "";"#)
                .unwrap();
        assert_eq!(
            statements[0].word(5),
            Some("c.constraint=a[0:1], b; c")
        );
        assert_eq!(statements[1].word(4), Some(""));
    }

    #[test]
    fn test_missing_semicolon_is_syntax_error() {
        let err = parse("show version").unwrap_err();
        assert!(matches!(err, DispatchError::Syntax(ref m) if m.contains("terminated by ';'")));

        assert!(parse("show version; show help").is_err());
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            parse(r#"set context a to "b;"#),
            Err(DispatchError::Syntax(_))
        ));
    }

    #[test]
    fn test_empty_statements_skipped_but_empty_request_rejected() {
        assert_eq!(parse(";; show help ;").unwrap().len(), 1);
        assert!(parse("   ").is_err());
        assert!(parse(";").is_err());
    }

    #[test]
    fn test_args_cursor() {
        let statements = parse("x in store values a, b, c;").unwrap();
        let mut args = Args::new("x", &statements[0].tokens[1..]);

        assert!(!args.accept("values"));
        assert!(args.accept("in"));
        assert_eq!(args.word("store name").unwrap(), "store");
        args.expect("values").unwrap();
        assert_eq!(args.word_list("name").unwrap(), vec!["a", "b", "c"]);
        assert!(args.is_empty());
        assert!(args.finish().is_ok());
    }

    #[test]
    fn test_args_errors_name_the_command() {
        let statements = parse("delete container;").unwrap();
        let mut args = Args::new("delete.container", &statements[0].tokens[2..]);
        let err = args.word("container name").unwrap_err();
        assert_eq!(
            err.to_string(),
            "syntax error: delete.container: expected container name"
        );
    }
}
