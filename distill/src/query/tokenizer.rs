use nom::{
    branch::alt,
    bytes::complete::{take_until, take_while, take_while1},
    character::complete::char,
    combinator::{map, verify},
    multi::many0,
    sequence::{delimited, preceded, separated_pair},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare whitespace-delimited fragment
    Word(String),
    /// Double-quoted span with the quotes stripped
    Phrase(String),
    /// `key=value`, value possibly quoted
    Pair(String, String),
}

fn is_key_char(c: char) -> bool {
    !c.is_whitespace() && c != '=' && c != '"'
}

/// Parse a field key: everything up to the first `=`
fn key(input: &str) -> IResult<&str, &str> {
    take_while1(is_key_char)(input)
}

/// Parse a quoted string
fn quoted_string(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_until("\""), char('"'))(input)
}

/// Parse anything up to the next whitespace
fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

/// Parse key=value with a non-empty value
fn pair(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        key,
        char('='),
        verify(alt((quoted_string, bare)), |v: &str| !v.is_empty()),
    )(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        map(pair, |(k, v)| Token::Pair(k.to_string(), v.to_string())),
        map(quoted_string, |s| Token::Phrase(s.to_string())),
        map(bare, |s| Token::Word(s.to_string())),
    ))(input)
}

/// Any run of whitespace, including non-ASCII spaces
fn space(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

pub fn tokenize(input: &str) -> IResult<&str, Vec<Token>> {
    many0(preceded(space, token))(input)
}
