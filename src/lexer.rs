//! Lexical analysis for the interpreter: splitting a raw line into tokens.

/// Split an input line into whitespace-separated tokens.
///
/// Runs of whitespace collapse into a single separator and empty input
/// yields an empty vector. There is no quoting support, so a token
/// containing whitespace cannot be expressed; operators such as `|` or
/// `>>` are ordinary tokens recognized later by the parser.
pub(crate) fn split_into_tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}
