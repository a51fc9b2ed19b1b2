//! Predicate construction shared by the two search paths (§4.2.4, §4.2.5).

/// Escapes `%`, `_`, and `\` so a free-text term can be embedded literally
/// in an `ILIKE '%term%'` pattern (§4.2.4).
pub fn escape_like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like_pattern(term))
}

/// Builds a `tsquery` string from a free-text term (§4.2.5): the term is
/// split on whitespace, every token but the last is used verbatim, and the
/// final token is suffixed with `:*` so a partially typed word still
/// matches. Tokens are combined with `&`.
///
/// `to_tsquery` requires its input to already look like a valid
/// lexeme-and-operator expression, so each token is quoted to survive
/// embedded punctuation from the ABR feed (e.g. `O'BRIEN`).
pub fn build_prefix_tsquery(term: &str) -> String {
    let tokens: Vec<&str> = term.split_whitespace().collect();
    let last_index = tokens.len().saturating_sub(1);

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let quoted = quote_lexeme(token);
            if i == last_index {
                format!("{quoted}:*")
            } else {
                quoted
            }
        })
        .collect::<Vec<_>>()
        .join(" & ")
}

fn quote_lexeme(token: &str) -> String {
    format!("'{}'", token.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like_pattern("100%_done\\"), "100\\%\\_done\\\\");
    }

    #[test]
    fn single_token_gets_prefix_marker() {
        assert_eq!(build_prefix_tsquery("vantage"), "'vantage':*");
    }

    #[test]
    fn multi_token_only_suffixes_last() {
        assert_eq!(
            build_prefix_tsquery("vantage sear"),
            "'vantage' & 'sear':*"
        );
    }
}
