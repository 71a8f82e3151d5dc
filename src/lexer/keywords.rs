//! Reserved-word lookup table, built once via `once_cell` the way the teacher's lexer builds its
//! `LEX_MAP` through `lazy_static!`.
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::token::TokenKind;

pub static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    use TokenKind::*;
    HashMap::from([
        ("module", Module),
        ("bring", Bring),
        ("fun", Fun),
        ("entry", Entry),
        ("class", Class),
        ("pub", Pub),
        ("lock", Lock),
        ("seal", Seal),
        ("let", Let),
        ("const", Const),
        ("if", If),
        ("else", Else),
        ("elif", Elif),
        ("return", Return),
        ("for", For),
        ("match", Match),
        ("new", New),
        ("in", In),
        ("true", True),
        ("false", False),
        ("null", Null),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_do_not_include_identifiers() {
        assert_eq!(KEYWORDS.get("this"), None);
        assert_eq!(KEYWORDS.get("foo"), None);
    }

    #[test]
    fn every_keyword_resolves() {
        assert_eq!(KEYWORDS.get("fun"), Some(&TokenKind::Fun));
        assert_eq!(KEYWORDS.get("seal"), Some(&TokenKind::Seal));
    }
}
