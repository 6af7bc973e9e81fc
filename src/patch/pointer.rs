//! JSON Pointer (RFC 6901) helpers.

/// Escape a single reference token (`~` -> `~0`, `/` -> `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Append an escaped token to an existing pointer.
pub fn push_token(base: &str, token: &str) -> String {
    let mut path = String::with_capacity(base.len() + token.len() + 1);
    path.push_str(base);
    path.push('/');
    path.push_str(&escape_token(token));
    path
}

/// Split a pointer into unescaped reference tokens.
///
/// The empty pointer addresses the whole document and yields no tokens.
pub fn parse_pointer(path: &str) -> Result<Vec<String>, String> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| format!("pointer {:?} must start with '/'", path))?;

    rest.split('/').map(unescape_token).collect()
}

fn unescape_token(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                return Err(format!(
                    "invalid escape '~{}' in token {:?}",
                    other.map(String::from).unwrap_or_default(),
                    raw
                ))
            }
        }
    }
    Ok(out)
}

/// Parse an array index token. Leading zeros and signs are rejected.
pub(crate) fn parse_index(token: &str) -> Result<usize, String> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !valid {
        return Err(format!("{:?} is not an array index", token));
    }
    token
        .parse::<usize>()
        .map_err(|_| format!("{:?} is not an array index", token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_pointer_has_no_tokens() {
        assert!(parse_pointer("").unwrap().is_empty());
    }

    #[test]
    fn test_escape_roundtrip() {
        let path = push_token(&push_token("", "a/b"), "c~d");
        assert_eq!(path, "/a~1b/c~0d");
        assert_eq!(parse_pointer(&path).unwrap(), vec!["a/b", "c~d"]);
    }

    #[test]
    fn test_tilde_one_literal() {
        // "~01" must decode to "~1", not "/"
        assert_eq!(parse_pointer("/~01").unwrap(), vec!["~1"]);
    }

    #[test]
    fn test_empty_token() {
        assert_eq!(parse_pointer("/").unwrap(), vec![""]);
    }

    #[test]
    fn test_invalid_pointers() {
        assert!(parse_pointer("a/b").is_err());
        assert!(parse_pointer("/a~2").is_err());
        assert!(parse_pointer("/a~").is_err());
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0").unwrap(), 0);
        assert_eq!(parse_index("17").unwrap(), 17);
        assert!(parse_index("01").is_err());
        assert!(parse_index("+1").is_err());
        assert!(parse_index("-").is_err());
        assert!(parse_index("").is_err());
    }
}
