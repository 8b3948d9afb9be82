//! `$VAR` / `${VAR}` expansion for paths taken from the config file.

use std::path::PathBuf;

/// Expands environment references, keeping unknown or malformed ones literally.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    let var = &braced[..end];
                    match lookup(var) {
                        Some(val) => result.push_str(&val),
                        None => {
                            result.push_str("${");
                            result.push_str(var);
                            result.push('}');
                        }
                    }
                    rest = &braced[end + 1..];
                }
                None => {
                    result.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let var_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if var_len == 0 {
            result.push('$');
            rest = after;
            continue;
        }

        let var = &after[..var_len];
        match lookup(var) {
            Some(val) => result.push_str(&val),
            None => {
                result.push('$');
                result.push_str(var);
            }
        }
        rest = &after[var_len..];
    }

    result.push_str(rest);
    result
}

pub fn resolve_path_with_environment(path: &str) -> PathBuf {
    PathBuf::from(expand_with(path, |var| std::env::var(var).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(var: &str) -> Option<String> {
        match var {
            "HOME" => Some("/home/user".into()),
            "XDG_CONFIG_HOME" => Some("/home/user/.config".into()),
            _ => None,
        }
    }

    #[test]
    fn test_plain_and_braced_variables() {
        assert_eq!(expand_with("$HOME/Backups", lookup), "/home/user/Backups");
        assert_eq!(
            expand_with("${XDG_CONFIG_HOME}/backman/backman.ini", lookup),
            "/home/user/.config/backman/backman.ini"
        );
        assert_eq!(
            expand_with("a${HOME}b$HOME", lookup),
            "a/home/userb/home/user"
        );
    }

    #[test]
    fn test_unknown_variables_are_kept() {
        assert_eq!(expand_with("$NOPE/x", lookup), "$NOPE/x");
        assert_eq!(expand_with("${NOPE}/x", lookup), "${NOPE}/x");
    }

    #[test]
    fn test_malformed_references_are_kept() {
        assert_eq!(expand_with("cost $5", lookup), "cost $5");
        assert_eq!(expand_with("trailing $", lookup), "trailing $");
        assert_eq!(expand_with("${HOME", lookup), "${HOME");
        assert_eq!(expand_with("$/x", lookup), "$/x");
    }

    #[test]
    fn test_no_references() {
        assert_eq!(expand_with("/srv/data", lookup), "/srv/data");
        assert_eq!(expand_with("", lookup), "");
    }
}
