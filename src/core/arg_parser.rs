// src/core/arg_parser.rs

use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed `-x` / `--xxx` options, keyed by flag name without dashes.
pub type ParsedOptions = BTreeMap<String, Value>;

/// The tokens following a command path, split into positionals and options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    pub named: ParsedOptions,
}

/// A token is a flag when it starts with a dash and is not a lone `-` or a
/// negative number.
pub fn is_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token.parse::<f64>().is_err()
}

impl ParsedArgs {
    /// Classifies the tokens that follow the command path.
    ///
    /// # Logic:
    /// - `--` ends option parsing; everything after it is positional.
    /// - `--name=value` sets `name` to `value`.
    /// - `-name` / `--name` declared in `boolean_flags` is `true` and takes no value.
    /// - Any other flag consumes the next token as its value, unless that token is
    ///   itself a flag or there is none, in which case the flag is `true`.
    /// - A flag given more than once collects its values into an array.
    /// - Everything else is positional.
    pub fn new(tokens: &[String], boolean_flags: &[&str]) -> Self {
        let mut parsed = ParsedArgs::default();
        let mut tokens_iter = tokens.iter().peekable();

        while let Some(token) = tokens_iter.next() {
            if token == "--" {
                parsed.positional.extend(tokens_iter.by_ref().cloned());
                break;
            }

            if !is_flag(token) {
                parsed.positional.push(token.clone());
                continue;
            }

            let bare = token.trim_start_matches('-');
            if let Some((name, value)) = bare.split_once('=') {
                parsed.insert(name, Value::String(value.to_string()));
                continue;
            }

            let value = if boolean_flags.contains(&bare) {
                Value::Bool(true)
            } else {
                match tokens_iter.next_if(|next| !is_flag(next) && next.as_str() != "--") {
                    Some(next) => Value::String(next.clone()),
                    None => Value::Bool(true),
                }
            };
            parsed.insert(bare, value);
        }

        parsed
    }

    fn insert(&mut self, name: &str, value: Value) {
        match self.named.get_mut(name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.named.insert(name.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_flags_consume_one_value() {
        let parsed = ParsedArgs::new(&tokens("myAction -p x 1"), &[]);
        assert_eq!(parsed.positional, vec!["myAction", "1"]);
        assert_eq!(parsed.named.get("p"), Some(&json!("x")));
    }

    #[test]
    fn test_boolean_flags_take_no_value() {
        let parsed = ParsedArgs::new(&tokens("--async hello --limit 5"), &["async"]);
        assert_eq!(parsed.positional, vec!["hello"]);
        assert_eq!(parsed.named.get("async"), Some(&json!(true)));
        assert_eq!(parsed.named.get("limit"), Some(&json!("5")));
    }

    #[test]
    fn test_trailing_flag_and_flag_before_flag_are_true() {
        let parsed = ParsedArgs::new(&tokens("--verbose --json"), &[]);
        assert!(parsed.positional.is_empty());
        assert_eq!(parsed.named.get("verbose"), Some(&json!(true)));
        assert_eq!(parsed.named.get("json"), Some(&json!(true)));
    }

    #[test]
    fn test_equals_form_and_negative_numbers() {
        let parsed = ParsedArgs::new(&tokens("--limit=10 -5 --skip -1"), &[]);
        assert_eq!(parsed.named.get("limit"), Some(&json!("10")));
        assert_eq!(parsed.named.get("skip"), Some(&json!("-1")));
        assert_eq!(parsed.positional, vec!["-5"]);
    }

    #[test]
    fn test_double_dash_ends_options() {
        let parsed = ParsedArgs::new(&tokens("run -- --not-a-flag x"), &[]);
        assert_eq!(parsed.positional, vec!["run", "--not-a-flag", "x"]);
        assert!(parsed.named.is_empty());
    }

    #[test]
    fn test_repeated_flags_collect_into_array() {
        let parsed = ParsedArgs::new(&tokens("-t a -t b -t c"), &[]);
        assert_eq!(parsed.named.get("t"), Some(&json!(["a", "b", "c"])));
    }
}
