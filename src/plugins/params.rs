// src/plugins/params.rs

use crate::core::{
    arg_parser::{ParsedArgs, ParsedOptions},
    handler::UsageError,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// A handler's own view of its arguments, with `-p key value` and
/// `-a key value` pairs pulled out of the token stream.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct KeyValueArgs {
    pub positional: Vec<String>,
    pub params: Map<String, Value>,
    pub annotations: Map<String, Value>,
    /// Every other option, parsed the way the dispatcher parses them.
    pub flags: ParsedOptions,
}

#[derive(Clone, Copy)]
enum PairKind {
    Param,
    Annotation,
}

fn pair_kind(token: &str) -> Option<PairKind> {
    match token {
        "-p" | "--param" => Some(PairKind::Param),
        "-a" | "--annotation" => Some(PairKind::Annotation),
        _ => None,
    }
}

/// Decodes `raw` as JSON, keeping it as a plain string when it is not valid JSON.
pub fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Re-parses `full_argv` with no boolean flags declared.
pub fn parse_key_values(full_argv: &[String]) -> Result<KeyValueArgs, UsageError> {
    parse_key_values_with(full_argv, &[])
}

/// Pulls `-p`/`--param` and `-a`/`--annotation` pairs out of `full_argv`,
/// then parses the remaining tokens with `boolean_flags` declared.
///
/// # Errors
/// Returns a `UsageError` when a pair flag is missing its key or its value.
pub fn parse_key_values_with(
    full_argv: &[String],
    boolean_flags: &[&str],
) -> Result<KeyValueArgs, UsageError> {
    let mut args = KeyValueArgs::default();
    let mut rest: Vec<String> = Vec::with_capacity(full_argv.len());
    let mut tokens = full_argv.iter();

    while let Some(token) = tokens.next() {
        if token == "--" {
            rest.push(token.clone());
            rest.extend(tokens.by_ref().cloned());
            break;
        }

        let Some(kind) = pair_kind(token) else {
            rest.push(token.clone());
            continue;
        };

        let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
            return Err(UsageError::new(format!(
                "'{}' expects a key and a value, e.g. {} name value",
                token, token
            )));
        };

        let target = match kind {
            PairKind::Param => &mut args.params,
            PairKind::Annotation => &mut args.annotations,
        };
        if target.insert(key.clone(), decode_value(value)).is_some() {
            log::debug!("'{}' given twice for key '{}'; last value wins", token, key);
        }
    }

    let parsed = ParsedArgs::new(&rest, boolean_flags);
    args.positional = parsed.positional;
    args.flags = parsed.named;
    Ok(args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn argv(line: &str) -> Vec<String> {
        shlex::split(line).unwrap()
    }

    #[test]
    fn test_params_and_annotations_are_json_decoded() {
        let args = parse_key_values(&argv(
            r#"hello -p count 3 --param who '"bob"' -a web-export true -p note plain"#,
        ))
        .unwrap();

        assert_eq!(args.positional, vec!["hello"]);
        assert_eq!(
            Value::Object(args.params),
            json!({ "count": 3, "who": "bob", "note": "plain" })
        );
        assert_eq!(Value::Object(args.annotations), json!({ "web-export": true }));
        assert!(args.flags.is_empty());
    }

    #[test]
    fn test_structured_values_and_repeated_keys() {
        let args = parse_key_values(&argv(r#"-p cfg '{"a":[1,2]}' -p cfg 2"#)).unwrap();
        assert_eq!(args.params.get("cfg"), Some(&json!(2)));

        let args = parse_key_values(&argv(r#"-p cfg '{"a":[1,2]}'"#)).unwrap();
        assert_eq!(args.params.get("cfg"), Some(&json!({ "a": [1, 2] })));
    }

    #[test]
    fn test_remaining_flags_respect_boolean_declarations() {
        let args = parse_key_values_with(&argv("--async hello -p x 1 --limit 5"), &["async"]).unwrap();
        assert_eq!(args.positional, vec!["hello"]);
        assert_eq!(args.flags.get("async"), Some(&json!(true)));
        assert_eq!(args.flags.get("limit"), Some(&json!("5")));
        assert_eq!(args.params.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_missing_value_is_a_usage_error() {
        let err = parse_key_values(&argv("hello -p onlykey")).unwrap_err();
        assert!(err.message.contains("-p"));
        assert!(parse_key_values(&argv("-a")).is_err());
    }

    #[test]
    fn test_double_dash_stops_pair_extraction() {
        let args = parse_key_values(&argv("name -- -p x 1")).unwrap();
        assert!(args.params.is_empty());
        assert_eq!(args.positional, vec!["name", "-p", "x", "1"]);
    }
}
