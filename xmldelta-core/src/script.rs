use thiserror::Error;

use crate::actions::EditAction;

/// Errors raised while parsing a textual edit script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A line does not start an action record.
    #[error("unknown diff format on line {0}")]
    BadFormat(usize),
    /// The input ended inside an unterminated action record.
    #[error("diff ended unexpectedly")]
    UnexpectedEnd,
    /// The verb of an action record is not part of the format.
    #[error("unknown action verb '{0}'")]
    UnknownVerb(String),
    /// An action record has the wrong shape.
    #[error("malformed action '{line}': {reason}")]
    Malformed { line: String, reason: String },
}

/// Parse the compact textual edit-script format back into actions.
///
/// The inverse of the compact formatter: every script it emits parses
/// without error, including the trailing old-text arguments of the text
/// updates, which are preserved so the round-trip is exact.
pub fn parse_diff(text: &str) -> Result<Vec<EditAction>, ScriptError> {
    let mut actions = Vec::new();
    let mut incomplete = String::new();

    for (number, raw_line) in text.lines().enumerate() {
        let line = if incomplete.is_empty() {
            raw_line.to_string()
        } else {
            // A record whose closing bracket has not appeared yet
            // continues on the following line.
            format!("{incomplete}{raw_line}")
        };
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('[') {
            return Err(ScriptError::BadFormat(number + 1));
        }
        if !line.ends_with(']') {
            incomplete = line;
            continue;
        }
        incomplete.clear();
        actions.push(parse_action(&line)?);
    }

    if !incomplete.is_empty() {
        return Err(ScriptError::UnexpectedEnd);
    }
    Ok(actions)
}

fn parse_action(line: &str) -> Result<EditAction, ScriptError> {
    let inner = &line[1..line.len() - 1];
    let tokens = split_arguments(inner, line)?;
    let (verb, args) = tokens
        .split_first()
        .ok_or_else(|| malformed(line, "empty action record"))?;

    let action = match verb.as_str() {
        "delete" => EditAction::DeleteNode {
            node: arg(args, 0, line)?,
        },
        "insert" => EditAction::InsertNode {
            target: arg(args, 0, line)?,
            tag: arg(args, 1, line)?,
            position: position(args, 2, line)?,
        },
        "rename" => EditAction::RenameNode {
            node: arg(args, 0, line)?,
            tag: arg(args, 1, line)?,
        },
        "move" => EditAction::MoveNode {
            node: arg(args, 0, line)?,
            target: arg(args, 1, line)?,
            position: position(args, 2, line)?,
        },
        "update-text" => EditAction::UpdateTextIn {
            node: arg(args, 0, line)?,
            text: optional_string(args, 1, line)?,
            old_text: match args.get(2) {
                Some(_) => optional_string(args, 2, line)?,
                None => None,
            },
        },
        "update-text-after" => EditAction::UpdateTextAfter {
            node: arg(args, 0, line)?,
            text: optional_string(args, 1, line)?,
            old_text: match args.get(2) {
                Some(_) => optional_string(args, 2, line)?,
                None => None,
            },
        },
        "update-attribute" => EditAction::UpdateAttrib {
            node: arg(args, 0, line)?,
            name: arg(args, 1, line)?,
            value: string(args, 2, line)?,
        },
        "delete-attribute" => EditAction::DeleteAttrib {
            node: arg(args, 0, line)?,
            name: arg(args, 1, line)?,
        },
        "insert-attribute" => EditAction::InsertAttrib {
            node: arg(args, 0, line)?,
            name: arg(args, 1, line)?,
            value: string(args, 2, line)?,
        },
        "rename-attribute" => EditAction::RenameAttrib {
            node: arg(args, 0, line)?,
            old_name: arg(args, 1, line)?,
            new_name: arg(args, 2, line)?,
        },
        "insert-comment" => EditAction::InsertComment {
            target: arg(args, 0, line)?,
            position: position(args, 1, line)?,
            text: string(args, 2, line)?,
        },
        "insert-namespace" => EditAction::InsertNamespace {
            prefix: arg(args, 0, line)?,
            uri: arg(args, 1, line)?,
        },
        "delete-namespace" => EditAction::DeleteNamespace {
            prefix: arg(args, 0, line)?,
        },
        other => return Err(ScriptError::UnknownVerb(other.to_string())),
    };
    Ok(action)
}

/// Split the inside of a record on commas outside JSON-quoted strings.
fn split_arguments(inner: &str, line: &str) -> Result<Vec<String>, ScriptError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in inner.chars() {
        if in_string {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            ',' => {
                tokens.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if in_string {
        return Err(malformed(line, "unterminated string"));
    }
    tokens.push(current.trim().to_string());
    Ok(tokens)
}

fn arg(args: &[String], index: usize, line: &str) -> Result<String, ScriptError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| malformed(line, "missing argument"))
}

fn position(args: &[String], index: usize, line: &str) -> Result<usize, ScriptError> {
    arg(args, index, line)?
        .parse()
        .map_err(|_| malformed(line, "position is not a non-negative integer"))
}

/// A JSON-quoted string argument.
fn string(args: &[String], index: usize, line: &str) -> Result<String, ScriptError> {
    let token = arg(args, index, line)?;
    serde_json::from_str(&token).map_err(|_| malformed(line, "malformed JSON string"))
}

/// A JSON-quoted string argument or `null`.
fn optional_string(args: &[String], index: usize, line: &str) -> Result<Option<String>, ScriptError> {
    let token = arg(args, index, line)?;
    if token == "null" {
        return Ok(None);
    }
    serde_json::from_str(&token)
        .map(Some)
        .map_err(|_| malformed(line, "malformed JSON string"))
}

fn malformed(line: &str, reason: &str) -> ScriptError {
    ScriptError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_verb() {
        let script = concat!(
            "[delete, /root/a[1]]\n",
            "[insert, /root[1], para, 2]\n",
            "[rename, /root/a[1], b]\n",
            "[move, /root/a[1], /root/b[1], 0]\n",
            "[update-text, /root/a[1], \"new\", \"old\"]\n",
            "[update-text-after, /root/a[1], null]\n",
            "[update-attribute, /root/a[1], attr, \"v\"]\n",
            "[delete-attribute, /root/a[1], attr]\n",
            "[insert-attribute, /root/a[1], attr, \"v\"]\n",
            "[rename-attribute, /root/a[1], old, new]\n",
            "[insert-comment, /root[1], 0, \" hi \"]\n",
            "[insert-namespace, s, urn:s]\n",
            "[delete-namespace, s]",
        );
        let actions = parse_diff(script).unwrap();
        assert_eq!(actions.len(), 13);
        assert_eq!(
            actions[0],
            EditAction::DeleteNode {
                node: "/root/a[1]".to_string()
            }
        );
        assert_eq!(
            actions[4],
            EditAction::UpdateTextIn {
                node: "/root/a[1]".to_string(),
                text: Some("new".to_string()),
                old_text: Some("old".to_string()),
            }
        );
        assert_eq!(
            actions[5],
            EditAction::UpdateTextAfter {
                node: "/root/a[1]".to_string(),
                text: None,
                old_text: None,
            }
        );
    }

    #[test]
    fn strings_keep_commas_quotes_and_non_ascii() {
        let script = "[update-text, /r[1], \"a, b \\\"c\\\" — ø\", null]";
        let actions = parse_diff(script).unwrap();
        assert_eq!(
            actions[0],
            EditAction::UpdateTextIn {
                node: "/r[1]".to_string(),
                text: Some("a, b \"c\" — ø".to_string()),
                old_text: None,
            }
        );
    }

    #[test]
    fn unknown_verbs_are_fatal() {
        assert!(matches!(
            parse_diff("[explode, /r[1]]"),
            Err(ScriptError::UnknownVerb(verb)) if verb == "explode"
        ));
    }

    #[test]
    fn unterminated_record_is_fatal() {
        assert!(matches!(
            parse_diff("[delete, /r[1]"),
            Err(ScriptError::UnexpectedEnd)
        ));
    }

    #[test]
    fn records_may_span_lines() {
        let script = "[insert,\n /root[1], para, 0]";
        let actions = parse_diff(script).unwrap();
        assert_eq!(
            actions[0],
            EditAction::InsertNode {
                target: "/root[1]".to_string(),
                tag: "para".to_string(),
                position: 0,
            }
        );
    }

    #[test]
    fn lines_outside_records_are_rejected() {
        assert!(matches!(
            parse_diff("delete, /r[1]]"),
            Err(ScriptError::BadFormat(1))
        ));
    }
}
