use crate::actions::EditAction;
use crate::format::{FormatError, Formatter, Normalize};
use crate::tree::Document;

/// The compact textual rendering: one bracketed record per action, string
/// arguments JSON-quoted so they survive commas and embedded quotes.
pub struct DiffFormatter {
    normalize: Normalize,
}

impl DiffFormatter {
    pub fn new(normalize: Normalize) -> Self {
        Self { normalize }
    }
}

impl Default for DiffFormatter {
    fn default() -> Self {
        Self::new(Normalize::Tags)
    }
}

impl Formatter for DiffFormatter {
    fn normalize(&self) -> Normalize {
        self.normalize
    }

    fn format(&mut self, actions: &[EditAction], _left: &Document) -> Result<String, FormatError> {
        Ok(actions
            .iter()
            .map(format_action)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn format_action(action: &EditAction) -> String {
    let fields: Vec<String> = match action {
        EditAction::DeleteNode { node } => vec!["delete".into(), node.clone()],
        EditAction::InsertNode {
            target,
            tag,
            position,
        } => vec![
            "insert".into(),
            target.clone(),
            tag.clone(),
            position.to_string(),
        ],
        EditAction::RenameNode { node, tag } => {
            vec!["rename".into(), node.clone(), tag.clone()]
        }
        EditAction::MoveNode {
            node,
            target,
            position,
        } => vec![
            "move".into(),
            node.clone(),
            target.clone(),
            position.to_string(),
        ],
        EditAction::UpdateTextIn {
            node,
            text,
            old_text,
        } => vec![
            "update-text".into(),
            node.clone(),
            quote_opt(text),
            quote_opt(old_text),
        ],
        EditAction::UpdateTextAfter {
            node,
            text,
            old_text,
        } => vec![
            "update-text-after".into(),
            node.clone(),
            quote_opt(text),
            quote_opt(old_text),
        ],
        EditAction::UpdateAttrib { node, name, value } => vec![
            "update-attribute".into(),
            node.clone(),
            name.clone(),
            quote(value),
        ],
        EditAction::DeleteAttrib { node, name } => {
            vec!["delete-attribute".into(), node.clone(), name.clone()]
        }
        EditAction::InsertAttrib { node, name, value } => vec![
            "insert-attribute".into(),
            node.clone(),
            name.clone(),
            quote(value),
        ],
        EditAction::RenameAttrib {
            node,
            old_name,
            new_name,
        } => vec![
            "rename-attribute".into(),
            node.clone(),
            old_name.clone(),
            new_name.clone(),
        ],
        EditAction::InsertComment {
            target,
            position,
            text,
        } => vec![
            "insert-comment".into(),
            target.clone(),
            position.to_string(),
            quote(text),
        ],
        EditAction::InsertNamespace { prefix, uri } => {
            vec!["insert-namespace".into(), prefix.clone(), uri.clone()]
        }
        EditAction::DeleteNamespace { prefix } => {
            vec!["delete-namespace".into(), prefix.clone()]
        }
    };
    format!("[{}]", fields.join(", "))
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).expect("strings always serialize to JSON")
}

fn quote_opt(value: &Option<String>) -> String {
    match value {
        Some(value) => quote(value),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn renders_one_record_per_action() {
        let doc = parse(b"<r/>").unwrap();
        let actions = [
            EditAction::UpdateAttrib {
                node: "/root/node[1]".to_string(),
                name: "attr2".to_string(),
                value: "uhhuh".to_string(),
            },
            EditAction::UpdateTextAfter {
                node: "/root/node[1]".to_string(),
                text: Some("Also a tail!".to_string()),
                old_text: Some("And a tail!".to_string()),
            },
        ];
        let mut formatter = DiffFormatter::default();
        let out = formatter.format(&actions, &doc).unwrap();
        assert_eq!(
            out,
            "[update-attribute, /root/node[1], attr2, \"uhhuh\"]\n\
             [update-text-after, /root/node[1], \"Also a tail!\", \"And a tail!\"]"
        );
    }

    #[test]
    fn json_quoting_escapes_embedded_quotes() {
        let doc = parse(b"<r/>").unwrap();
        let actions = [EditAction::UpdateTextIn {
            node: "/r[1]".to_string(),
            text: Some("say \"hi\", twice".to_string()),
            old_text: None,
        }];
        let out = DiffFormatter::default().format(&actions, &doc).unwrap();
        assert_eq!(
            out,
            "[update-text, /r[1], \"say \\\"hi\\\", twice\", null]"
        );
    }
}
