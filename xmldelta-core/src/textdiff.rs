use similar::{capture_diff_slices, Algorithm, DiffTag};

/// One operation of a character-level text diff. Deletions sort before
/// equalities, equalities before insertions, which the placeholder
/// realignment relies on when it compares the operations of nested
/// open/close markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextOp {
    Delete,
    Equal,
    Insert,
}

/// Diff two strings into `(op, chunk)` pairs covering both inputs, with a
/// deletion emitted before the matching insertion wherever text changed.
pub fn text_diff(old: &str, new: &str) -> Vec<(TextOp, String)> {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();

    let mut chunks: Vec<(TextOp, String)> = Vec::new();
    let mut push = |op: TextOp, text: String| {
        if text.is_empty() {
            return;
        }
        match chunks.last_mut() {
            Some((last_op, last_text)) if *last_op == op => last_text.push_str(&text),
            _ => chunks.push((op, text)),
        }
    };

    for op in capture_diff_slices(Algorithm::Myers, &a, &b) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => push(TextOp::Equal, a[old_range].iter().collect()),
            DiffTag::Delete => push(TextOp::Delete, a[old_range].iter().collect()),
            DiffTag::Insert => push(TextOp::Insert, b[new_range].iter().collect()),
            DiffTag::Replace => {
                push(TextOp::Delete, a[old_range].iter().collect());
                push(TextOp::Insert, b[new_range].iter().collect());
            }
        }
    }
    chunks
}
