//! Tag balancing for streamed HTML fragments.
//!
//! The translator runs on ever-growing prefixes of the final text, so its
//! output can be cut anywhere: tags opened and never closed, or closed out
//! of order. Telegram rejects such messages outright. This pass walks the
//! text once with an explicit tag stack and guarantees matched nesting.
//!
//! Input contract: raw `<` and `>` were escaped before translation, so every
//! `<` here was produced by the translator itself.

/// Tags the translator is allowed to emit.
const ALLOWED_TAGS: [&str; 8] = ["b", "i", "u", "s", "code", "pre", "a", "blockquote"];

fn is_allowed(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name)
}

/// Rewrite `text` so every whitelisted tag is matched and properly nested.
///
/// - Opening tags are emitted verbatim (attributes preserved) and pushed.
/// - A closing tag matching the top of the stack pops and emits.
/// - A closing tag matching a deeper entry first force-closes everything
///   above it, in stack (LIFO) order.
/// - Closing tags with no open counterpart, and any non-whitelisted tag,
///   are dropped.
/// - At end of input the remaining stack is force-closed, deepest-open last.
pub fn balance(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut stack: Vec<&str> = Vec::new();
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tag_start = &rest[lt..];
        let Some(gt) = tag_start.find('>') else {
            // A lone '<' cannot come out of the translator; drop the
            // fragment rather than emit something Telegram will reject.
            rest = "";
            break;
        };
        let raw = &tag_start[..=gt];
        let inner = &tag_start[1..gt];

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim();
            if let Some(pos) = stack.iter().rposition(|open| *open == name) {
                // Force-close everything opened above the match, then the
                // match itself.
                while stack.len() > pos {
                    emit_close(&mut out, stack.pop().unwrap());
                }
            }
        } else {
            let name = inner.split_whitespace().next().unwrap_or("");
            if is_allowed(name) {
                stack.push(name);
                out.push_str(raw);
            }
        }

        rest = &tag_start[gt + 1..];
    }
    out.push_str(rest);

    while let Some(open) = stack.pop() {
        emit_close(&mut out, open);
    }

    out
}

fn emit_close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
