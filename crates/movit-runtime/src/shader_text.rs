//! Per-instance shader namespacing.

const MARKER: &str = "PREFIX(";

/// Rewrite every `PREFIX(x)` in `text` to `<prefix>_x`.
///
/// The argument runs to the matching close paren, so nested parens inside it
/// are kept as written. An unterminated `PREFIX(` is a bug in the shader text
/// and panics.
pub fn replace_prefix(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        out.push_str(&rest[..pos]);
        out.push_str(prefix);
        out.push('_');

        let arg = &rest[pos + MARKER.len()..];
        let mut depth = 1usize;
        let mut end = None;
        for (i, b) in arg.bytes().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = match end {
            Some(e) => e,
            None => panic!("replace_prefix: unbalanced PREFIX( in shader text"),
        };
        out.push_str(&arg[..end]);
        rest = &arg[end + 1..];
    }
    out.push_str(rest);
    out
}
