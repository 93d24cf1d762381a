/// Elements whose text content is whitespace sensitive.
///
/// Whitespace inside these is left alone by [`collapse`].
const PROTECTED: [&str; 3] = ["pre", "textarea", "script"];

/// Remove whitespace found between HTML elements in the given text.
///
/// Whitespace that does not separate two tags is preserved, as is all
/// whitespace inside of a protected element such as `<pre>`. When a
/// protected element is never closed, the rest of the text is preserved
/// as-is.
pub fn collapse(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut protected: Option<&'static str> = None;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(tag) = protected {
            if bytes[i] == b'<' && is_closing(&input[i..], tag) {
                protected = None;
                continue;
            }
            let character = input[i..].chars().next().unwrap();
            output.push(character);
            i += character.len_utf8();
            continue;
        }

        match bytes[i] {
            b'<' => {
                if let Some(tag) = opens_protected(&input[i..]) {
                    protected = Some(tag);
                }
                output.push('<');
                i += 1;
            }
            b'>' => {
                output.push('>');
                i += 1;

                let run_begin = i;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                // Drop the whitespace run only when another tag follows.
                if i >= bytes.len() || bytes[i] != b'<' {
                    output.push_str(&input[run_begin..i]);
                }
            }
            _ => {
                let character = input[i..].chars().next().unwrap();
                output.push(character);
                i += character.len_utf8();
            }
        }
    }

    output
}

/// Return the protected element name when the text begins with an opening
/// tag for one, such as `<pre>` or `<textarea class="x">`.
fn opens_protected(text: &str) -> Option<&'static str> {
    let bytes = text.as_bytes();
    debug_assert!(bytes.first() == Some(&b'<'));

    for tag in PROTECTED {
        let name = tag.as_bytes();
        if bytes.len() < 1 + name.len() {
            continue;
        }
        if !bytes[1..1 + name.len()].eq_ignore_ascii_case(name) {
            continue;
        }
        // The name must end here, so "<press>" does not match "<pre>".
        match bytes.get(1 + name.len()) {
            None | Some(b'>') | Some(b'/') => return Some(tag),
            Some(byte) if byte.is_ascii_whitespace() => return Some(tag),
            _ => {}
        }
    }

    None
}

/// Return true if the text begins with a closing tag for the given element.
fn is_closing(text: &str, tag: &str) -> bool {
    let bytes = text.as_bytes();
    let name = tag.as_bytes();
    if bytes.len() < 2 + name.len() || &bytes[..2] != b"</" {
        return false;
    }
    if !bytes[2..2 + name.len()].eq_ignore_ascii_case(name) {
        return false;
    }
    match bytes.get(2 + name.len()) {
        Some(b'>') => true,
        Some(byte) if byte.is_ascii_whitespace() => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::collapse;

    #[test]
    fn test_collapse_between_tags() {
        assert_eq!(
            collapse("<div>\n    <strong>text</strong>\n</div>"),
            "<div><strong>text</strong></div>"
        );
    }

    #[test]
    fn test_preserve_text_whitespace() {
        assert_eq!(
            collapse("<p>hello   world</p>  <p>again</p>"),
            "<p>hello   world</p><p>again</p>"
        );
    }

    #[test]
    fn test_preserve_trailing_text() {
        assert_eq!(collapse("<br> done"), "<br> done");
    }

    #[test]
    fn test_protected_elements() {
        assert_eq!(
            collapse("<div>\n<pre>\n  keep\n</pre>\n</div>"),
            "<div><pre>\n  keep\n</pre></div>"
        );
        assert_eq!(
            collapse("<textarea>\n  a\n</textarea>  <p>x</p>"),
            "<textarea>\n  a\n</textarea><p>x</p>"
        );
        assert_eq!(
            collapse("<script>\nlet x = 1;\n</script>\n<div></div>"),
            "<script>\nlet x = 1;\n</script><div></div>"
        );
    }

    #[test]
    fn test_protected_with_attributes() {
        assert_eq!(
            collapse("<pre class=\"code\">\n  x\n</pre>\n<div></div>"),
            "<pre class=\"code\">\n  x\n</pre><div></div>"
        );
    }

    #[test]
    fn test_unclosed_protected() {
        assert_eq!(
            collapse("<div>\n<pre>\n  rest\n<p>  </p>"),
            "<div><pre>\n  rest\n<p>  </p>"
        );
    }

    #[test]
    fn test_similar_name_not_protected() {
        assert_eq!(
            collapse("<press>\n<b>x</b>\n</press>"),
            "<press><b>x</b></press>"
        );
    }

    #[test]
    fn test_multibyte() {
        assert_eq!(
            collapse("<p>héllo 日本</p>\n<p>ok</p>"),
            "<p>héllo 日本</p><p>ok</p>"
        );
    }
}
