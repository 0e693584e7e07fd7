//! Server-side rendering primitives.

use std::borrow::Cow;
use std::fmt::{self, Write};

/// Something that can write itself as HTML.
pub trait Component {
    fn render(&self, out: &mut String) -> fmt::Result;

    fn render_to_string(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        self.render(&mut out)?;
        Ok(out)
    }
}

/// Plain text, escaped.
impl Component for str {
    fn render(&self, out: &mut String) -> fmt::Result {
        out.write_str(&escape(self))
    }
}

impl Component for String {
    fn render(&self, out: &mut String) -> fmt::Result {
        self.as_str().render(out)
    }
}

impl<T: Component + ?Sized> Component for &T {
    fn render(&self, out: &mut String) -> fmt::Result {
        (**self).render(out)
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn text_components_are_escaped() {
        assert_eq!("<b>".render_to_string().unwrap(), "&lt;b&gt;");
        assert_eq!(String::from("a&b").render_to_string().unwrap(), "a&amp;b");
    }
}
