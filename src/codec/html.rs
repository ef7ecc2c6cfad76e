//! `HTML Format` (CF_HTML) payloads.
//!
//! ```text
//! Version:0.9
//! StartHTML:0000000105
//! EndHTML:0000000199
//! StartFragment:0000000141
//! EndFragment:0000000163
//! <html><body>
//! <!--StartFragment-->...<!--EndFragment-->
//! </body></html>
//! ```
//!
//! Offsets are byte positions into the UTF-8 payload; a value of -1 means
//! the field is absent.

use crate::{ClipError, ClipResult};

const START_MARKER: &str = "<!--StartFragment-->";
const END_MARKER: &str = "<!--EndFragment-->";

/// Parsed CF_HTML payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlFormat {
    /// Header version, usually "0.9" or "1.0"
    pub version: String,
    /// Byte offset where the HTML document starts
    pub start_html: Option<usize>,
    /// Byte offset where the HTML document ends
    pub end_html: Option<usize>,
    /// Byte offset where the fragment starts
    pub start_fragment: Option<usize>,
    /// Byte offset where the fragment ends
    pub end_fragment: Option<usize>,
    /// Byte offset where the selection starts
    pub start_selection: Option<usize>,
    /// Byte offset where the selection ends
    pub end_selection: Option<usize>,
    /// Page the fragment was copied from
    pub source_url: Option<String>,
    /// The HTML document after the header
    pub html: String,
    /// The copied fragment
    pub fragment: String,
}

impl HtmlFormat {
    /// Parse a CF_HTML payload
    pub fn parse(text: &str) -> ClipResult<Self> {
        let mut html = Self::default();
        let mut body_start = None;
        let mut pos = 0;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim();
            if trimmed.starts_with('<') {
                body_start = Some(pos + (line.len() - line.trim_start().len()));
                break;
            }
            pos += line.len();

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Version" => html.version = value.to_string(),
                "StartHTML" => html.start_html = parse_offset(key, value)?,
                "EndHTML" => html.end_html = parse_offset(key, value)?,
                "StartFragment" => html.start_fragment = parse_offset(key, value)?,
                "EndFragment" => html.end_fragment = parse_offset(key, value)?,
                "StartSelection" => html.start_selection = parse_offset(key, value)?,
                "EndSelection" => html.end_selection = parse_offset(key, value)?,
                "SourceURL" => html.source_url = Some(value.to_string()),
                _ => {}
            }
        }

        if html.version.is_empty() {
            return Err(ClipError::malformed("HTML Format", "missing Version header"));
        }

        html.html = slice(text, html.start_html, html.end_html)
            .or_else(|| body_start.map(|start| &text[start..]))
            .unwrap_or_default()
            .to_string();

        html.fragment = slice(text, html.start_fragment, html.end_fragment)
            .or_else(|| between_markers(text))
            .unwrap_or_default()
            .to_string();

        Ok(html)
    }

    /// Wrap `fragment` in a complete CF_HTML payload
    pub fn build(fragment: &str, source_url: Option<&str>) -> String {
        let prefix = format!("<html>\r\n<body>\r\n{}", START_MARKER);
        let suffix = format!("{}\r\n</body>\r\n</html>", END_MARKER);

        let header = |start_html: usize, end_html: usize, start_fragment: usize, end_fragment: usize| {
            let mut header = format!(
                "Version:0.9\r\nStartHTML:{:010}\r\nEndHTML:{:010}\r\nStartFragment:{:010}\r\nEndFragment:{:010}\r\n",
                start_html, end_html, start_fragment, end_fragment
            );
            if let Some(url) = source_url {
                header.push_str(&format!("SourceURL:{}\r\n", url));
            }
            header
        };

        // Fixed-width offsets, so the header length does not depend on them
        let start_html = header(0, 0, 0, 0).len();
        let start_fragment = start_html + prefix.len();
        let end_fragment = start_fragment + fragment.len();
        let end_html = end_fragment + suffix.len();

        let mut out = header(start_html, end_html, start_fragment, end_fragment);
        out.push_str(&prefix);
        out.push_str(fragment);
        out.push_str(&suffix);
        out
    }
}

fn parse_offset(key: &str, value: &str) -> ClipResult<Option<usize>> {
    let offset: i64 = value
        .parse()
        .map_err(|_| ClipError::malformed("HTML Format", format!("{} is not a number: {:?}", key, value)))?;
    Ok(usize::try_from(offset).ok())
}

fn slice(text: &str, start: Option<usize>, end: Option<usize>) -> Option<&str> {
    let (start, end) = (start?, end?);
    if start > end {
        return None;
    }
    text.get(start..end)
}

fn between_markers(text: &str) -> Option<&str> {
    let start = text.find(START_MARKER)? + START_MARKER.len();
    let end = text[start..].find(END_MARKER)? + start;
    Some(&text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_then_parse() {
        let payload = HtmlFormat::build("<b>bold ü</b>", Some("https://example.com/"));
        let parsed = HtmlFormat::parse(&payload).unwrap();

        assert_eq!(parsed.version, "0.9");
        assert_eq!(parsed.fragment, "<b>bold ü</b>");
        assert_eq!(parsed.source_url.as_deref(), Some("https://example.com/"));
        assert!(parsed.html.starts_with("<html>"));
        assert!(parsed.html.ends_with("</html>"));
        assert_eq!(parsed.end_html, Some(payload.len()));
    }

    #[test]
    fn test_offsets_are_ten_digits() {
        let payload = HtmlFormat::build("x", None);
        assert!(payload.contains("StartHTML:0000000"));
        assert!(!payload.contains("SourceURL"));
    }

    #[test]
    fn test_falls_back_to_markers() {
        let payload = "Version:1.0\r\nStartHTML:-1\r\nEndHTML:-1\r\nStartFragment:-1\r\nEndFragment:-1\r\n\
                       <html><body><!--StartFragment-->hi<!--EndFragment--></body></html>";
        let parsed = HtmlFormat::parse(payload).unwrap();
        assert_eq!(parsed.start_html, None);
        assert_eq!(parsed.fragment, "hi");
        assert!(parsed.html.starts_with("<html><body>"));
    }

    #[test]
    fn test_bad_offset_is_malformed() {
        let payload = "Version:0.9\r\nStartHTML:abc\r\n<html></html>";
        assert!(matches!(HtmlFormat::parse(payload), Err(ClipError::Malformed { .. })));
        assert!(HtmlFormat::parse("<html></html>").is_err());
    }
}
