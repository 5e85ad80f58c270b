//! Card metadata extraction and the crawler-facing document

use std::sync::LazyLock;

use scraper::{Html, Selector};

/// `<meta>` tags a link-preview crawler reads
const CARD_META_SELECTOR: &str = r#"meta[name^="twitter:"], meta[property^="og:"]"#;

static CARD_META: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(CARD_META_SELECTOR).expect("card meta selector is valid")
});

/// Which attribute identified the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    /// `name="twitter:..."`
    Name,
    /// `property="og:..."`
    Property,
}

/// A card metadata tag lifted from the origin document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    pub kind: MetaKind,
    /// e.g. `twitter:card`, `og:title`
    pub identifier: String,
    pub content: Option<String>,
    /// The element re-serialized as HTML
    pub markup: String,
}

/// Select `twitter:*` and `og:*` meta tags in document order.
///
/// Parsing is permissive: broken or empty input just yields fewer tags.
pub fn extract(html: &str) -> Vec<MetaTag> {
    let document = Html::parse_document(html);

    document
        .select(&CARD_META)
        .filter_map(|el| {
            let attrs = el.value();
            let (kind, identifier) = match attrs.attr("name") {
                Some(name) if name.starts_with("twitter:") => (MetaKind::Name, name),
                _ => (MetaKind::Property, attrs.attr("property")?),
            };
            Some(MetaTag {
                kind,
                identifier: identifier.to_string(),
                content: attrs.attr("content").map(str::to_string),
                markup: el.html(),
            })
        })
        .collect()
}

/// Wrap the tags' markup in a bare `<body>`, preserving order.
pub fn synthesize(tags: &[MetaTag]) -> String {
    let mut out = String::from("<body>");
    for tag in tags {
        out.push_str(&tag.markup);
    }
    out.push_str("</body>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Article</title>
  <meta property="og:title" content="T">
  <meta name="description" content="x">
  <meta name="twitter:card" content="summary">
</head>
<body><p>Hello</p></body>
</html>"#;

    #[test]
    fn test_extract_selects_card_tags_in_order() {
        let tags = extract(ARTICLE);

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].kind, MetaKind::Property);
        assert_eq!(tags[0].identifier, "og:title");
        assert_eq!(tags[0].content.as_deref(), Some("T"));
        assert_eq!(tags[1].kind, MetaKind::Name);
        assert_eq!(tags[1].identifier, "twitter:card");
        assert_eq!(tags[1].content.as_deref(), Some("summary"));
    }

    #[test]
    fn test_synthesize_article() {
        let body = synthesize(&extract(ARTICLE));

        assert_eq!(
            body,
            r#"<body><meta property="og:title" content="T"><meta name="twitter:card" content="summary"></body>"#
        );
        assert!(!body.contains("description"));
    }

    #[test]
    fn test_markup_keeps_source_attribute_order() {
        let html = r#"<meta property="og:url" data-x="1" content="https://example.com/a">
<meta name="twitter:site" content="@x" id="s">"#;
        let tags = extract(html);

        assert_eq!(
            tags[0].markup,
            r#"<meta property="og:url" data-x="1" content="https://example.com/a">"#
        );
        assert_eq!(tags[1].markup, r#"<meta name="twitter:site" content="@x" id="s">"#);
    }

    #[test]
    fn test_tags_outside_head_are_found() {
        let html = r#"<body><meta property="og:image" content="https://example.com/a.png"></body>"#;
        let tags = extract(html);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].identifier, "og:image");
    }

    #[test]
    fn test_prefix_must_match_exactly() {
        let html = r#"<meta name="og:title" content="a">
<meta property="twitter:card" content="b">
<meta name="twitterx:card" content="c">
<meta property="ogx:title" content="d">"#;

        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_tag_matching_both_attributes_appears_once() {
        let html = r#"<meta name="twitter:title" property="og:title" content="Both">"#;
        let tags = extract(html);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, MetaKind::Name);
    }

    #[test]
    fn test_malformed_html_does_not_panic() {
        let html = r#"<html><head><meta property="og:title" content="Unclosed <div><meta name="twitter:site" content="@x"#;
        let _ = extract(html);
        let _ = extract("<<<>>><meta");
    }

    #[test]
    fn test_empty_document_yields_empty_body() {
        assert!(extract("").is_empty());
        assert_eq!(synthesize(&extract("")), "<body></body>");
        assert_eq!(synthesize(&extract("just some text")), "<body></body>");
    }

    #[test]
    fn test_attribute_values_are_escaped_on_output() {
        let html = r#"<meta property="og:title" content="Tom &amp; &quot;Jerry&quot;">"#;
        let tags = extract(html);

        assert_eq!(tags[0].content.as_deref(), Some(r#"Tom & "Jerry""#));
        assert_eq!(
            tags[0].markup,
            r#"<meta property="og:title" content="Tom &amp; &quot;Jerry&quot;">"#
        );
    }
}
