use std::collections::HashSet;

/// Cleans rich-text article bodies coming from the console editor.
/// Keeps a fixed set of formatting and media tags and drops every script
/// vector (`<script>`, `on*` handlers, `javascript:` URLs).
pub fn sanitize_rich_text(html_input: &str) -> String {
    let tags_to_allow = [
        "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "p", "br",
        "a", "ul", "ol", "li", "blockquote", "code", "pre", "hr", "img", "figure",
        "figcaption", "table", "thead", "tbody", "tr", "th", "td", "s", "del", "video",
        "source", "div", "span",
    ];
    let safe_attributes = ["src", "href", "alt", "title", "class", "controls", "width", "height"];

    ammonia::Builder::new()
        .tags(tags_to_allow.iter().cloned().collect::<HashSet<_>>())
        .generic_attributes(safe_attributes.iter().cloned().collect::<HashSet<_>>())
        .link_rel(Some("nofollow noopener"))
        .clean(html_input)
        .to_string()
}

/// Strips all HTML from plain-text fields (titles, excerpts, labels).
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}
