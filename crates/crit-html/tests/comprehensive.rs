//! Comprehensive tests for crit-html
//!
//! Region rewriting over realistic pages, verified through an HTML5 parser.

use crit_css::StyleLookup;
use crit_html::{rewrite_document, CriticalStyleStream, StreamConfig};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const SHARED_CSS: &str = ".a, .b, .input { color: rightColor }";

fn shared_lookup() -> StyleLookup {
    StyleLookup::from_sources([("form.css", SHARED_CSS)]).unwrap()
}

fn page_with_duplicate_styles(count: usize) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>form</title></head><body><form class=\"b\"><input class=\"input\"></form>\n",
    );
    for _ in 0..count {
        html.push_str("<style>.xxxxx { color: red; }</style>\n");
    }
    html.push_str("<p>done</p></body></html>");
    html
}

fn style_texts(html: &str) -> Vec<String> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .unwrap();
    let mut found = Vec::new();
    collect_styles(&dom.document, &mut found);
    found
}

fn collect_styles(handle: &Handle, found: &mut Vec<String>) {
    if let NodeData::Element { name, .. } = &handle.data {
        if name.local.as_ref() == "style" {
            let mut text = String::new();
            for child in handle.children.borrow().iter() {
                match &child.data {
                    NodeData::Text { contents } => text.push_str(&contents.borrow()),
                    _ => panic!("style element has a non-text child"),
                }
            }
            found.push(text);
            return;
        }
    }
    for child in handle.children.borrow().iter() {
        collect_styles(child, found);
    }
}

fn assert_flat(out: &str) {
    assert!(!out.contains("<style><style"));
    assert!(!out.contains("</style></style"));
}

// ============================================================================
// DUPLICATE RULE LINES
// ============================================================================

fn nested_div_page(lines: usize) -> String {
    format!(
        "<div class=\"a\"><div class=\"b\"><style>{}</style></div></div>",
        ".xxxxx { color: red; }\n".repeat(lines)
    )
}

#[test]
fn test_five_duplicate_lines_stay_flat() {
    let styles = shared_lookup();
    let out = rewrite_document(&styles, &nested_div_page(5));
    assert_flat(&out);
    assert_eq!(
        out,
        "<div class=\"a\"><div class=\"b\"><style>.a, .b, .input { color: rightColor; }\n</style></div></div>"
    );
}

#[test]
fn test_thousand_duplicate_lines_stay_flat() {
    let styles = shared_lookup();
    let out = rewrite_document(&styles, &nested_div_page(1000));
    assert_flat(&out);
    assert_eq!(style_texts(&out), vec![".a, .b, .input { color: rightColor; }\n"]);
}

// ============================================================================
// DUPLICATE STYLE TAGS
// ============================================================================

#[test]
fn test_five_duplicate_styles_collapse() {
    let styles = shared_lookup();
    let out = rewrite_document(&styles, &page_with_duplicate_styles(5));

    assert_flat(&out);
    assert!(out.ends_with(
        "<style>.a, .b, .input { color: rightColor; }\n</style>\n<p>done</p></body></html>"
    ));
    assert!(!out.contains(".xxxxx"));
    assert_eq!(style_texts(&out), vec![".a, .b, .input { color: rightColor; }\n"]);
}

#[test]
fn test_thousand_duplicate_styles_collapse() {
    let styles = shared_lookup();
    let html = page_with_duplicate_styles(1000);
    let out = rewrite_document(&styles, &html);

    assert_flat(&out);
    assert_eq!(out.matches("<style>").count(), 1);
    assert_eq!(out.matches("</style>").count(), 1);
    assert_eq!(style_texts(&out).len(), 1);
}

#[test]
fn test_thousand_styles_in_small_chunks() {
    let styles = shared_lookup();
    let html = page_with_duplicate_styles(1000);
    let whole = rewrite_document(&styles, &html);

    let mut stream = CriticalStyleStream::new(&styles);
    let mut out = Vec::new();
    for chunk in html.as_bytes().chunks(7) {
        stream.push(chunk, &mut out);
    }
    let stats = stream.finish(&mut out);

    assert_eq!(String::from_utf8(out).unwrap(), whole);
    assert_eq!(stats.regions, 1);
    assert_eq!(stats.merged_tags, 999);
}

// ============================================================================
// REALISTIC PAGES
// ============================================================================

#[test]
fn test_page_keeps_only_used_rules() {
    let css = r#"
        body { margin: 0 }
        .nav { display: flex }
        .nav > .item { padding: 4px }
        .footer { color: gray }
        #hero { height: 50vh }
        @media (max-width: 600px) { .nav { display: block } }
    "#;
    let styles = StyleLookup::from_sources([("site.css", css)]).unwrap();
    let html = r#"<!DOCTYPE html>
<html>
<body>
<nav class="nav"><a class="item" href="/">Home</a></nav>
<style></style>
<footer class="footer">bye</footer>
</body>
</html>"#;
    let out = rewrite_document(&styles, html);
    let texts = style_texts(&out);
    assert_eq!(texts.len(), 1);

    let critical = &texts[0];
    assert!(critical.contains("body { margin: 0; }"));
    assert!(critical.contains(".nav { display: flex; }"));
    assert!(critical.contains(".nav > .item { padding: 4px; }"));
    assert!(critical.contains("@media (max-width: 600px) { .nav { display: block; } }"));
    assert!(!critical.contains(".footer"));
    assert!(!critical.contains("#hero"));
}

#[test]
fn test_markup_outside_regions_is_byte_identical() {
    let styles = shared_lookup();
    let head = "<html><head><meta charset=\"utf-8\"><title>Ünïcödé ✓</title>";
    let tail = "</head><body class=\"b\">日本語 <!-- note --></body></html>";
    let html = format!("{head}<style>whatever</style>{tail}");
    let out = rewrite_document(&styles, &html);
    assert!(out.starts_with(head));
    assert!(out.ends_with(tail));
}

#[test]
fn test_multiple_regions_see_growing_tokens() {
    let css = ".one { color: red }\n.two { color: blue }";
    let styles = StyleLookup::from_sources([("a.css", css)]).unwrap();
    let html = "<i class=one></i><style></style><hr><i class=two></i><style></style>";
    let out = rewrite_document(&styles, html);
    assert_eq!(
        out,
        "<i class=one></i><style>.one { color: red; }\n</style><hr>\
         <i class=two></i><style>.one { color: red; }\n.two { color: blue; }\n</style>"
    );
}

#[test]
fn test_dedupe_across_regions() {
    let css = ".one { color: red }\n.two { color: blue }";
    let styles = StyleLookup::from_sources([("a.css", css)]).unwrap();
    let config = StreamConfig {
        dedupe_regions: true,
        ..StreamConfig::default()
    };
    let mut stream = CriticalStyleStream::with_config(&styles, config);
    let mut out = Vec::new();
    stream.push(
        b"<i class=one></i><style></style><hr><i class=two></i><style></style>",
        &mut out,
    );
    stream.finish(&mut out);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<i class=one></i><style>.one { color: red; }\n</style><hr>\
         <i class=two></i><style>.two { color: blue; }\n</style>"
    );
}

#[test]
fn test_shared_lookup_across_concurrent_streams() {
    let styles = std::sync::Arc::new(shared_lookup());
    let handles: Vec<_> = ["a", "b", "input"]
        .into_iter()
        .map(|class| {
            let styles = std::sync::Arc::clone(&styles);
            std::thread::spawn(move || {
                rewrite_document(styles, &format!("<div class={class}></div><style></style>"))
            })
        })
        .collect();
    for handle in handles {
        let out = handle.join().unwrap();
        assert!(out.ends_with("<style>.a, .b, .input { color: rightColor; }\n</style>"));
    }
}
