//! Small helpers over `scraper` shared by the site parsers.

use scraper::{ElementRef, Html, Selector};
use url::Url;

pub(crate) fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

pub(crate) fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(_) => vec![],
    }
}

pub(crate) fn select_first_in<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    el.select(&selector).next()
}

pub(crate) fn select_all_in<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => el.select(&selector).collect(),
        Err(_) => vec![],
    }
}

/// Concatenated, trimmed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Non-empty `content` of `<meta property="...">`.
pub(crate) fn meta_property(doc: &Html, property: &str) -> Option<String> {
    select_all(doc, "meta[property]")
        .into_iter()
        .filter(|m| {
            m.value()
                .attr("property")
                .is_some_and(|p| p.eq_ignore_ascii_case(property))
        })
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Resolve `href` against `base`; `None` when either does not parse.
pub(crate) fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(String::from)
}
