// src/ingest/rss.rs
//! Tolerant RSS `<item>` / Atom `<entry>` reader built on quick-xml events.
//!
//! Unlike a serde mapping, the event reader keeps whatever items it managed to
//! read before hitting broken markup, handles CDATA and nested XHTML content,
//! and does not care about field order.

use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// One syndication item, fields as found (not yet sanitized).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: Option<String>,
    pub source: Option<String>,
}

const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "content:encoded", "content"];
const DATE_KEYS: &[&str] = &["pubdate", "published", "updated", "dc:date"];
const SOURCE_KEYS: &[&str] = &["source", "dc:creator", "author"];

#[derive(Default)]
struct ItemBuilder {
    fields: HashMap<String, String>,
    link_href: Option<String>,
    /// Names of open elements below the item; index 0 is the item's direct child.
    stack: Vec<String>,
}

impl ItemBuilder {
    fn push_text(&mut self, text: &str) {
        let Some(key) = self.stack.first() else {
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = self.fields.entry(key.clone()).or_default();
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_string())
    }

    fn finish(self) -> FeedItem {
        let link = self
            .link_href
            .clone()
            .or_else(|| self.first_of(&["link", "guid"]))
            .unwrap_or_default();
        FeedItem {
            title: self.first_of(&["title"]).unwrap_or_default(),
            description: self.first_of(DESCRIPTION_KEYS).unwrap_or_default(),
            link,
            pub_date: self.first_of(DATE_KEYS),
            source: self.first_of(SOURCE_KEYS),
        }
    }
}

fn qname(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn is_item_tag(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

/// Atom `<link href=".." rel="alternate"/>`; links with another rel are ignored.
fn alternate_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel_ok = value == "alternate",
            _ => {}
        }
    }
    href.filter(|h| rel_ok && !h.trim().is_empty())
}

/// Parse every `<item>` / `<entry>` block. Items without a title are still
/// returned; skipping them is the caller's decision.
pub fn parse_rss(xml: &str) -> Vec<FeedItem> {
    let t0 = std::time::Instant::now();
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = qname(&e);
                match current.as_mut() {
                    None if is_item_tag(&name) => current = Some(ItemBuilder::default()),
                    None => {}
                    Some(b) => {
                        if b.stack.is_empty() && name == "link" && b.link_href.is_none() {
                            b.link_href = alternate_href(&e);
                        }
                        b.stack.push(name);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(b) = current.as_mut() {
                    if b.stack.is_empty() && qname(&e) == "link" && b.link_href.is_none() {
                        b.link_href = alternate_href(&e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(b) = current.as_mut() {
                    let text = match e.unescape() {
                        Ok(t) => t.into_owned(),
                        Err(_) => {
                            let raw = String::from_utf8_lossy(&e);
                            html_escape::decode_html_entities(&raw).into_owned()
                        }
                    };
                    b.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(b) = current.as_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    b.push_text(&text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if let Some(b) = current.as_mut() {
                    if b.stack.is_empty() {
                        if is_item_tag(&name) {
                            if let Some(done) = current.take() {
                                items.push(done.finish());
                            }
                        }
                    } else {
                        b.stack.pop();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    target: "ingest",
                    error = %e,
                    position = reader.buffer_position(),
                    kept = items.len(),
                    "feed markup broken; keeping items read so far"
                );
                break;
            }
        }
    }

    histogram!("recon_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("recon_feed_items_total").increment(items.len() as u64);
    items
}

/// HTML entities that are not valid XML would abort the reader.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
