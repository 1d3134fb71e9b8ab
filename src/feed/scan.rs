// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};

use crate::error::FeedError;

/// A feed entry with a downloadable enclosure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier: the `<guid>` if present, else the enclosure URL
    pub guid: String,
    /// Enclosure or media URL
    pub url: String,
    /// Display title, possibly empty
    pub title: String,
}

/// Element whose character data is currently being captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Title,
    Guid,
}

/// Accumulated fields of the item container currently open
#[derive(Debug, Default)]
struct Pending {
    guid: Option<String>,
    title: String,
    url: Option<String>,
}

/// Scan state carried across tokens
#[derive(Debug, Default)]
struct Scanner {
    in_item: bool,
    capture: Option<Capture>,
    text: String,
    pending: Pending,
    seen_urls: HashSet<String>,
    items: Vec<Item>,
}

impl Scanner {
    fn start(&mut self, element: &BytesStart<'_>) {
        let name = element.name();
        let local = element.local_name();

        match local.as_ref() {
            b"item" | b"entry" => {
                // An unclosed previous item ends where the next one begins
                if self.in_item {
                    self.close_item();
                }
                self.in_item = true;
                self.pending = Pending::default();
                self.capture = None;
            }
            _ if name.as_ref() == b"title" => self.begin_capture(Capture::Title),
            b"guid" => self.begin_capture(Capture::Guid),
            b"id" if self.in_item && name.as_ref() == b"id" => self.begin_capture(Capture::Guid),
            _ => {}
        }

        if is_enclosure(element) {
            self.enclosure(element);
        }
    }

    fn empty(&mut self, element: &BytesStart<'_>) {
        if is_enclosure(element) {
            self.enclosure(element);
        }
    }

    fn end(&mut self, local: &[u8]) {
        match (local, self.capture) {
            (b"title", Some(Capture::Title)) => {
                self.pending.title = self.text.trim().to_string();
                self.capture = None;
            }
            (b"guid" | b"id", Some(Capture::Guid)) => {
                let guid = self.text.trim();
                self.pending.guid = (!guid.is_empty()).then(|| guid.to_string());
                self.capture = None;
            }
            (b"item" | b"entry", _) if self.in_item => self.close_item(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.capture.is_some() {
            self.text.push_str(text);
        }
    }

    fn begin_capture(&mut self, capture: Capture) {
        self.capture = Some(capture);
        self.text.clear();
    }

    fn enclosure(&mut self, element: &BytesStart<'_>) {
        let Some(url) = url_attribute(element) else {
            return;
        };

        if self.in_item {
            // An earlier item's URL must not shadow a new one in this item
            if self.pending.url.is_none() && !self.seen_urls.contains(&url) {
                self.pending.url = Some(url);
            }
        } else {
            // Flat feed: the enclosure itself closes the implicit item
            let title = std::mem::take(&mut self.pending.title);
            let guid = self.pending.guid.take();
            self.emit(guid, url, title);
        }
    }

    fn close_item(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.in_item = false;
        self.capture = None;

        if let Some(url) = pending.url {
            self.emit(pending.guid, url, pending.title);
        }
    }

    fn emit(&mut self, guid: Option<String>, url: String, title: String) {
        if !self.seen_urls.insert(url.clone()) {
            return;
        }
        self.items.push(Item {
            guid: guid.unwrap_or_else(|| url.clone()),
            url,
            title,
        });
    }

    fn finish(mut self) -> Vec<Item> {
        if self.in_item {
            self.close_item();
        }
        self.items
    }
}

fn is_enclosure(element: &BytesStart<'_>) -> bool {
    matches!(element.name().as_ref(), b"enclosure" | b"media:content")
}

fn url_attribute(element: &BytesStart<'_>) -> Option<String> {
    element
        .html_attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"url")
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.trim().to_string(),
            Err(_) => String::from_utf8_lossy(&attr.value).trim().to_string(),
        })
        .filter(|url| !url.is_empty())
}

/// Decode text leniently: unknown entities or stray `&` keep the raw text
fn decode_text<'a>(text: &'a BytesText<'a>) -> Cow<'a, str> {
    text.unescape()
        .unwrap_or_else(|_| String::from_utf8_lossy(text))
}

/// Scan feed XML into items in document order
///
/// The scan is deliberately permissive: mismatched end tags, unknown
/// entities, unquoted attributes and truncated documents are tolerated.
/// Items are deduplicated by URL; the first occurrence wins.
pub fn scan_items<R: BufRead>(source: R) -> Result<Vec<Item>, FeedError> {
    let mut reader = Reader::from_reader(source);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut scanner = Scanner::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => scanner.start(&element),
            Ok(Event::Empty(element)) => scanner.empty(&element),
            Ok(Event::End(element)) => scanner.end(element.local_name().as_ref()),
            Ok(Event::Text(text)) => scanner.text(&decode_text(&text)),
            Ok(Event::CData(data)) => scanner.text(&String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => {
                return Err(FeedError::ParseFailed {
                    position: reader.error_position(),
                    source,
                });
            }
        }
        buf.clear();
    }

    Ok(scanner.finish())
}
