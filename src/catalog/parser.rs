//! Lenient PO/POT parser.
//!
//! Lines are classified one at a time; anything unrecognised is skipped
//! instead of failing the parse.

use super::entry::{Catalog, CatalogEntry};
use super::escape::unescape;
use tracing::{trace, warn};

/// Field that a bare `"..."` continuation line appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Msgid,
    MsgidPlural,
    Msgstr,
    MsgstrPlural,
}

#[derive(Debug)]
enum Line<'a> {
    Blank,
    Extracted(&'a str),
    Reference(&'a str),
    Flags(&'a str),
    Msgid(&'a str),
    MsgidPlural(&'a str),
    Msgstr(&'a str),
    MsgstrPlural(u32, &'a str),
    Continuation(&'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if line.trim().is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix("#.") {
        return Line::Extracted(comment_text(rest));
    }
    if let Some(rest) = line.strip_prefix("#:") {
        return Line::Reference(comment_text(rest));
    }
    if let Some(rest) = line.strip_prefix("#,") {
        return Line::Flags(rest);
    }
    if line.starts_with('#') {
        return Line::Other;
    }
    if line.starts_with('"') {
        return Line::Continuation(quoted(line));
    }

    let (keyword, rest) = match line.find(|c: char| c.is_whitespace()) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => return Line::Other,
    };
    match keyword {
        "msgid" => Line::Msgid(quoted(rest)),
        "msgid_plural" => Line::MsgidPlural(quoted(rest)),
        "msgstr" => Line::Msgstr(quoted(rest)),
        _ => match plural_index(keyword) {
            Some(index) => Line::MsgstrPlural(index, quoted(rest)),
            None => Line::Other,
        },
    }
}

/// Text after a comment marker, minus the single separating space.
fn comment_text(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// Parse `msgstr[N]` into `N`.
fn plural_index(keyword: &str) -> Option<u32> {
    keyword
        .strip_prefix("msgstr[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Content between the first and the last double quote, still escaped.
/// Malformed literals yield an empty string.
fn quoted(rest: &str) -> &str {
    let rest = rest.trim();
    match (rest.find('"'), rest.rfind('"')) {
        (Some(start), Some(end)) if end > start => &rest[start + 1..end],
        _ => "",
    }
}

struct ParserState {
    catalog: Catalog,
    current: Option<CatalogEntry>,
    field: Option<Field>,
    /// Current block has a `msgid` line
    has_msgid: bool,
    /// Current block has opened a `msgstr` or `msgstr[N]`
    has_msgstr: bool,
    /// Number of msgid-bearing blocks seen so far
    blocks: usize,
}

impl ParserState {
    fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            current: None,
            field: None,
            has_msgid: false,
            has_msgstr: false,
            blocks: 0,
        }
    }

    fn entry(&mut self) -> &mut CatalogEntry {
        self.current.get_or_insert_with(CatalogEntry::default)
    }

    /// Start a fresh block if the current one already reached its msgstr.
    fn split_if_complete(&mut self) {
        if self.has_msgstr {
            self.commit();
        }
    }

    fn commit(&mut self) {
        let entry = self.current.take();
        let had_msgid = self.has_msgid;
        self.field = None;
        self.has_msgid = false;
        self.has_msgstr = false;

        let Some(entry) = entry else { return };
        if !had_msgid {
            return;
        }
        self.blocks += 1;

        if entry.msgid.is_empty() && self.blocks > 1 {
            trace!("Skipping empty msgid outside header position");
            return;
        }
        if let Some(previous) = self.catalog.insert(entry) {
            warn!(
                "Duplicate msgid {:?}: later entry replaces earlier content",
                previous.msgid
            );
        }
    }

    fn append(&mut self, text: &str) {
        let Some(field) = self.field else {
            trace!("Continuation line without an open field");
            return;
        };
        let text = unescape(text);
        let entry = self.entry();
        match field {
            Field::Msgid => entry.msgid.push_str(&text),
            Field::MsgidPlural => entry.msgid_plural.get_or_insert_with(String::new).push_str(&text),
            Field::Msgstr => entry.msgstr.push_str(&text),
            Field::MsgstrPlural => {
                if let Some(slot) = entry.msgstr_plural.values_mut().next_back() {
                    slot.push_str(&text);
                }
            }
        }
    }

    fn feed(&mut self, line: &str) {
        match classify(line) {
            Line::Blank => self.commit(),
            Line::Extracted(text) => {
                self.split_if_complete();
                self.entry().comments.push(text.to_string());
            }
            Line::Reference(text) => {
                self.split_if_complete();
                self.entry().references.push(text.to_string());
            }
            Line::Flags(list) => {
                self.split_if_complete();
                let entry = self.entry();
                for flag in list.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                    entry.flags.insert(flag.to_string());
                }
            }
            Line::Msgid(text) => {
                self.split_if_complete();
                self.entry().msgid = unescape(text);
                self.has_msgid = true;
                self.field = Some(Field::Msgid);
            }
            Line::MsgidPlural(text) => {
                self.entry().msgid_plural = Some(unescape(text));
                self.field = Some(Field::MsgidPlural);
            }
            Line::Msgstr(text) => {
                self.entry().msgstr = unescape(text);
                self.has_msgstr = true;
                self.field = Some(Field::Msgstr);
            }
            Line::MsgstrPlural(index, text) => {
                self.entry().msgstr_plural.insert(index, unescape(text));
                self.has_msgstr = true;
                self.field = Some(Field::MsgstrPlural);
            }
            Line::Continuation(text) => self.append(text),
            Line::Other => trace!("Skipping unrecognised line: {}", line),
        }
    }
}

/// Parse PO or POT text into a [`Catalog`]. Never fails.
///
/// The header is the first block whose msgid is empty; any later empty
/// msgid is dropped. Duplicate msgids resolve last-write-wins.
pub fn parse(text: &str) -> Catalog {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut state = ParserState::new();
    for line in text.lines() {
        state.feed(line.strip_suffix('\r').unwrap_or(line));
    }
    state.commit();
    state.catalog
}
