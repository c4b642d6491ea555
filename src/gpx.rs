use crate::types::{FALLBACK_DEVICE_ID, GpxFile, Trkpt};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// ISO-8601 forms RFC 3339 does not cover: offsets without a colon,
/// minute precision and the basic (separator-less) format.
const OFFSET_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

/// Timestamps without an offset are read with these and taken as UTC.
const NAIVE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// Owned XML element. Names are local names, namespace prefixes are dropped.
#[derive(Debug, Default, Clone)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Self>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct text content, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// First descendant called `name`, in document order.
    pub fn find(&self, name: &str) -> Option<&Self> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants called `name`, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Self> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Self>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }
}

pub fn parse_document(src: &str) -> Result<Element> {
    read_document(src.as_bytes())
}

/// Builds the element tree from raw bytes. The encoding is taken from the
/// BOM or the XML declaration, UTF-8 otherwise.
pub fn read_document<R: BufRead>(input: R) -> Result<Element> {
    let mut xml = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => stack.push(element_from_start(&e, xml.decoder())?),
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e, xml.decoder())?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::End(_)) => {
                let el = stack.pop().context("unbalanced end tag")?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.decode()?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.decode()?);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(top) = stack.last_mut() {
                    push_entity(&mut top.text, &e)?;
                }
            }
            Ok(_) => {}
            Err(e) => bail!("XML parse error at byte {}: {e}", xml.error_position()),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        bail!("unclosed element <{}>", open.name);
    }
    root.context("document has no root element")
}

fn element_from_start(e: &BytesStart<'_>, decoder: Decoder) -> Result<Element> {
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.context("malformed attribute")?;
        let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
        let value = a.decode_and_unescape_value(decoder)?.into_owned();
        attrs.push((key, value));
    }

    Ok(Element {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attrs,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
    } else if root.is_none() {
        *root = Some(el);
    } else {
        bail!("multiple root elements (second is <{}>)", el.name);
    }
    Ok(())
}

fn push_entity(text: &mut String, e: &BytesRef<'_>) -> Result<()> {
    if let Some(ch) = e.resolve_char_ref()? {
        text.push(ch);
        return Ok(());
    }
    let name = e.decode()?;
    let Some(resolved) = resolve_predefined_entity(&name) else {
        bail!("unknown entity &{name};");
    };
    text.push_str(resolved);
    Ok(())
}

pub fn parse_gpx_file(path: &Path) -> Result<GpxFile> {
    let file = File::open(path).with_context(|| format!("reading {}", path.display()))?;
    let doc = read_document(BufReader::new(file))
        .with_context(|| format!("parsing GPX: {}", path.display()))?;
    gpx_from_document(&doc).with_context(|| format!("parsing GPX: {}", path.display()))
}

pub fn parse_gpx_str(src: &str) -> Result<GpxFile> {
    gpx_from_document(&parse_document(src)?)
}

fn gpx_from_document(doc: &Element) -> Result<GpxFile> {
    if doc.name() != "gpx" {
        bail!("root element is <{}>, expected <gpx>", doc.name());
    }

    let device_id = device_id(doc);
    let points = doc
        .find_all("trkpt")
        .into_iter()
        .enumerate()
        .map(|(i, el)| parse_trkpt(el).with_context(|| format!("trkpt #{}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    Ok(GpxFile { device_id, points })
}

fn device_id(doc: &Element) -> String {
    doc.find("metadata")
        .and_then(|m| m.find("device"))
        .map(Element::text)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_DEVICE_ID)
        .to_string()
}

fn parse_trkpt(el: &Element) -> Result<Trkpt> {
    let lat = coordinate(el, "lat")?;
    let lon = coordinate(el, "lon")?;

    // <unix> is already epoch milliseconds and wins over <time>.
    let time = if let Some(unix) = el.find("unix") {
        unix.text()
            .parse::<i64>()
            .with_context(|| format!("invalid <unix> value {:?}", unix.text()))?
    } else if let Some(t) = el.find("time") {
        parse_timestamp_ms(t.text())?
    } else {
        bail!("missing both <unix> and <time>");
    };

    Ok(Trkpt {
        time,
        lat,
        lon,
        accuracy: optional_number(el, "accuracy")?.unwrap_or(0.0),
        ele: optional_number(el, "ele")?,
        sat: optional_number(el, "sat")?,
    })
}

fn coordinate(el: &Element, name: &str) -> Result<f64> {
    let raw = el
        .attr(name)
        .with_context(|| format!("missing {name} attribute"))?;
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("invalid {name} attribute {raw:?}"))
}

fn optional_number<T>(el: &Element, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    el.find(name)
        .map(|child| {
            child
                .text()
                .parse::<T>()
                .with_context(|| format!("invalid <{name}> value {:?}", child.text()))
        })
        .transpose()
}

/// ISO-8601 timestamp to epoch milliseconds, sub-millisecond part truncated.
pub fn parse_timestamp_ms(s: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    for fmt in OFFSET_TIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    bail!("invalid ISO-8601 timestamp {s:?}")
}
