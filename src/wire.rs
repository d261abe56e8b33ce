//! Request and response documents
//!
//! The phone client speaks XML (`<files><file>..</file></files>`); JSON is
//! accepted and produced as well. Numbers are parsed leniently: anything
//! that is not an integer counts as 0.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::plan::{ClientFile, NeededFile};

/// Encoding of inventory and need-list documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Json,
    Xml,
}

impl DocFormat {
    /// Pick the format from the request content type, falling back to
    /// sniffing the body.
    pub fn detect(content_type: Option<&str>, body: &str) -> Self {
        if let Some(ct) = content_type {
            let ct = ct.to_ascii_lowercase();
            if ct.contains("xml") {
                return DocFormat::Xml;
            }
            if ct.contains("json") {
                return DocFormat::Json;
            }
        }
        if body.trim_start().starts_with('<') {
            DocFormat::Xml
        } else {
            DocFormat::Json
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            DocFormat::Json => "application/json",
            DocFormat::Xml => "application/xml",
        }
    }
}

fn parse_i64_or(s: &str, default: i64) -> i64 {
    s.trim().parse().unwrap_or(default)
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => parse_i64_or(&s, 0),
        _ => 0,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonClientFile {
    #[serde(default)]
    rel: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    last_modified: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    size: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonInventory {
    Wrapped { files: Vec<JsonClientFile> },
    Bare(Vec<JsonClientFile>),
}

#[derive(Deserialize, Default)]
struct XmlInventory {
    #[serde(rename = "file", default)]
    files: Vec<XmlClientFile>,
}

#[derive(Deserialize)]
struct XmlClientFile {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "lastModified", default)]
    last_modified: String,
    #[serde(default)]
    size: String,
}

/// Decode an inventory request body.
pub fn parse_inventory(body: &str, format: DocFormat) -> Result<Vec<ClientFile>> {
    if body.trim().is_empty() {
        bail!("Empty body");
    }
    let files = match format {
        DocFormat::Json => {
            let doc: JsonInventory =
                serde_json::from_str(body).context("invalid JSON inventory")?;
            let entries = match doc {
                JsonInventory::Wrapped { files } => files,
                JsonInventory::Bare(files) => files,
            };
            entries
                .into_iter()
                .map(|f| ClientFile {
                    rel: f.rel.unwrap_or_default(),
                    path: f.path.unwrap_or_default(),
                    name: f.name.unwrap_or_default(),
                    last_modified: f.last_modified,
                    size: f.size,
                })
                .collect()
        }
        DocFormat::Xml => {
            let doc: XmlInventory =
                quick_xml::de::from_str(body).context("invalid XML inventory")?;
            doc.files
                .into_iter()
                .map(|f| ClientFile {
                    last_modified: parse_i64_or(&f.last_modified, 0),
                    size: parse_i64_or(&f.size, 0),
                    rel: f.rel,
                    path: f.path,
                    name: f.name,
                })
                .collect()
        }
    };
    Ok(files)
}

#[derive(Serialize)]
struct NeededEntry<'a> {
    rel: &'a str,
    #[serde(rename = "lastModified")]
    last_modified: i64,
    size: i64,
}

#[derive(Serialize)]
struct NeedList<'a> {
    #[serde(rename = "file")]
    files: Vec<NeededEntry<'a>>,
}

#[derive(Serialize)]
struct JsonNeedList<'a> {
    files: Vec<NeededEntry<'a>>,
}

/// Encode the need-upload list in the same format the inventory used.
pub fn render_need_list(needed: &[NeededFile], format: DocFormat) -> Result<String> {
    let files: Vec<NeededEntry<'_>> = needed
        .iter()
        .map(|f| NeededEntry {
            rel: &f.rel,
            last_modified: f.last_modified,
            size: f.size,
        })
        .collect();
    let out = match format {
        DocFormat::Json => serde_json::to_string(&JsonNeedList { files })?,
        DocFormat::Xml => quick_xml::se::to_string_with_root("files", &NeedList { files })?,
    };
    Ok(out)
}

/// Text fields describing one uploaded file part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFields {
    pub rel: Option<String>,
    pub filepath: Option<String>,
    pub last_modified: Option<String>,
    pub size: Option<String>,
}

impl UploadFields {
    /// Record a form field. Unknown names are ignored and reported as such.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "rel" => &mut self.rel,
            "filepath" => &mut self.filepath,
            "lastModified" => &mut self.last_modified,
            "size" => &mut self.size,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Client mtime, 0 when absent or unparseable
    pub fn last_modified_ms(&self) -> i64 {
        self.last_modified.as_deref().map_or(0, |s| parse_i64_or(s, 0))
    }

    /// Client size, -1 when absent or unparseable
    pub fn reported_size(&self) -> i64 {
        self.size.as_deref().map_or(-1, |s| parse_i64_or(s, -1))
    }
}

/// A multipart part in arrival order
#[derive(Debug)]
pub enum FormPart<F> {
    Field(String, String),
    File(F),
}

/// Pair every file part with its describing fields.
///
/// If the form opens with a text field, fields describe the next file part.
/// If it opens with a file part, fields describe the file part before them.
pub fn attach_fields<F>(parts: Vec<FormPart<F>>) -> Vec<(F, UploadFields)> {
    let fields_follow = matches!(parts.first(), Some(FormPart::File(_)));
    let mut out: Vec<(F, UploadFields)> = Vec::new();
    let mut pending = UploadFields::default();

    for part in parts {
        match part {
            FormPart::Field(name, value) => {
                if fields_follow {
                    if let Some((_, fields)) = out.last_mut() {
                        fields.set(&name, value);
                    }
                } else {
                    pending.set(&name, value);
                }
            }
            FormPart::File(file) => {
                let fields = if fields_follow {
                    UploadFields::default()
                } else {
                    std::mem::take(&mut pending)
                };
                out.push((file, fields));
            }
        }
    }
    out
}
