use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::PrettyFormatter;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::metadata::bencode::BencodeValue;
use crate::metadata::file::{FileModeInfo, InfoSection, TorrentFile};
use crate::metadata::json::to_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything known about one successfully decoded input file.
#[derive(Debug, Clone)]
pub struct Report {
    pub path: PathBuf,
    pub document: BencodeValue,
    pub torrent: TorrentFile,
}

struct TextReport<'a> {
    report: &'a Report,
    list_files: bool,
}

impl Report {
    /// Renders the whole report up front so that it can be written in one go.
    pub fn render(&self, format: OutputFormat, list_files: bool) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(TextReport { report: self, list_files }.to_string()),
            OutputFormat::Json => self.render_json(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut json = to_json(&self.document);
        if let JsonValue::Object(map) = &mut json {
            map.insert("torrent_file".to_string(), JsonValue::String(self.path.display().to_string()));
            if let Some(hash) = &self.torrent.hash {
                map.insert("info_hash".to_string(), JsonValue::String(hash.to_hex()));
            }
        }
        json
    }

    fn render_json(&self) -> Result<String, serde_json::Error> {
        let mut out: Vec<u8> = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.to_json().serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

fn format_creation_date(seconds: i64) -> String {
    let formatted = OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|date| date.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC")).ok());
    match formatted {
        Some(date) => format!("{} ({})", date, seconds),
        None => seconds.to_string(),
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let torrent = &self.report.torrent;
        writeln!(f, "{:>15} : {}", "torrent file", self.report.path.display())?;
        if let Some(name) = torrent.name() {
            writeln!(f, "{:>15} : {}", "name", name)?;
        }
        match &torrent.hash {
            Some(hash) => writeln!(f, "{:>15} : {}", "info hash", hash)?,
            None => writeln!(f, "{:>15} : absent", "info hash")?,
        }
        if let Some(url) = torrent.announce() {
            writeln!(f, "{:>15} : {}", "announce", url)?;
        }
        for (i, tier) in torrent.announce_list().iter().enumerate() {
            let label = if i == 0 { "announce-list" } else { "" };
            let urls = tier.iter().map(|url| url.as_str()).collect::<Vec<_>>().join(", ");
            writeln!(f, "{:>15} : [{}]", label, urls)?;
        }
        if let Some(seconds) = torrent.creation_date() {
            writeln!(f, "{:>15} : {}", "creation date", format_creation_date(seconds))?;
        }
        if let Some(author) = torrent.created_by() {
            writeln!(f, "{:>15} : {}", "created by", author)?;
        }
        if let Some(encoding) = torrent.encoding() {
            writeln!(f, "{:>15} : {}", "encoding", encoding)?;
        }
        if let Some(text) = torrent.comment() {
            writeln!(f, "{:>15} : {}", "comment", text)?;
        }
        if let Some(info) = &torrent.info {
            self.write_info(f, info)?;
        }
        writeln!(f)
    }
}

impl TextReport<'_> {
    fn write_info(&self, f: &mut fmt::Formatter, info: &InfoSection) -> fmt::Result {
        if let Some(length) = info.piece_length {
            writeln!(f, "{:>15} : {} bytes", "piece length", length)?;
        }
        writeln!(f, "{:>15} : {}", "pieces", info.num_pieces())?;
        if info.private {
            writeln!(f, "{:>15} : yes", "private")?;
        }
        match &info.mode {
            FileModeInfo::Single { .. } => {
                writeln!(f, "{:>15} : single file", "mode")?;
            }
            FileModeInfo::Multiple { files } => {
                writeln!(f, "{:>15} : multi-file ({} files)", "mode", files.len())?;
            }
        }
        writeln!(f, "{:>15} : {} bytes", "total size", info.total_length())?;
        if let (true, FileModeInfo::Multiple { files }) = (self.list_files, &info.mode) {
            writeln!(f, "{:>15} :", "files")?;
            for file in files {
                writeln!(f, "{:>35}   {}", file.length, file.joined_path())?;
            }
        }
        Ok(())
    }
}
