//! # Playlist Module
//!
//! Two playlist kinds, both reducible to an ordered list of catalog songs:
//!
//! - [`SimplePlaylist`]: an explicit, user-ordered list of song filenames.
//! - [`AutoPlaylist`]: a condition tree plus a multi-key sort; membership and
//!   order are recomputed from the catalog every time.
//!
//! Either kind renders to extended M3U through [`Playlist::get_m3u`].

use crate::catalog::Catalog;
use crate::condition::{self, Condition};
use crate::error::{Error, Result};
use crate::song::{compare_attrs, Song};
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};

/// Sort keys used when an auto playlist doesn't specify any.
pub const DEFAULT_SORT: [&str; 2] = ["artist", "title"];

/// Prefix marking a sort key as descending.
pub const DESCENDING_PREFIX: char = '!';

/// A playlist, tagged by its `type` discriminator in the catalog file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Playlist {
    #[serde(rename = "simple")]
    Simple(SimplePlaylist),
    #[serde(rename = "auto")]
    Auto(AutoPlaylist),
}

impl Playlist {
    pub const SIMPLE: &'static str = "simple";
    pub const AUTO: &'static str = "auto";

    /// The discriminator written to the catalog file.
    pub fn kind(&self) -> &'static str {
        match self {
            Playlist::Simple(_) => Self::SIMPLE,
            Playlist::Auto(_) => Self::AUTO,
        }
    }

    /// Builds a playlist from its serialized form. The `type` field alone
    /// selects the variant.
    pub fn from_config(name: &str, config: &Value) -> Result<Playlist> {
        let fields = config.as_object().ok_or_else(|| Error::InvalidField {
            kind: "playlist",
            name: name.to_string(),
            field: "type",
            source: serde::de::Error::custom("playlist entry must be an object"),
        })?;

        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField {
                kind: "playlist",
                name: name.to_string(),
                field: "type",
            })?;

        match kind {
            Self::SIMPLE => SimplePlaylist::from_config(name, fields).map(Playlist::Simple),
            Self::AUTO => AutoPlaylist::from_config(name, fields).map(Playlist::Auto),
            other => Err(Error::UnknownVariant {
                kind: "playlist",
                name: name.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Songs of the playlist, in order.
    pub fn get_songs<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Song> {
        match self {
            Playlist::Simple(p) => p.get_songs(catalog),
            Playlist::Auto(p) => p.get_songs(catalog),
        }
    }

    /// Lazily renders the playlist as extended M3U, one line per item.
    ///
    /// The song list is computed when the iterator is created, so every call
    /// reflects the catalog as it is now.
    pub fn get_m3u<'a>(&self, catalog: &'a Catalog) -> impl Iterator<Item = String> + 'a {
        let entries = self.get_songs(catalog).into_iter().flat_map(move |song| {
            let path = catalog.song_path(&song.filename);
            [
                String::new(),
                format!("#EXTINF,{},{}", song.length_seconds(), display_title(song)),
                path.to_string_lossy().into_owned(),
            ]
        });

        std::iter::once(M3U_HEADER.to_string()).chain(entries)
    }

    /// Whether the playlist refers to `filename` explicitly.
    pub fn references(&self, filename: &str) -> bool {
        match self {
            Playlist::Simple(p) => p.songs.iter().any(|s| s == filename),
            Playlist::Auto(_) => false,
        }
    }
}

const M3U_HEADER: &str = "#EXTM3U";

/// `"<title> - <artist>"` when both tags are known, else the filename, with
/// everything outside `[A-Za-z0-9_\- ()]` stripped.
fn display_title(song: &Song) -> String {
    let title = match (song.metadata.get("title"), song.metadata.get("artist")) {
        (Some(title), Some(artist)) => format!("{title} - {artist}"),
        _ => song.filename.clone(),
    };

    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' ' | '(' | ')'))
        .collect()
}

/// A manually ordered playlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimplePlaylist {
    /// Catalog filenames, in playlist order.
    pub songs: Vec<String>,
}

impl SimplePlaylist {
    pub fn new(songs: Vec<String>) -> Self {
        Self { songs }
    }

    fn from_config(name: &str, fields: &Map<String, Value>) -> Result<Self> {
        let songs = match fields.get("songs") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|source| Error::InvalidField {
                kind: "playlist",
                name: name.to_string(),
                field: "songs",
                source,
            })?,
            None => Vec::new(),
        };
        Ok(Self { songs })
    }

    pub fn get_songs<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Song> {
        self.songs
            .iter()
            .filter_map(|filename| {
                let song = catalog.get_song(filename);
                if song.is_none() {
                    warn!("Playlist entry `{filename}` is not in the library, skipping");
                }
                song
            })
            .collect()
    }
}

/// A rule-driven playlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoPlaylist {
    /// Conditions, implicitly AND-ed. Stored without the wrapping `and`.
    pub conditions: Vec<Condition>,
    /// Attribute names from most to least significant; a leading `!` sorts
    /// that key descending.
    pub sort: Vec<String>,
}

impl Default for AutoPlaylist {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            sort: DEFAULT_SORT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AutoPlaylist {
    pub fn new(conditions: Vec<Condition>, sort: Vec<String>) -> Self {
        Self { conditions, sort }
    }

    fn from_config(name: &str, fields: &Map<String, Value>) -> Result<Self> {
        let mut playlist = AutoPlaylist::default();

        if let Some(raw) = fields.get("sort") {
            playlist.sort = serde_json::from_value(raw.clone()).map_err(|source| Error::InvalidField {
                kind: "playlist",
                name: name.to_string(),
                field: "sort",
                source,
            })?;
        }

        if let Some(raw) = fields.get("conditions") {
            playlist.conditions =
                condition::parse_list(raw, "conditions").map_err(|e| Error::MalformedCondition {
                    playlist: name.to_string(),
                    location: e.location,
                    reason: e.reason,
                })?;
        }

        Ok(playlist)
    }

    /// The full tree, with the implicit top-level `and` restored.
    pub fn root(&self) -> Condition {
        Condition::all(self.conditions.clone())
    }

    pub fn matches(&self, song: &Song) -> bool {
        self.conditions.iter().all(|c| c.matches(song))
    }

    /// Matching songs, sorted by the sort keys.
    ///
    /// Sorting runs one stable pass per key, from the least significant key
    /// to the most significant, so earlier keys dominate and ties keep the
    /// order set by later keys.
    pub fn get_songs<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Song> {
        let mut songs: Vec<&Song> = catalog.songs().filter(|s| self.matches(s)).collect();

        for key in self.sort.iter().rev() {
            let (field, descending) = match key.strip_prefix(DESCENDING_PREFIX) {
                Some(field) => (field, true),
                None => (key.as_str(), false),
            };

            songs.sort_by(|a, b| {
                let ord = compare_attrs(a.attr(field).as_ref(), b.attr(field).as_ref());
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        songs
    }
}
