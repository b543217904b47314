use mpd::Song;

/// Display label for a song, by priority: "artist – title", then title,
/// then stream name, then the file's basename without its extension.
/// "?" when nothing usable is present.
pub fn song_label(song: &Song) -> String {
    if let Some(title) = song.title.as_deref().filter(|t| !t.is_empty()) {
        if let Some(artist) = song.artist.as_deref().filter(|a| !a.is_empty()) {
            return format!("{artist} – {title}");
        }
        return title.to_string();
    }
    if let Some(name) = song.name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    if song.file.is_empty() {
        return "?".to_string();
    }
    let basename = song.file.rsplit('/').next().unwrap_or(&song.file);
    match basename.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => basename.to_string(),
    }
}

fn artist_of(song: &Song) -> String {
    song.artist.clone().unwrap_or_else(|| "?".to_string())
}

fn album_of(song: &Song) -> String {
    song.tags
        .iter()
        .find(|(key, _)| key == "Album")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "?".to_string())
}

/// Label-keyed buckets of songs. First-seen order on both labels and songs;
/// no bucket holds the same song twice. Identity is the file path, which the
/// daemon treats as the database key.
#[derive(Debug, Default)]
pub struct Grouping {
    entries: Vec<(String, Vec<Song>)>,
}

impl Grouping {
    pub fn add(&mut self, label: String, song: &Song) {
        match self.entries.iter_mut().find(|(known, _)| *known == label) {
            Some((_, songs)) => {
                if !songs.iter().any(|s| s.file == song.file) {
                    songs.push(song.clone());
                }
            }
            None => self.entries.push((label, vec![song.clone()])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Song])> {
        self.entries
            .iter()
            .map(|(label, songs)| (label.as_str(), songs.as_slice()))
    }
}

/// The three groupings a search renders: artists, artist–album pairs, and
/// title labels.
#[derive(Debug, Default)]
pub struct SearchGroups {
    pub artists: Grouping,
    pub albums: Grouping,
    pub titles: Grouping,
}

/// Group the four field-search result lists. A song matching several fields
/// lands in several groupings, but never twice in the same bucket.
pub fn build_groupings(
    artist_songs: &[Song],
    album_songs: &[Song],
    title_songs: &[Song],
    file_songs: &[Song],
) -> SearchGroups {
    let mut groups = SearchGroups::default();

    for song in artist_songs {
        groups.artists.add(artist_of(song), song);
    }

    for song in album_songs.iter().chain(artist_songs) {
        let label = format!("{} – {}", artist_of(song), album_of(song));
        groups.albums.add(label, song);
    }

    for song in title_songs
        .iter()
        .chain(album_songs)
        .chain(artist_songs)
        .chain(file_songs)
    {
        groups.titles.add(song_label(song), song);
    }

    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Artist,
    Album,
    Title,
}

/// One activatable row of the search popover; activating it enqueues every
/// song in the bucket, in order.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub kind: RowKind,
    pub label: String,
    pub songs: Vec<Song>,
}

impl SearchGroups {
    /// Flatten for display: artist rows, then album rows, then title rows.
    pub fn into_rows(self) -> Vec<ResultRow> {
        let mut rows = Vec::new();
        for (kind, grouping) in [
            (RowKind::Artist, self.artists),
            (RowKind::Album, self.albums),
            (RowKind::Title, self.titles),
        ] {
            for (label, songs) in grouping.entries {
                rows.push(ResultRow { kind, label, songs });
            }
        }
        rows
    }
}
