//! Station directory payloads.

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::utils::lenient;

/// Station as listed by the directory API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryStation {
    #[serde(default, deserialize_with = "lenient::string")]
    pub stationuuid: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url_resolved: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub homepage: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub favicon: String,
    /// Comma-separated tag list.
    #[serde(default, deserialize_with = "lenient::string")]
    pub tags: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub countrycode: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub language: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub languagecodes: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub votes: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lastchangetime: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub codec: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bitrate: i64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub hls: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub lastcheckok: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub clickcount: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub clicktrend: i64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub ssl_error: bool,
    #[serde(default, deserialize_with = "lenient::opt_float")]
    pub geo_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_float")]
    pub geo_long: Option<f64>,
}

/// Tag keywords mapped to display genres, first match wins.
const GENRES: &[(&[&str], &str)] = &[
    (&["news"], "News"),
    (&["talk"], "Talk"),
    (&["sport"], "Sports"),
    (&["classical"], "Classical"),
    (&["jazz"], "Jazz"),
    (&["rock"], "Rock"),
    (&["pop"], "Pop"),
    (&["electronic", "techno", "house", "trance"], "Electronic"),
    (&["dance", "edm"], "Dance"),
    (&["hip hop", "hip-hop", "hiphop", "rap"], "Hip Hop"),
    (&["country"], "Country"),
    (&["blues"], "Blues"),
    (&["metal"], "Metal"),
    (&["punk"], "Punk"),
    (&["indie"], "Indie"),
    (&["alternative"], "Alternative"),
    (&["folk"], "Folk"),
    (&["reggae"], "Reggae"),
    (&["latin", "salsa", "merengue"], "Latin"),
    (&["r&b", "rnb", "soul"], "R&B"),
    (&["gospel", "christian", "religious"], "Christian"),
    (&["ambient", "chillout", "lounge"], "Ambient"),
    (&["world"], "World"),
    (&["oldies", "80s", "70s", "60s"], "Oldies"),
    (&["kpop", "k-pop"], "K-Pop"),
    (&["lofi", "lo-fi"], "Lo-Fi"),
    (&["funk"], "Funk"),
    (&["comedy"], "Comedy"),
];

fn genre_for_tag(tag: &str) -> String {
    let lower = tag.to_lowercase();
    for (needles, genre) in GENRES {
        if needles.iter().any(|n| lower.contains(n)) {
            return genre.to_string();
        }
    }
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).take(20).collect(),
        None => "Other".to_string(),
    }
}

impl DirectoryStation {
    /// Resolved stream URL when known, the listed URL otherwise.
    pub fn stream_url(&self) -> &str {
        if self.url_resolved.is_empty() {
            &self.url
        } else {
            &self.url_resolved
        }
    }

    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Display genre derived from the first tag.
    pub fn primary_genre(&self) -> String {
        genre_for_tag(self.tag_list().first().copied().unwrap_or("Other"))
    }

    pub fn is_likely_working(&self) -> bool {
        self.lastcheckok && !self.ssl_error && !self.stream_url().is_empty()
    }

    /// e.g. `128kbps • MP3`
    pub fn quality_info(&self) -> String {
        let mut parts = Vec::new();
        if self.bitrate > 0 {
            parts.push(format!("{}kbps", self.bitrate));
        }
        if !self.codec.is_empty() {
            parts.push(self.codec.to_uppercase());
        }
        parts.join(" • ")
    }
}

/// Country with its station count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryInfo {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub iso_3166_1: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub stationcount: i64,
}

/// Tag with its station count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub stationcount: i64,
}

fn parse_array(body: &str, what: &str) -> Result<Vec<serde_json::Value>, RequestError> {
    serde_json::from_str(body).map_err(|e| RequestError::malformed(what, e))
}

/// Parse a station list, dropping entries without a name or stream URL.
pub fn parse_stations(body: &str) -> Result<Vec<DirectoryStation>, RequestError> {
    Ok(parse_array(body, "station list")?
        .into_iter()
        .filter_map(|v| serde_json::from_value::<DirectoryStation>(v).ok())
        .map(|mut s| {
            s.name = s.name.trim().to_string();
            s
        })
        .filter(|s| !s.name.is_empty() && !s.stream_url().is_empty())
        .collect())
}

/// Parse a country list, dropping unnamed entries.
pub fn parse_countries(body: &str) -> Result<Vec<CountryInfo>, RequestError> {
    Ok(parse_array(body, "country list")?
        .into_iter()
        .filter_map(|v| serde_json::from_value::<CountryInfo>(v).ok())
        .filter(|c| !c.name.is_empty())
        .collect())
}

/// Parse a tag list, dropping unnamed entries.
pub fn parse_tags(body: &str) -> Result<Vec<TagInfo>, RequestError> {
    Ok(parse_array(body, "tag list")?
        .into_iter()
        .filter_map(|v| serde_json::from_value::<TagInfo>(v).ok())
        .filter(|t| !t.name.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIONS: &str = r#"[
        {"stationuuid":"a1","name":"  Jazz FM ","url":"http://jazz.example/stream",
         "url_resolved":"http://jazz.example/live.mp3","tags":"smooth jazz,lounge",
         "votes":120,"codec":"mp3","bitrate":128,"hls":0,"lastcheckok":1,"ssl_error":0,
         "geo_lat":51.5,"geo_long":null},
        {"stationuuid":"a2","name":"","url":"http://nameless.example"},
        {"stationuuid":"a3","name":"No Stream","url":"","url_resolved":""},
        {"stationuuid":"a4","name":"Broken","url":"http://broken.example","lastcheckok":0}
    ]"#;

    #[test]
    fn test_parse_stations_drops_incomplete_entries() {
        let stations = parse_stations(STATIONS).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Jazz FM");
        assert_eq!(stations[0].stream_url(), "http://jazz.example/live.mp3");
        assert_eq!(stations[1].stream_url(), "http://broken.example");
    }

    #[test]
    fn test_station_helpers() {
        let stations = parse_stations(STATIONS).unwrap();
        let jazz = &stations[0];
        assert_eq!(jazz.primary_genre(), "Jazz");
        assert!(jazz.is_likely_working());
        assert_eq!(jazz.quality_info(), "128kbps • MP3");
        assert_eq!(jazz.geo_lat, Some(51.5));
        assert!(jazz.geo_long.is_none());
        assert!(!stations[1].is_likely_working());
    }

    #[test]
    fn test_unknown_tag_capitalized() {
        assert_eq!(genre_for_tag("shoegaze"), "Shoegaze");
        assert_eq!(genre_for_tag(""), "Other");
    }

    #[test]
    fn test_non_array_is_malformed() {
        assert!(matches!(
            parse_stations(r#"{"error":"nope"}"#),
            Err(RequestError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_countries_and_tags() {
        let countries =
            parse_countries(r#"[{"name":"Germany","iso_3166_1":"DE","stationcount":5000},{"name":""}]"#)
                .unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].iso_3166_1, "DE");

        let tags = parse_tags(r#"[{"name":"rock","stationcount":"42"}]"#).unwrap();
        assert_eq!(tags[0].stationcount, 42);
    }
}
