use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::models::{Follow, Playlist, PlaylistEntry};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRow {
    #[serde(default, deserialize_with = "opaque_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub owner_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    #[serde(default, deserialize_with = "opaque_id")]
    pub playlist_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub song_id: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowRow {
    #[serde(default, deserialize_with = "opaque_id")]
    pub playlist_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub follower_id: Option<String>,
}

fn required(value: Option<String>, what: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!("missing {}", what))),
    }
}

impl TryFrom<PlaylistRow> for Playlist {
    type Error = AppError;

    fn try_from(row: PlaylistRow) -> Result<Self, Self::Error> {
        Ok(Playlist {
            id: required(row.id, "playlist id")?,
            name: required(row.name, "playlist name")?,
            owner_id: row.owner_id,
            created_date: row.created_date,
        })
    }
}

impl TryFrom<EntryRow> for PlaylistEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(PlaylistEntry {
            playlist_id: required(row.playlist_id, "playlist_id")?,
            song_id: required(row.song_id, "song_id")?,
            position: row
                .position
                .ok_or_else(|| AppError::InvalidInput("missing position".into()))?,
        })
    }
}

impl TryFrom<FollowRow> for Follow {
    type Error = AppError;

    fn try_from(row: FollowRow) -> Result<Self, Self::Error> {
        Ok(Follow {
            playlist_id: required(row.playlist_id, "playlist_id")?,
            user_id: required(row.follower_id, "follower_id")?,
        })
    }
}

/// Identifiers are opaque strings; numeric ids are rendered in decimal.
fn opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts full timestamps and bare dates. Anything else reads as absent.
pub(crate) fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::String(raw)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(parse_datetime(&raw))
}

pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids_become_strings() {
        let row: EntryRow =
            serde_json::from_str(r#"{"playlist_id": 7, "song_id": "abc", "position": 3}"#)
                .unwrap();
        assert_eq!(row.playlist_id.as_deref(), Some("7"));
        assert_eq!(row.song_id.as_deref(), Some("abc"));
        assert_eq!(row.position, Some(3));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let row: PlaylistRow = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(row.name, None);
        assert!(Playlist::try_from(row).is_err());
    }

    #[test]
    fn test_playlist_without_owner_still_converts() {
        let row: PlaylistRow = serde_json::from_str(
            r#"{"id": 1, "name": "Roadtrip", "created_date": "2023-01-01"}"#,
        )
        .unwrap();
        let playlist = Playlist::try_from(row).unwrap();
        assert_eq!(playlist.owner_id, None);
        assert_eq!(
            playlist.created_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2023-01-01".to_string())
        );
    }

    #[test]
    fn test_entry_without_position_is_rejected() {
        let row = EntryRow {
            playlist_id: Some("1".into()),
            song_id: Some("2".into()),
            position: None,
        };
        assert!(matches!(
            PlaylistEntry::try_from(row),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-03-01T12:30:00").is_some());
        assert!(parse_datetime("2024-03-01 12:30:00").is_some());
        assert!(parse_datetime("2024-03-01").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
