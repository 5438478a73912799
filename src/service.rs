use tracing::info;

use crate::aggregator::{
    build_playlist_detail, build_playlist_view, build_statistics, sort_views, PlaylistDetail,
    PlaylistSort, PlaylistView, Statistics,
};
use crate::catalog::{CatalogSource, Page, Paginated, Song, SongFilter};
use crate::error::{AppError, Result};

/// Reads a snapshot from a catalog store and hands it to the aggregator.
///
/// Collections are read one after another without a shared transaction.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: CatalogSource> CatalogService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn songs(&self, filter: &SongFilter, page: Page) -> Result<Paginated<Song>> {
        let songs = self.store.fetch_songs(filter).await?;
        Ok(Paginated::from_vec(songs, page))
    }

    pub async fn playlists(
        &self,
        name_filter: Option<&str>,
        sort: PlaylistSort,
    ) -> Result<Vec<PlaylistView>> {
        let playlists = self.store.fetch_playlists(name_filter).await?;
        let users = self.store.fetch_users().await?;
        let entries = self.store.fetch_entries(None).await?;
        let songs = self.store.fetch_songs(&SongFilter::default()).await?;
        let follows = self.store.fetch_follows(None).await?;

        let mut views =
            build_playlist_view(&playlists, &users, &entries, &songs, &follows, name_filter);
        sort_views(&mut views, sort);

        info!("Built {} playlist views", views.len());
        Ok(views)
    }

    pub async fn playlist(&self, id: &str) -> Result<PlaylistDetail> {
        let playlist = self
            .store
            .fetch_playlists(None)
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("playlist {}", id)))?;

        let entries = self.store.fetch_entries(Some(id)).await?;
        let follows = self.store.fetch_follows(Some(id)).await?;
        let users = self.store.fetch_users().await?;
        let songs = self.store.fetch_songs(&SongFilter::default()).await?;

        Ok(build_playlist_detail(
            &playlist, &users, &entries, &songs, &follows,
        ))
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        let entries = self.store.fetch_entries(None).await?;
        let songs = self.store.fetch_songs(&SongFilter::default()).await?;

        Ok(Statistics::from_vec(build_statistics(&entries, &songs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{NewPlaylist, NewPlaylistSong, NewSong};
    use crate::catalog::{CatalogWriter, DocumentCatalog, SqliteCatalog};

    async fn seed<W: CatalogWriter>(store: &W) -> String {
        let owner = store.add_user("Ada").await.unwrap();
        let fan = store.add_user("Grace").await.unwrap();
        let s1 = store
            .add_song(NewSong {
                title: "Respect".into(),
                artist: "Aretha".into(),
            })
            .await
            .unwrap();
        let s2 = store
            .add_song(NewSong {
                title: "Think".into(),
                artist: "Aretha".into(),
            })
            .await
            .unwrap();
        let s3 = store
            .add_song(NewSong {
                title: "Jolene".into(),
                artist: "Dolly".into(),
            })
            .await
            .unwrap();

        let roadtrip = store
            .create_playlist(NewPlaylist {
                name: "Roadtrip".into(),
                owner_id: owner.clone(),
                created_date: None,
                songs: vec![
                    NewPlaylistSong {
                        song_id: s1.clone(),
                        position: 1,
                    },
                    NewPlaylistSong {
                        song_id: s3,
                        position: 3,
                    },
                    NewPlaylistSong {
                        song_id: s2.clone(),
                        position: 2,
                    },
                ],
            })
            .await
            .unwrap();
        store
            .create_playlist(NewPlaylist {
                name: "Soul".into(),
                owner_id: owner,
                created_date: None,
                songs: vec![NewPlaylistSong {
                    song_id: s2,
                    position: 4,
                }],
            })
            .await
            .unwrap();
        store.follow_playlist(&roadtrip, &fan).await.unwrap();

        roadtrip
    }

    async fn check_service<S: CatalogSource + CatalogWriter>(store: &S) {
        let roadtrip = seed(store).await;
        let service = CatalogService::new(store);

        let views = service.playlists(Some("road"), PlaylistSort::Input).await.unwrap();
        assert_eq!(views.len(), 1);
        let titles: Vec<_> = views[0].songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Respect", "Think", "Jolene"]);
        assert_eq!(views[0].follower_count, 1);
        assert_eq!(views[0].owner_name, "Ada");

        let Statistics::Found(stats) = service.statistics().await.unwrap() else {
            panic!("expected statistics");
        };
        assert_eq!(stats[0].artist, "Aretha");
        assert_eq!(stats[0].playlist_membership_count, 3);
        assert_eq!(stats[0].unique_song_count, 2);
        assert!((stats[0].average_position - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats[1].artist, "Dolly");

        let detail = service.playlist(&roadtrip).await.unwrap();
        assert_eq!(detail.followers[0].name, "Grace");
        assert_eq!(detail.songs.len(), 3);

        let page = service
            .songs(
                &SongFilter {
                    title: None,
                    artist: Some("aretha".into()),
                },
                Page::new(1, 1).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.pages, 2);
        assert_eq!(page.items.len(), 1);

        let owner = store.add_user("Jürgen").await.unwrap();
        store
            .add_song(NewSong {
                title: "Über den Wolken".into(),
                artist: "Reinhard Mey".into(),
            })
            .await
            .unwrap();
        store
            .create_playlist(NewPlaylist {
                name: "Ärger Mix".into(),
                owner_id: owner,
                created_date: None,
                songs: vec![],
            })
            .await
            .unwrap();

        let views = service.playlists(Some("ärger"), PlaylistSort::Input).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].owner_name, "Jürgen");
        assert!(views[0].songs.is_empty());

        let page = service
            .songs(
                &SongFilter {
                    title: Some("über".into()),
                    artist: None,
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].artist, "Reinhard Mey");
    }

    #[tokio::test]
    async fn test_relational_backend() {
        let store = SqliteCatalog::in_memory().await.unwrap();
        check_service(&store).await;
    }

    #[tokio::test]
    async fn test_document_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentCatalog::new(dir.path().to_path_buf(), "playlists").unwrap();
        check_service(&store).await;
    }

    #[tokio::test]
    async fn test_empty_catalog_statistics() {
        let store = SqliteCatalog::in_memory().await.unwrap();
        let service = CatalogService::new(&store);

        assert_eq!(service.statistics().await.unwrap(), Statistics::Empty);
        assert!(matches!(
            service.playlist("1").await,
            Err(AppError::NotFound(_))
        ));
    }
}
