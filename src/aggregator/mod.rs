pub mod stats;
pub mod view;

pub use stats::{build_statistics, ArtistStats, Statistics};
pub use view::{
    build_playlist_detail, build_playlist_view, sort_views, PlaylistDetail, PlaylistSort,
    PlaylistView, ViewSong,
};
