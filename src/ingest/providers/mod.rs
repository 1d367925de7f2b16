pub mod youtube_feed;
