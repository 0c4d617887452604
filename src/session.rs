//! Per-run context owning the cache, the Discogs client and settings
//!
//! A `Session` is opened once in `main`, handed to every command, and closed
//! on the way out. The client is created on first use so that commands served
//! entirely from the cache never prompt for authorization.

use std::path::Path;

use tracing::info;

use crate::cache::{PostedSaleRecord, ResponseCache};
use crate::config::Config;
use crate::discogs::{
    cached_entity, latest_stats, ArtworkStore, ClientError, DiscogsClient, Fetcher, Release,
    RetryPolicy,
};
use crate::tags::{
    apply_track, check_total_tracks, read_position, LoftyTags, TagError, TagPosition, TagStore,
};

/// Everything a command needs to talk to the cache and Discogs
pub struct Session {
    config: Config,
    cache: ResponseCache,
    client: Option<DiscogsClient>,
    policy: RetryPolicy,
    artwork: ArtworkStore,
}

impl Session {
    /// Opens the cache database named by the configuration
    pub fn open(config: Config) -> Result<Self, ClientError> {
        let cache = ResponseCache::open(&config.database_path())?;
        Ok(Self::with_cache(config, cache))
    }

    /// Builds a session around an already open cache
    pub fn with_cache(config: Config, cache: ResponseCache) -> Self {
        let artwork = ArtworkStore::new(config.data_dir.clone());
        Self {
            config,
            cache,
            client: None,
            policy: RetryPolicy::default(),
            artwork,
        }
    }

    /// Uses a pre-built client instead of creating one on demand
    pub fn with_client(mut self, client: DiscogsClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Overrides the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the artwork store
    pub fn with_artwork(mut self, artwork: ArtworkStore) -> Self {
        self.artwork = artwork;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The response cache
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Returns the cache and a ready client, creating the client if needed
    async fn connect(&mut self) -> Result<(&ResponseCache, &DiscogsClient), ClientError> {
        let client = match self.client.take() {
            Some(client) => client,
            None => {
                let mut client = DiscogsClient::new(&self.config)?;
                client.ensure_authorized().await?;
                client
            }
        };
        let client = self.client.insert(client);
        Ok((&self.cache, client))
    }

    /// Runs the interactive authorization, replacing stored credentials
    pub async fn authorize(&mut self) -> Result<(), ClientError> {
        let mut client = DiscogsClient::new(&self.config)?;
        let stdin = std::io::stdin();
        client.authorize(stdin.lock()).await?;
        self.client = Some(client);
        Ok(())
    }

    /// Loads a release, from the cache when possible
    pub async fn release(&mut self, id: u64) -> Result<Release, ClientError> {
        if let Some(data) = cached_entity(&self.cache, id)? {
            return Release::from_payload(id, data);
        }
        let policy = self.policy;
        let (cache, client) = self.connect().await?;
        let data = Fetcher::with_policy(cache, client, policy).fetch_entity(id).await?;
        Release::from_payload(id, data)
    }

    /// Cover artwork for a release, if it has any
    pub async fn artwork(&mut self, release: &Release) -> Result<Option<Vec<u8>>, ClientError> {
        let Some(uri) = release.artwork_uri() else {
            return Ok(None);
        };
        let store = self.artwork.clone();
        let (_, client) = self.connect().await?;
        Ok(Some(store.get(client, uri).await?))
    }

    /// Marketplace record for a release no older than `max_age` days
    pub async fn stats(&mut self, id: u64, max_age: i64) -> Result<PostedSaleRecord, ClientError> {
        if let Some(record) = self.cache.get_latest_record(id, max_age)? {
            return Ok(record);
        }
        let policy = self.policy;
        let (cache, client) = self.connect().await?;
        latest_stats(cache, client, &policy, id, max_age).await
    }

    /// Writes track `index` of `release` into `tags`, downloading artwork if
    /// the file has none
    pub async fn tag<T: TagStore>(
        &mut self,
        tags: &mut T,
        release: &Release,
        index: usize,
    ) -> Result<(), TagError> {
        let track = release.track(index)?;
        let artwork = if tags.has_artwork() {
            None
        } else {
            self.artwork(release).await?
        };
        apply_track(tags, &track, artwork.as_deref())?;
        tags.save()
    }

    /// Finds the release and track position for tags written by this tool
    ///
    /// The release is found from the comment field and the track from the
    /// track number. A stored track total that disagrees with the release is
    /// rejected.
    pub async fn resolve_from_tags<T: TagStore>(
        &mut self,
        tags: &T,
    ) -> Result<(Release, TagPosition), TagError> {
        let position = read_position(tags)?;
        let release = self.release(position.release_id).await?;
        check_total_tracks(&position, &release)?;
        Ok((release, position))
    }

    /// Refreshes tags that were written earlier by this tool
    pub async fn retag<T: TagStore>(&mut self, tags: &mut T) -> Result<Release, TagError> {
        let (release, position) = self.resolve_from_tags(tags).await?;
        self.tag(tags, &release, position.number - 1).await?;
        Ok(release)
    }

    /// [`retag`](Self::retag) for a file on disk
    pub async fn retag_file(&mut self, path: &Path) -> Result<Release, TagError> {
        let mut tags = LoftyTags::open(path)?;
        let release = self.retag(&mut tags).await?;
        info!(path = %path.display(), release = release.id(), "Retagged");
        Ok(release)
    }

    /// Closes the cache
    pub fn close(self) -> Result<(), ClientError> {
        self.cache.close()?;
        Ok(())
    }
}
