use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::cipher::{CipherVault, query_param, set_query_param};
use crate::common::errors::{Error, Result};
use crate::common::http::HttpClient;
use crate::configs::Config;
use crate::evaluator::ScriptEvaluator;
use crate::parsers::player::{PlayerResponse, parse_player_response};
use crate::parsers::watch_page::WatchPage;
use crate::personas::{Persona, user_agent_for_url};
use crate::player::PlayerClient;
use crate::streams::quality::itag_quality_label;
use crate::streams::{
    SourceKind, StreamBase, StreamDescriptor, StreamInfo, StreamKey, StreamManifest, VideoId,
    VideoQuality, VideoTrack,
};

const DEFAULT_FRAMERATE: u32 = 24;

/// Per-call options for `get_manifest`.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Personas tried in order; `None` uses the configured chain and keeps
    /// the tvEmbedded fallback available.
    pub personas: Option<Vec<Persona>>,
    /// Fetch the watch page up front instead of lazily on first
    /// descrambling need.
    pub require_watch_page: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            personas: None,
            require_watch_page: true,
            cancel: None,
        }
    }
}

/// Resolves video ids into deduplicated stream manifests. Cheap to share;
/// all per-call state lives in a private session.
pub struct StreamResolver {
    config: Config,
    http: Arc<HttpClient>,
    player: PlayerClient,
    evaluator: ScriptEvaluator,
}

/// State owned by one `get_manifest` call: the dedup accumulator, the
/// watch page, the descrambling vault, and the last persona-scoped error.
struct ResolveSession {
    video_id: VideoId,
    watch_page: Option<WatchPage>,
    cipher: CipherVault,
    accepted: Vec<StreamInfo>,
    seen: HashSet<StreamKey>,
    last_error: Option<Error>,
}

impl ResolveSession {
    fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            watch_page: None,
            cipher: CipherVault::new(),
            accepted: Vec::new(),
            seen: HashSet::new(),
            last_error: None,
        }
    }

    fn mark(&self) -> usize {
        self.accepted.len()
    }

    /// Drops everything a persona contributed after `mark`, keys included.
    fn rollback(&mut self, mark: usize) {
        for info in self.accepted.drain(mark..) {
            self.seen.remove(&info.key());
        }
    }

    fn push(&mut self, info: StreamInfo) {
        let key = info.key();
        if self.seen.insert(key) {
            self.accepted.push(info);
        }
    }

    fn record_error(&mut self, err: Error) {
        self.last_error = Some(err);
    }
}

impl StreamResolver {
    pub fn new(config: Config) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config.http)?);
        let player = PlayerClient::new(http.clone());
        let evaluator = ScriptEvaluator::new(&config.evaluator);
        Ok(Self {
            config,
            http,
            player,
            evaluator,
        })
    }

    pub async fn get_manifest(&self, video_id: &str) -> Result<StreamManifest> {
        self.get_manifest_with(video_id, ResolveOptions::default())
            .await
    }

    pub async fn get_manifest_with(
        &self,
        video_id: &str,
        options: ResolveOptions,
    ) -> Result<StreamManifest> {
        let id = VideoId::parse(video_id)?;
        let cancel = options.cancel.clone().unwrap_or_default();
        let deadline = Duration::from_secs(self.config.deadline_secs);

        let resolve = self.resolve(id, &options, &cancel);
        tokio::select! {
            outcome = tokio::time::timeout(deadline, resolve) => {
                outcome.map_err(|_| Error::DeadlineExceeded)?
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// The HLS side door: requires playability, returns the live manifest
    /// URL or `NotLiveStream`.
    pub async fn get_hls_url(&self, video_id: &str) -> Result<String> {
        let id = VideoId::parse(video_id)?;
        let watch_page = self.player.get_watch_page(&id).await?;
        let body = watch_page.player_response().ok_or(Error::Parse {
            what: "watch page player response",
        })?;
        let response = parse_player_response(&body);
        classify_playability(&response)?;
        response.hls_manifest_url.ok_or(Error::NotLiveStream)
    }

    /// Raw media bytes for a resolved rendition, replaying the UA of the
    /// persona that minted the URL.
    pub async fn get_stream(
        &self,
        info: &StreamInfo,
        range: Option<(u64, Option<u64>)>,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(ua) = user_agent_for_url(info.url()) {
            headers.push(("User-Agent", ua));
        }
        self.http.stream(info.url(), &headers, range).await
    }

    async fn resolve(
        &self,
        video_id: VideoId,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<StreamManifest> {
        let (chain, fallback_available) = match &options.personas {
            Some(personas) => (personas.clone(), false),
            None => (Persona::resolve_chain(&self.config.personas), true),
        };

        let mut session = ResolveSession::new(video_id);
        self.run_personas(&mut session, &chain, options, cancel)
            .await?;

        if session.accepted.is_empty() && fallback_available {
            tracing::warn!(
                "all primary personas failed for {}, trying the fallback chain",
                session.video_id
            );
            self.run_personas(&mut session, &Persona::fallback_chain(), options, cancel)
                .await?;
        }

        if session.accepted.is_empty() {
            // Raise the last captured persona error; only synthesize
            // `VideoUnavailable` when no persona got far enough to fail.
            return Err(session.last_error.take().unwrap_or(Error::VideoUnavailable));
        }

        Ok(StreamManifest::new(session.accepted))
    }

    async fn run_personas(
        &self,
        session: &mut ResolveSession,
        chain: &[Persona],
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for &persona in chain {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.try_persona(session, persona, options).await {
                Ok(()) => {
                    if !session.accepted.is_empty() {
                        return Ok(());
                    }
                    session.record_error(Error::VideoUnavailable);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!("persona {} failed for {}: {}", persona.name(), session.video_id, err);
                    session.record_error(err);
                }
            }
        }
        Ok(())
    }

    async fn try_persona(
        &self,
        session: &mut ResolveSession,
        persona: Persona,
        options: &ResolveOptions,
    ) -> Result<()> {
        if options.require_watch_page && session.watch_page.is_none() {
            let page = self.player.get_watch_page(&session.video_id).await?;
            session.watch_page = Some(page);
        }

        // Cipher personas send the signature timestamp with the query.
        let signature_timestamp = if persona.requires_cipher() {
            self.ensure_cipher(session).await?;
            session.cipher.signature_timestamp()
        } else {
            None
        };

        let response = self
            .player
            .get_player_response(&session.video_id, persona, signature_timestamp)
            .await?;
        classify_playability(&response)?;

        let mark = session.mark();
        let outcome = self
            .accumulate_persona(session, persona, &response)
            .await;
        if let Err(err) = outcome {
            session.rollback(mark);
            return Err(err);
        }

        // Signature rejection shows up as a 403 on the first URL; the
        // whole persona is then suspect. An unprobeable URL counts the
        // same way.
        if session.accepted.len() > mark {
            let first_url = session.accepted[mark].url().to_string();
            match self.http.head(&first_url).await {
                Ok(status) if status == reqwest::StatusCode::FORBIDDEN => {
                    tracing::warn!(
                        "persona {} produced 403-rejected URLs for {}",
                        persona.name(),
                        session.video_id
                    );
                    session.rollback(mark);
                    return Err(Error::Status { status });
                }
                Ok(_) => {}
                Err(err) => {
                    session.rollback(mark);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Emits descriptors in the fixed precedence order: direct, then
    /// DASH, then HLS. The deduplicator keeps the first occurrence.
    async fn accumulate_persona(
        &self,
        session: &mut ResolveSession,
        persona: Persona,
        response: &PlayerResponse,
    ) -> Result<()> {
        for descriptor in &response.descriptors {
            self.normalize_into(session, persona, descriptor.clone()).await?;
        }

        if let Some(url) = &response.dash_manifest_url {
            match self.player.get_dash_descriptors(url).await {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        self.normalize_into(session, persona, descriptor).await?;
                    }
                }
                Err(err) => {
                    tracing::warn!("dash manifest fetch failed for {}: {}", session.video_id, err);
                }
            }
        }

        if let Some(url) = &response.hls_manifest_url {
            match self.player.get_hls_descriptors(url).await {
                Ok(descriptors) => {
                    for descriptor in descriptors {
                        self.normalize_into(session, persona, descriptor).await?;
                    }
                }
                Err(err) => {
                    tracing::warn!("hls manifest fetch failed for {}: {}", session.video_id, err);
                }
            }
        }

        Ok(())
    }

    async fn normalize_into(
        &self,
        session: &mut ResolveSession,
        persona: Persona,
        mut descriptor: StreamDescriptor,
    ) -> Result<()> {
        if let Some(n) = query_param(&descriptor.url, "n").map(|n| n.to_string()) {
            descriptor.url = self.repair_url(session, &descriptor.url, &n).await?;
        }

        let content_length = match descriptor.content_length {
            Some(len) => Some(len),
            // Live renditions have no fixed size; probing them is
            // meaningless, so they pass with the bitrate as a stand-in.
            None if descriptor.source == SourceKind::Hls => Some(descriptor.bitrate.max(1)),
            None => self.http.probe_content_length(&descriptor.url).await,
        };
        let Some(file_size) = content_length.filter(|len| *len > 0) else {
            tracing::debug!(
                "dropping itag {} from {}: no resolvable content length",
                descriptor.itag,
                persona.name()
            );
            return Ok(());
        };

        let info = build_stream_info(&session.video_id, descriptor, file_size)?;
        session.push(info);
        Ok(())
    }

    /// Replaces the `n` throttling parameter with its descrambled value,
    /// loading the watch page and player script on first need.
    async fn repair_url(
        &self,
        session: &mut ResolveSession,
        url: &str,
        n: &str,
    ) -> Result<String> {
        self.ensure_cipher(session).await?;
        let plain = session.cipher.descramble(&self.evaluator, n).await?;
        Ok(set_query_param(url, "n", &plain))
    }

    async fn ensure_cipher(&self, session: &mut ResolveSession) -> Result<()> {
        if session.cipher.is_loaded() {
            return Ok(());
        }
        if session.watch_page.is_none() {
            session.watch_page = Some(self.player.get_watch_page(&session.video_id).await?);
        }
        let watch_page = session.watch_page.as_ref().unwrap();
        session.cipher.load(&self.http, watch_page).await
    }
}

/// Playability outcomes, checked before any descriptor is touched.
/// Purchase and genuine unplayability are fatal; sign-in and age gates
/// stay persona-scoped so the tvEmbedded fallback gets its turn.
fn classify_playability(response: &PlayerResponse) -> Result<()> {
    if let Some(preview) = &response.preview_video_id {
        return Err(Error::VideoRequiresPurchase {
            preview: Some(preview.clone()),
        });
    }
    if let Some(reason) = &response.playability_error {
        if reason.to_lowercase().contains("payment") {
            return Err(Error::VideoRequiresPurchase { preview: None });
        }
    }
    if response.is_playable {
        return Ok(());
    }

    let reason = response
        .playability_error
        .clone()
        .unwrap_or_else(|| "unknown reason".to_string());
    let gated = matches!(
        response.status.as_str(),
        "LOGIN_REQUIRED" | "AGE_CHECK_REQUIRED" | "AGE_VERIFICATION_REQUIRED"
    ) || reason.to_lowercase().contains("sign in");
    if gated {
        return Err(Error::SignInRequired { reason });
    }
    Err(Error::VideoUnplayable { reason })
}

/// Builds the normalized variant for one descriptor. Pure; all I/O
/// (descrambling, size probing) happens before this point.
fn build_stream_info(
    video_id: &VideoId,
    descriptor: StreamDescriptor,
    file_size: u64,
) -> Result<StreamInfo> {
    if descriptor.acodec.is_none() && descriptor.vcodec.is_none() {
        return Err(Error::CodecExtraction {
            mime: format!("{}/{}", descriptor.container, descriptor.itag),
        });
    }

    let codecs = match (&descriptor.vcodec, &descriptor.acodec) {
        (Some(v), Some(a)) => format!("{v}, {a}"),
        (Some(v), None) => v.clone(),
        (None, Some(a)) => a.clone(),
        (None, None) => unreachable!(),
    };

    let base = StreamBase {
        video_id: video_id.clone(),
        itag: descriptor.itag,
        url: descriptor.url,
        container: descriptor.container,
        file_size,
        bitrate: descriptor.bitrate,
        codecs,
    };

    let video_track = || -> VideoTrack {
        let quality_label = descriptor
            .quality_label
            .clone()
            .or_else(|| itag_quality_label(descriptor.itag).map(|l| l.to_string()))
            .or_else(|| descriptor.height.map(|h| format!("{h}p")))
            .unwrap_or_else(|| "360p".to_string());
        let quality = VideoQuality::from_label(&quality_label);
        let (width, height) = match (descriptor.width, descriptor.height) {
            (Some(w), Some(h)) => (w, h),
            _ => quality.default_resolution(),
        };
        VideoTrack {
            quality_label,
            quality,
            width,
            height,
            fps: descriptor.fps.unwrap_or(DEFAULT_FRAMERATE),
        }
    };

    let info = match descriptor.source {
        SourceKind::Hls => {
            if descriptor.audio_only {
                StreamInfo::HlsAudio {
                    base,
                    audio_track: descriptor.audio_track,
                }
            } else if descriptor.video_only {
                StreamInfo::HlsVideoOnly {
                    base,
                    video: video_track(),
                }
            } else {
                StreamInfo::HlsMuxed {
                    base,
                    video: video_track(),
                }
            }
        }
        SourceKind::Progressive if descriptor.acodec.is_some() && descriptor.vcodec.is_some() => {
            StreamInfo::MuxedProgressive {
                base,
                video: video_track(),
            }
        }
        // Adaptive, or a progressive descriptor that only carries one
        // media kind.
        _ => {
            if descriptor.audio_only || descriptor.vcodec.is_none() {
                StreamInfo::AudioOnlyAdaptive {
                    base,
                    audio_track: descriptor.audio_track,
                    fragments: descriptor.fragments,
                }
            } else {
                StreamInfo::VideoOnlyAdaptive {
                    base,
                    video: video_track(),
                    fragments: descriptor.fragments,
                }
            }
        }
    };

    Ok(info)
}
