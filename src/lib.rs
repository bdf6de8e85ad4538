//! # riptide
//!
//! Resolves a YouTube video id into a [`StreamManifest`]: every distinct
//! audio, video, muxed, and live rendition the platform will serve, with
//! URLs a plain HTTP client can play back directly.
//!
//! The resolver probes the internal player API through several synthetic
//! client personas, reconciles their heterogeneous answers into one
//! deduplicated manifest, and repairs throttled URLs by extracting and
//! evaluating the platform's own descrambling routine at runtime.
//!
//! ## Basic usage
//!
//! ```no_run
//! # use riptide::{Config, StreamResolver};
//! # async fn run() -> riptide::Result<()> {
//! let resolver = StreamResolver::new(Config::default())?;
//! let manifest = resolver.get_manifest("dQw4w9WgXcQ").await?;
//!
//! for stream in manifest.iter() {
//!     println!("{} {} {} bytes", stream.itag(), stream.base().container, stream.file_size());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Persona selection
//!
//! The default chain is ios then android, with a tvEmbedded fallback for
//! gated videos. Override it per call when you know better:
//!
//! ```no_run
//! # use riptide::{Config, Persona, ResolveOptions, StreamResolver};
//! # async fn run() -> riptide::Result<()> {
//! let resolver = StreamResolver::new(Config::default())?;
//! let options = ResolveOptions {
//!     personas: Some(vec![Persona::Web]),
//!     ..Default::default()
//! };
//! let manifest = resolver.get_manifest_with("dQw4w9WgXcQ", options).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Resolution failures surface through [`Error`]; persona-scoped problems
//! are retried internally and only the aggregated outcome is raised.

pub mod cipher;
pub mod common;
pub mod configs;
pub mod evaluator;
pub mod parsers;
pub mod personas;
pub mod player;
pub mod resolver;
pub mod streams;

pub use common::errors::{Error, Result};
pub use configs::{Config, EvaluatorConfig, HttpConfig, RetryConfig};
pub use personas::Persona;
pub use resolver::{ResolveOptions, StreamResolver};
pub use streams::{
    AudioTrack, SourceKind, StreamBase, StreamInfo, StreamKey, StreamManifest, VideoId,
    VideoQuality, VideoTrack,
};
