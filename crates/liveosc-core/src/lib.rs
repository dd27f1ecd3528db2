//! liveosc Core - remote control and pattern generation for Ableton Live.
//!
//! This crate talks to Live through the AbletonOSC remote script and provides
//! everything a tool-calling session needs on top of it:
//!
//! - **Transport** - UDP socket, receive loop, request/reply correlation
//! - **Live** - typed wrappers for AbletonOSC addresses
//! - **Theory** - scales, chords and note names
//! - **Generators** - melody, bass, chords, arpeggios and drums
//! - **Automation** - parameter curves sampled into steps
//! - **Arrangement** - genre templates and the plan that places them in Live
//! - **Mixing** - heuristic analysis, presets and mood changes
//! - **AutoPlay** - timed scene launching
//! - **Session** - project model and tool dispatch
//!
//! # Architecture
//!
//! A [`Transport`] owns one socket and one receive thread. Callers on any
//! thread send fire-and-forget commands or block on a query until the receive
//! loop routes the matching reply to them over a channel. [`LiveApi`] sits on
//! top, and [`Session`] holds an optional `LiveApi` so every tool also works
//! without Live running.

pub mod arrangement;
pub mod automation;
pub mod autoplay;
pub mod config;
pub mod error;
pub mod generators;
pub mod live;
pub mod mixing;
pub mod osc;
pub mod session;
pub mod theory;
pub mod transport;

pub use arrangement::{Arrangement, ArrangementAction, ArrangementExecutor, Section, SectionType};
pub use automation::{AutomationPoint, CurveShape};
pub use autoplay::{AutoPlayer, CancelToken};
pub use config::Config;
pub use error::{Error, Result};
pub use generators::Note;
pub use live::{LiveApi, TrackInfo};
pub use mixing::{AutoMixer, MixAnalyzer, MixIssue, TrackMeasurements};
pub use session::{tool_catalogue, ConnectOutcome, Session};
pub use theory::{ChordType, Key, Scale};
pub use transport::{Endpoint, Query, ReplyMatch, StateHandle, Transport, TransportStatus};
