pub mod diagnostics;
pub mod error;
pub mod fixtures;
pub mod model;
pub mod persistence;
pub mod set;
pub mod tree;

mod container;
mod remap;
mod sends;

pub use diagnostics::{
    TelemetryGuard, init_tracing, init_tracing_with_file_prefix, init_tracing_with_options,
};
pub use error::{SetError, SetResult};
pub use model::{
    DeviceChain, MainTrack, Mixer, MixerTrack, PrimaryTrack, PrimaryTrackKind, ReturnTrack,
    Routing, RoutingKind, Send, Sends, SendsPre, Track, TrackSendHolder,
};
pub use set::{LiveSet, TrackInsertion};
pub use tree::Element;
