// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hermes wire messages.
//!
//! Hand-derived prost messages: the daemon and the tracker processes agree
//! on these by construction, there is no build-time protoc step.

use std::time::SystemTime;

use prost_types::Timestamp;

/// One per-frame detection result as produced by a tracker process.
///
/// `producer_uuid` identifies the tracker that produced the frame; the
/// merger erases it before emission. `width`/`height` are only meaningful on
/// the first frame of a session, `quads` is a per-frame diagnostic counter.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FrameReadout {
    /// Monotonically increasing frame identifier.
    #[prost(int64, tag = "1")]
    pub frame_id: i64,
    /// Wall-clock time of the readout.
    #[prost(message, optional, tag = "2")]
    pub time: Option<Timestamp>,
    /// Tracker-local timestamp in microseconds.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    /// Identity of the producing tracker. Empty once past the merger.
    #[prost(string, tag = "4")]
    pub producer_uuid: ::prost::alloc::string::String,
    #[prost(enumeration = "ReadoutError", tag = "5")]
    pub error: i32,
    /// Detected tags.
    #[prost(message, repeated, tag = "6")]
    pub tags: ::prost::alloc::vec::Vec<Tag>,
    /// Number of quads considered by the detector (diagnostic).
    #[prost(int32, tag = "7")]
    pub quads: i32,
    #[prost(int32, tag = "8")]
    pub width: i32,
    #[prost(int32, tag = "9")]
    pub height: i32,
}

impl FrameReadout {
    /// Wall-clock time as a [`SystemTime`], when set and representable.
    pub fn wall_time(&self) -> Option<SystemTime> {
        self.time.as_ref().and_then(|ts| SystemTime::try_from(ts.clone()).ok())
    }

    pub fn set_wall_time(&mut self, time: SystemTime) {
        self.time = Some(Timestamp::from(time));
    }
}

/// One detected tag.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tag {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(double, tag = "2")]
    pub x: f64,
    #[prost(double, tag = "3")]
    pub y: f64,
    #[prost(double, tag = "4")]
    pub theta: f64,
}

/// Per-frame error condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ReadoutError {
    NoError = 0,
    IlluminationError = 1,
    ProcessOverflow = 2,
    ProcessTimeout = 3,
}

/// Format version carried in every stream header.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Version {
    #[prost(int32, tag = "1")]
    pub major: i32,
    #[prost(int32, tag = "2")]
    pub minor: i32,
}

/// Kind of stream a header opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum HeaderType {
    File = 0,
    Network = 1,
}

/// First message of every file or subscriber stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(enumeration = "HeaderType", tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub version: Option<Version>,
    /// Frame dimensions, copied from the first readout (file streams only).
    #[prost(int32, tag = "3")]
    pub width: i32,
    #[prost(int32, tag = "4")]
    pub height: i32,
    /// Name of the previous segment in the chain, empty on the first.
    #[prost(string, tag = "5")]
    pub previous: ::prost::alloc::string::String,
}

impl Header {
    /// Header opening a file segment, with the current format version.
    pub fn for_file(width: i32, height: i32, previous: &str) -> Self {
        Self {
            r#type: HeaderType::File as i32,
            version: Some(Version { major: crate::MAJOR_FMT_VERSION, minor: crate::MINOR_FMT_VERSION }),
            width,
            height,
            previous: previous.to_string(),
        }
    }

    /// Header greeting a live subscriber.
    pub fn for_network() -> Self {
        Self {
            r#type: HeaderType::Network as i32,
            version: Some(Version { major: crate::MAJOR_FMT_VERSION, minor: crate::MINOR_FMT_VERSION }),
            width: 0,
            height: 0,
            previous: String::new(),
        }
    }
}

/// Last message of a file segment. `next` is empty on the final segment.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Footer {
    #[prost(string, tag = "1")]
    pub next: ::prost::alloc::string::String,
}

/// One record of a file segment: a readout or the closing footer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileLine {
    #[prost(message, optional, tag = "1")]
    pub readout: Option<FrameReadout>,
    #[prost(message, optional, tag = "2")]
    pub footer: Option<Footer>,
}

#[cfg(test)]
#[path = "readout_tests.rs"]
mod tests;
