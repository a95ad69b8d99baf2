/**
 * Encoding of a single forward-protocol entry, `[tag, time, record]`.
 *
 * fluentd's forward input accepts both MessagePack and JSON arrays of this
 * shape. MessagePack records are written with struct fields as map keys so
 * the server sees named fields rather than positional arrays.
 */
use serde::{Serialize, Serializer};

use crate::error::Result;

/// MessagePack extension type fluentd reserves for `EventTime`.
const EVENT_TIME_EXT: i8 = 0;

// ---------------------------------------------------------------------------
// EventTime
// ---------------------------------------------------------------------------

/**
 * A record time with nanosecond precision.
 *
 * Serialized with `rmp-serde` as the 8-byte extension fluentd expects:
 * big-endian `u32` seconds followed by big-endian `u32` nanoseconds.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventTime {
    pub secs: u32,
    pub nanos: u32,
}

impl EventTime {
    /**
     * Builds an `EventTime` from unix seconds and a nanosecond part.
     *
     * # Arguments
     * * `secs` - Unix seconds (floor of the instant)
     * * `nanos` - Nanoseconds past `secs`, below one billion
     *
     * # Returns
     * `None` when `secs` does not fit the extension's unsigned 32-bit field
     * (before 1970 or after 2106).
     */
    pub fn new(secs: i64, nanos: u32) -> Option<Self> {
        let secs = u32::try_from(secs).ok()?;
        Some(Self { secs, nanos })
    }

    fn to_bytes(self) -> [u8; 8] {
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&self.secs.to_be_bytes());
        data[4..].copy_from_slice(&self.nanos.to_be_bytes());
        data
    }
}

/// Extension payload; serialized as raw bytes, not as a sequence.
struct ExtData([u8; 8]);

impl Serialize for ExtData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(
            rmp_serde::MSGPACK_EXT_STRUCT_NAME,
            &(EVENT_TIME_EXT, ExtData(self.to_bytes())),
        )
    }
}

// ---------------------------------------------------------------------------
// Marshaler
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Marshaler {
    #[default]
    Msgpack,
    Json,
}

impl Marshaler {
    /**
     * Appends the encoded entry to `buf`.
     *
     * On error `buf` may hold a partial entry; callers encode into a
     * scratch buffer and only copy complete entries onward.
     *
     * # Arguments
     * * `buf` - Output buffer; the entry is appended to its current contents
     * * `tag` - Full tag, prefix already applied
     * * `time` - Unix seconds
     * * `nanos` - Nanoseconds past `time` when the entry should carry an
     *   `EventTime`, `None` for whole seconds. Ignored by JSON, and when
     *   `time` is outside the `EventTime` range.
     * * `record` - The record to serialize
     *
     * # Returns
     * `Ok(())`, or the serializer's error.
     */
    pub fn encode<R: Serialize>(
        self,
        buf: &mut Vec<u8>,
        tag: &str,
        time: i64,
        nanos: Option<u32>,
        record: &R,
    ) -> Result<()> {
        match self {
            Marshaler::Msgpack => {
                let mut serializer = rmp_serde::Serializer::new(buf).with_struct_map();
                match nanos.and_then(|nanos| EventTime::new(time, nanos)) {
                    Some(event_time) => (tag, event_time, record).serialize(&mut serializer)?,
                    None => (tag, time, record).serialize(&mut serializer)?,
                }
            }
            Marshaler::Json => serde_json::to_writer(buf, &(tag, time, record))?,
        }
        Ok(())
    }
}
