/*!
 * Protocol layer — what travels from callers to the worker and onto the wire.
 *
 * - `envelope` — the pooled record envelope handed to the worker
 * - `marshal` — `[tag, time, record]` encoding (MessagePack or JSON)
 * - `constants` — default address, buffer sizes, and timings
 */

pub mod constants;
pub mod envelope;
pub mod marshal;
