/**
 * Worker configuration, assembled from the options passed to `Client::new`.
 *
 * Post-only options (`timestamp`, `sync_append`) are ignored here.
 * `subsecond` is read here as the client-wide default; a post can still
 * override it per record.
 */
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::option::Opt;
use crate::protocol::constants::{
    DEFAULT_ADDRESS, DEFAULT_BUFFER_LIMIT, DEFAULT_NETWORK, DEFAULT_WRITE_THRESHOLD,
};
use crate::protocol::marshal::Marshaler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            other => Err(Error::InvalidOption {
                name: "network",
                reason: format!("unsupported network type {other:?} (expected \"tcp\" or \"unix\")"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    pub network: Network,
    pub address: String,
    pub marshaler: Marshaler,
    pub tag_prefix: Option<String>,
    pub buffer_limit: usize,
    pub write_threshold: usize,
    pub subsecond: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            address: DEFAULT_ADDRESS.to_string(),
            marshaler: Marshaler::default(),
            tag_prefix: None,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            write_threshold: DEFAULT_WRITE_THRESHOLD,
            subsecond: false,
        }
    }
}

impl WorkerConfig {
    /**
     * Builds a configuration from construction options, applying them in
     * order (a later option of the same name wins) and then validating the
     * combination.
     *
     * # Arguments
     * * `options` - The options given to `Client::new`
     *
     * # Returns
     * The configuration, or `InvalidOption` naming the first offending
     * option: an unknown network, an empty address, a zero buffer limit, or
     * a write threshold above the buffer limit.
     */
    pub fn from_options(options: &[Opt]) -> Result<Self> {
        let mut network = DEFAULT_NETWORK.to_string();
        let mut config = Self::default();

        for option in options {
            match option {
                Opt::Network(value) => network.clone_from(value),
                Opt::Address(value) => config.address.clone_from(value),
                Opt::Marshaler(value) => config.marshaler = *value,
                Opt::TagPrefix(value) => config.tag_prefix = Some(value.clone()),
                Opt::BufferLimit(value) => config.buffer_limit = *value,
                Opt::WriteThreshold(value) => config.write_threshold = *value,
                Opt::Subsecond(value) => config.subsecond = *value,
                Opt::Timestamp(_) | Opt::SyncAppend(_) => {}
            }
        }

        config.network = network.parse()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::InvalidOption {
                name: "address",
                reason: "address must not be empty".into(),
            });
        }
        if self.buffer_limit == 0 {
            return Err(Error::InvalidOption {
                name: "buffer_limit",
                reason: "buffer limit must be greater than zero".into(),
            });
        }
        if self.write_threshold > self.buffer_limit {
            return Err(Error::InvalidOption {
                name: "write_threshold",
                reason: format!(
                    "write threshold ({}) exceeds buffer limit ({})",
                    self.write_threshold, self.buffer_limit
                ),
            });
        }
        Ok(())
    }

    /**
     * Joins the configured prefix onto `tag` as `prefix.tag`.
     *
     * # Arguments
     * * `tag` - Tag as posted
     * * `out` - Scratch string, overwritten when a prefix is set
     *
     * # Returns
     * `out` holding the joined tag, or `tag` itself when there is no
     * (or an empty) prefix.
     */
    pub fn full_tag<'a>(&self, tag: &'a str, out: &'a mut String) -> &'a str {
        match &self.tag_prefix {
            Some(prefix) if !prefix.is_empty() => {
                out.clear();
                out.push_str(prefix);
                out.push('.');
                out.push_str(tag);
                out.as_str()
            }
            _ => tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use rstest::rstest;

    use super::*;
    use crate::option::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_options(&[]).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.network, Network::Tcp);
        assert_eq!(config.address, "127.0.0.1:24224");
        assert_eq!(config.marshaler, Marshaler::Msgpack);
        assert_eq!(config.buffer_limit, 8 * 1024 * 1024);
        assert_eq!(config.write_threshold, 8 * 1024);
        assert!(!config.subsecond);
    }

    #[test]
    fn test_options_are_applied_and_post_options_ignored() {
        let config = WorkerConfig::from_options(&[
            with_network("unix"),
            with_address("/var/run/fluent.sock"),
            with_json_marshaler(),
            with_tag_prefix("app"),
            with_buffer_limit(4096),
            with_write_threshold(128),
            with_subsecond(true),
            with_timestamp(UNIX_EPOCH),
            with_sync_append(true),
        ])
        .unwrap();

        assert_eq!(config.network, Network::Unix);
        assert_eq!(config.address, "/var/run/fluent.sock");
        assert_eq!(config.marshaler, Marshaler::Json);
        assert_eq!(config.tag_prefix.as_deref(), Some("app"));
        assert_eq!(config.buffer_limit, 4096);
        assert_eq!(config.write_threshold, 128);
        assert!(config.subsecond);
    }

    #[test]
    fn test_later_option_wins() {
        let config =
            WorkerConfig::from_options(&[with_json_marshaler(), with_msgpack_marshaler()]).unwrap();
        assert_eq!(config.marshaler, Marshaler::Msgpack);
    }

    #[rstest]
    #[case::unknown_network(vec![with_network("udp")], "network")]
    #[case::empty_address(vec![with_address("")], "address")]
    #[case::zero_limit(vec![with_buffer_limit(0), with_write_threshold(0)], "buffer_limit")]
    #[case::threshold_above_limit(vec![with_buffer_limit(10), with_write_threshold(11)], "write_threshold")]
    fn test_invalid_combinations(#[case] options: Vec<Opt>, #[case] expected: &str) {
        match WorkerConfig::from_options(&options) {
            Err(Error::InvalidOption { name, .. }) => assert_eq!(name, expected),
            other => panic!("expected InvalidOption for {expected}, got {other:?}"),
        }
    }

    #[test]
    fn test_full_tag() {
        let mut scratch = String::new();
        let plain = WorkerConfig::default();
        assert_eq!(plain.full_tag("web.access", &mut scratch), "web.access");

        let prefixed = WorkerConfig {
            tag_prefix: Some("app".into()),
            ..WorkerConfig::default()
        };
        assert_eq!(prefixed.full_tag("web.access", &mut scratch), "app.web.access");
    }
}
