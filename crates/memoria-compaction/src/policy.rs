use memoria_core::CompressionConfig;

/// Whether a history of `message_count` messages is due for compaction.
pub fn should_compact(message_count: usize, config: &CompressionConfig) -> bool {
    config.enabled && message_count > config.threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_strictly_above_threshold() {
        let config = CompressionConfig::default();
        assert!(!should_compact(0, &config));
        assert!(!should_compact(10, &config));
        assert!(should_compact(11, &config));
    }

    #[test]
    fn disabled_never_fires() {
        let config = CompressionConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!should_compact(1_000, &config));
    }
}
