use crate::twcloud::TwcloudConfig;
use crate::types::SourceMode;

/// Internal validation, called automatically during `TwcloudConfig::from_str` / `load`.
pub(crate) fn validate(config: &TwcloudConfig) -> anyhow::Result<()> {
    let capture = &config.capture;
    match capture.mode {
        SourceMode::File => {
            if capture.file.is_none() {
                anyhow::bail!("capture.file is required when capture.mode = \"file\"");
            }
        }
        SourceMode::Live => {
            let feed = capture
                .feed
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("capture.feed is required when capture.mode = \"live\""))?;
            if !feed.starts_with("tcp://") {
                anyhow::bail!("capture.feed must start with \"tcp://\", got {feed:?}");
            }
        }
    }
    if capture.channel_capacity == 0 {
        anyhow::bail!("capture.channel_capacity must be > 0");
    }

    if config.storage.batch_threshold == 0 {
        anyhow::bail!("storage.batch_threshold must be > 0");
    }
    if config.storage.queue_capacity == 0 {
        anyhow::bail!("storage.queue_capacity must be > 0");
    }
    if !is_valid_identifier(&config.storage.table) {
        anyhow::bail!(
            "storage.table: invalid table name {:?} (must match [A-Za-z_][A-Za-z0-9_]*)",
            config.storage.table,
        );
    }

    if config.assessment.window.is_zero() {
        anyhow::bail!("assessment.window must be > 0");
    }
    if config.assessment.window.as_duration().subsec_nanos() != 0 {
        anyhow::bail!(
            "assessment.window must be a whole number of seconds, got {}",
            config.assessment.window
        );
    }
    if config.assessment.word_number == 0 {
        anyhow::bail!("assessment.word_number must be > 0");
    }

    Ok(())
}

/// A valid identifier starts with ASCII letter or underscore, followed by
/// ASCII alphanumerics or underscores.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.bytes();
    match chars.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    chars.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
