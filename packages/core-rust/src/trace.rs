//! Renders error chains into the ordered trace lines of an `ErrorRecord`.

use std::backtrace::BacktraceStatus;

/// Formats an error as trace lines.
///
/// The first line is the error itself, followed by one `caused by:` line per
/// source. Backtrace frames are appended only when capture was enabled via
/// `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`.
#[must_use]
pub fn render(err: &anyhow::Error) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    lines.extend(err.chain().skip(1).map(|cause| format!("caused by: {cause}")));

    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.push("stack backtrace:".to_string());
        lines.extend(
            backtrace
                .to_string()
                .lines()
                .map(|line| line.trim_end().to_string()),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn single_error_renders_its_message_first() {
        let lines = render(&anyhow!("oh no!"));
        assert_eq!(lines[0], "oh no!");
    }

    #[test]
    fn sources_follow_in_order() {
        let err = anyhow!("disk full")
            .context("write failed")
            .context("handler failed");
        let lines = render(&err);
        assert_eq!(lines[0], "handler failed");
        assert_eq!(lines[1], "caused by: write failed");
        assert_eq!(lines[2], "caused by: disk full");
    }
}
