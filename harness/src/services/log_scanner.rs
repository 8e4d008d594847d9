//! Startup log scanning for dev server diagnostic output
//!
//! The dev server announces its dynamically bound endpoints and its
//! readiness on stderr. The matcher consumes that stream line by line,
//! echoes every line for operator visibility, and extracts the facts the
//! supervisor needs: the webapp module URL, the admin server URL, and the
//! first served warmup probe.

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

use crate::error::{HarnessError, HarnessResult};

/// Facts accumulated from the diagnostic stream up to the point the scan
/// stopped (ready line seen, or stream closed).
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// URL the webapp module is serving on
    pub base_url: Option<Url>,

    /// URL of the admin control server
    pub admin_url: Option<Url>,

    /// Whether the first warmup probe was observed before the stream ended
    pub saw_ready: bool,
}

/// Line rules applied to the dev server's diagnostic output
pub struct StartupLogMatcher {
    module_rule: Regex,
    admin_rule: Regex,
    ready_rule: Regex,
}

impl StartupLogMatcher {
    /// Create a matcher with the dev server's three recognized line shapes
    pub fn new() -> Self {
        Self {
            module_rule: Regex::new(r#"Starting module "default" running at: (\S+)"#).unwrap(),
            admin_rule: Regex::new(r"Starting admin server at: (\S+)").unwrap(),
            ready_rule: Regex::new(r"GET /_ah/warmup").unwrap(),
        }
    }

    /// Scans the stream until the ready line appears or the stream closes.
    ///
    /// Lines after the ready signal are left unread. A stream that closes
    /// early yields whatever was captured so far with no error; judging
    /// whether that is enough belongs to the caller. A captured URL that
    /// fails to parse aborts the scan.
    pub async fn scan<R>(&self, reader: R) -> HarnessResult<ScanOutcome>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut outcome = ScanOutcome::default();

        while let Some(line) = lines.next_line().await? {
            // Pass the server's own output through to the harness's stderr.
            eprintln!("{line}");

            if self.ready_rule.is_match(&line) {
                outcome.saw_ready = true;
                return Ok(outcome);
            }
            if let Some(captures) = self.module_rule.captures(&line) {
                outcome.base_url = Some(parse_captured_url(&captures[1])?);
            }
            if let Some(captures) = self.admin_rule.captures(&line) {
                outcome.admin_url = Some(parse_captured_url(&captures[1])?);
            }
        }

        Ok(outcome)
    }
}

impl Default for StartupLogMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_captured_url(raw: &str) -> HarnessResult<Url> {
    Url::parse(raw).map_err(|source| HarnessError::UrlParse {
        url: raw.to_string(),
        source,
    })
}
