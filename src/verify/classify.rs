//! Maps a raw failure message to an [`ErrorCategory`].
//!
//! Cues are checked as case-sensitive substrings, in priority order:
//!
//! | Priority | Cues | Category |
//! |----------|------|----------|
//! | 1 | `password`, `encrypted`, `authentication` | `encrypted` |
//! | 2 | `Internal Server Error`, `524`, `timeout`, `Cloudflare` | `server_issue` |
//! | 3 | `not found`, `404`, `<none>` | `not_found` |
//! | 4 | anything else | `unknown` |

use crate::record::ErrorCategory;

const ENCRYPTED_CUES: &[&str] = &["password", "encrypted", "authentication"];
const SERVER_ISSUE_CUES: &[&str] = &["Internal Server Error", "524", "timeout", "Cloudflare"];
const NOT_FOUND_CUES: &[&str] = &["not found", "404", "<none>"];

/// Classifies a failure message. Deterministic and total.
#[must_use]
pub fn classify(message: &str) -> ErrorCategory {
    let matches = |cues: &[&str]| cues.iter().any(|cue| message.contains(cue));

    if matches(ENCRYPTED_CUES) {
        ErrorCategory::Encrypted
    } else if matches(SERVER_ISSUE_CUES) {
        ErrorCategory::ServerIssue
    } else if matches(NOT_FOUND_CUES) {
        ErrorCategory::NotFound
    } else {
        ErrorCategory::Unknown
    }
}
