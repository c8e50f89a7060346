// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint domain type, name format, and the state-transition edge set.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Checkpoint lifecycle state. Terminal states are `Reset`, `Deleted`, `GcReset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Created,
    FinalizeQueued,
    Reset,
    Deleted,
    GcReset,
}

crate::simple_display! {
    CheckpointState {
        Created => "created",
        FinalizeQueued => "finalize_queued",
        Reset => "reset",
        Deleted => "deleted",
        GcReset => "gc_reset",
    }
}

impl std::str::FromStr for CheckpointState {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "finalize_queued" => Ok(Self::FinalizeQueued),
            "reset" => Ok(Self::Reset),
            "deleted" => Ok(Self::Deleted),
            "gc_reset" => Ok(Self::GcReset),
            other => Err(CheckpointError::InvalidName(other.to_string())),
        }
    }
}

impl CheckpointState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reset | Self::Deleted | Self::GcReset)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Created | Self::FinalizeQueued)
    }

    /// The permitted edge set from data model §3.2.2. GC writes `GcReset`
    /// directly from `Created`, bypassing `FinalizeQueued`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::FinalizeQueued)
                | (Self::Created, Self::GcReset)
                | (Self::FinalizeQueued, Self::Reset)
                | (Self::FinalizeQueued, Self::Deleted)
        )
    }
}

/// Outcome recorded on a finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    Success,
    Failure,
    Canceled,
}

crate::simple_display! {
    FinalizeStatus {
        Success => "success",
        Failure => "failure",
        Canceled => "canceled",
    }
}

impl std::str::FromStr for FinalizeStatus {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "canceled" => Ok(Self::Canceled),
            other => Err(CheckpointError::InvalidFinalizeStatus(other.to_string())),
        }
    }
}

/// Which completion-detection path landed a finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeSource {
    Hook,
    Poller,
    Webhook,
    Agent,
    Gc,
}

crate::simple_display! {
    FinalizeSource {
        Hook => "hook",
        Poller => "poller",
        Webhook => "webhook",
        Agent => "agent",
        Gc => "gc",
    }
}

impl std::str::FromStr for FinalizeSource {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hook" => Ok(Self::Hook),
            "poller" => Ok(Self::Poller),
            "webhook" => Ok(Self::Webhook),
            "agent" => Ok(Self::Agent),
            other => Err(CheckpointError::InvalidFinalizeSource(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("job id {0:?} contains characters outside [A-Za-z0-9_.-]")]
    InvalidJobId(String),
    #[error("checkpoint name {0:?} does not match ^job-[A-Za-z0-9_.-]+-[0-9]+-[0-9a-f]{{8}}$")]
    InvalidName(String),
    #[error("invalid finalize status {0:?}")]
    InvalidFinalizeStatus(String),
    #[error("invalid finalize source {0:?}")]
    InvalidFinalizeSource(String),
}

/// Allowed character class for a CI job id (B1: `^[A-Za-z0-9_.-]+$`).
pub fn valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Builds `job-{job_id}-{unix_ts}-{hex8}`. Caller supplies the job id (already
/// validated via [`valid_job_id`]), the current unix timestamp, and 4 random
/// bytes for retry collision avoidance (B4).
pub fn checkpoint_name(job_id: &str, unix_ts: u64, random_bytes: [u8; 4]) -> String {
    format!("job-{job_id}-{unix_ts}-{}", hex8(random_bytes))
}

fn hex8(bytes: [u8; 4]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A parsed, validated checkpoint name (§6.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCheckpointName {
    pub job_id: String,
    pub unix_ts: u64,
    pub random_hex: String,
}

/// Validates and decomposes a checkpoint name against
/// `^job-[A-Za-z0-9_.-]+-[0-9]+-[0-9a-f]{8}$`.
///
/// The job-id component's character class overlaps with digits and hyphens,
/// so the three components are recovered right-to-left: the trailing 8 hex
/// digits, then the unix timestamp, then whatever remains after the `job-`
/// literal is the job id. This matches what a backtracking regex engine
/// converges on for names generated by [`checkpoint_name`].
pub fn parse_checkpoint_name(name: &str) -> Result<ParsedCheckpointName, CheckpointError> {
    let err = || CheckpointError::InvalidName(name.to_string());

    let rest = name.strip_prefix("job-").ok_or_else(err)?;
    let mut parts = rest.rsplitn(3, '-');
    let hex = parts.next().ok_or_else(err)?;
    let ts = parts.next().ok_or_else(err)?;
    let job_id = parts.next().ok_or_else(err)?;

    if hex.len() != 8 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(err());
    }
    if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    if !valid_job_id(job_id) {
        return Err(err());
    }

    let unix_ts: u64 = ts.parse().map_err(|_| err())?;
    Ok(ParsedCheckpointName {
        job_id: job_id.to_string(),
        unix_ts,
        random_hex: hex.to_string(),
    })
}

/// A per-job lifecycle record (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub runner_id: String,
    pub job_id: String,
    pub state: CheckpointState,
    pub finalize_status: Option<FinalizeStatus>,
    pub finalize_source: Option<FinalizeSource>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub finalized_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct CheckpointBuilder => Checkpoint {
        into { name: String = "job-demo-1000-aaaaaaaa" }
        into { runner_id: String = "r1" }
        into { job_id: String = "demo" }
        set { state: CheckpointState = CheckpointState::Created }
        option { finalize_status: FinalizeStatus = None }
        option { finalize_source: FinalizeSource = None }
        computed { created_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now() }
        computed { finalized_at: Option<chrono::DateTime<chrono::Utc>> = None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_job_id_accepts_allowed_class() {
        assert!(valid_job_id("abc-123_def.456"));
    }

    #[test]
    fn valid_job_id_rejects_other_characters() {
        assert!(!valid_job_id("abc/123"));
        assert!(!valid_job_id(""));
    }

    #[test]
    fn checkpoint_name_round_trips_through_parse() {
        let name = checkpoint_name("100", 1000, [0xaa, 0xaa, 0xaa, 0xaa]);
        assert_eq!(name, "job-100-1000-aaaaaaaa");
        let parsed = parse_checkpoint_name(&name).unwrap();
        assert_eq!(parsed.job_id, "100");
        assert_eq!(parsed.unix_ts, 1000);
        assert_eq!(parsed.random_hex, "aaaaaaaa");
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert!(parse_checkpoint_name("100-1000-aaaaaaaa").is_err());
    }

    #[test]
    fn parse_rejects_short_hex_suffix() {
        assert!(parse_checkpoint_name("job-100-1000-aaa").is_err());
    }

    #[test]
    fn state_from_str_round_trips_display() {
        use std::str::FromStr;
        for s in [
            CheckpointState::Created,
            CheckpointState::FinalizeQueued,
            CheckpointState::Reset,
            CheckpointState::Deleted,
            CheckpointState::GcReset,
        ] {
            assert_eq!(CheckpointState::from_str(&s.to_string()), Ok(s));
        }
    }

    #[test]
    fn transition_edge_set_matches_spec() {
        use CheckpointState::*;
        assert!(Created.can_transition_to(FinalizeQueued));
        assert!(Created.can_transition_to(GcReset));
        assert!(FinalizeQueued.can_transition_to(Reset));
        assert!(FinalizeQueued.can_transition_to(Deleted));
        assert!(!Created.can_transition_to(Reset));
        assert!(!Reset.can_transition_to(Deleted));
        assert!(!Deleted.can_transition_to(Created));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for s in [CheckpointState::Reset, CheckpointState::Deleted, CheckpointState::GcReset] {
            for t in [
                CheckpointState::Created,
                CheckpointState::FinalizeQueued,
                CheckpointState::Reset,
                CheckpointState::Deleted,
                CheckpointState::GcReset,
            ] {
                assert!(!s.can_transition_to(t));
            }
        }
    }
}
