//! Live room events and their running statistics
//!
//! A room is a shared, time-boxed quiz event joined via a short code.
//! This module carries the room record itself plus the volatile per-room
//! aggregates (participants joined, highest score, submission count) that
//! are broadcast as sessions complete. The aggregates are an online cache,
//! never the system of record: the authoritative report is always
//! recomputable from submitted sessions via [`build_report`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use crate::{
    ids::{ProfileId, QuizId, RoomId},
    room_code::RoomCode,
    scoring::round2,
};

/// A live, time-boxed shared quiz event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier of the room
    pub id: RoomId,
    /// The short code participants join with
    pub code: RoomCode,
    /// The quiz every session in this room attempts
    pub quiz_id: QuizId,
    /// When the room opens for joining
    pub start_time: SystemTime,
    /// When the room closes; joins at or past this instant are rejected
    pub end_time: SystemTime,
    /// Whether the room report is visible to participants
    pub show_report: bool,
}

impl Room {
    /// Whether the room is open at the given instant
    ///
    /// The window is half-open: `[start_time, end_time)`.
    pub fn is_open_at(&self, now: SystemTime) -> bool {
        now >= self.start_time && now < self.end_time
    }
}

/// Snapshot of a room's running statistics, broadcast to participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    /// Number of distinct student profiles that have joined
    pub students_joined: usize,
    /// Highest score among submissions so far
    pub highest_score: u32,
    /// Number of submissions so far
    pub total_submissions: u32,
}

/// Running statistics for one room
#[derive(Debug, Default)]
struct RoomStats {
    joined: HashSet<ProfileId>,
    highest_score: u32,
    total_submissions: u32,
}

impl RoomStats {
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            students_joined: self.joined.len(),
            highest_score: self.highest_score,
            total_submissions: self.total_submissions,
        }
    }
}

/// Volatile per-room statistics, keyed by room
///
/// The aggregator is process-scoped state owned by the lifecycle
/// controller: created with it, torn down with it, and reset on process
/// restart. Divergence after a restart is recovered through
/// [`build_report`] over the durable stores.
#[derive(Debug, Default)]
pub struct RoomAggregator {
    stats: HashMap<RoomId, RoomStats>,
}

impl RoomAggregator {
    /// Creates an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a participant joining a room and returns the updated
    /// snapshot for broadcast
    ///
    /// Joining is idempotent per profile: rejoining after a reconnect
    /// does not inflate the joined count.
    pub fn join(&mut self, room: RoomId, profile: ProfileId) -> RoomSnapshot {
        let stats = self.stats.entry(room).or_default();
        stats.joined.insert(profile);
        stats.snapshot()
    }

    /// Records a submission and returns the updated snapshot for
    /// broadcast
    ///
    /// Raises the highest score if exceeded. A room unseen so far gets
    /// fresh statistics; that happens after a process restart, when the
    /// joined count is lost until participants rejoin.
    pub fn record_submission(&mut self, room: RoomId, score: u32) -> RoomSnapshot {
        let stats = self.stats.entry(room).or_default();
        stats.total_submissions += 1;
        stats.highest_score = stats.highest_score.max(score);
        stats.snapshot()
    }

    /// Returns the current snapshot of a room, if tracked
    pub fn snapshot(&self, room: RoomId) -> Option<RoomSnapshot> {
        self.stats.get(&room).map(RoomStats::snapshot)
    }

    /// Drops the statistics of a room
    pub fn forget(&mut self, room: RoomId) {
        self.stats.remove(&room);
    }
}

/// Authoritative room report derived from submitted sessions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomReport {
    /// Number of submitted sessions in the room
    pub total_submissions: u32,
    /// Highest score among them
    pub highest_score: u32,
    /// Mean score, rounded to 2 decimal places
    pub average_score: f64,
    /// Shortest time taken among them, in whole seconds
    pub lowest_time: u64,
}

/// Derives a room report from (score, time taken) pairs of submitted
/// sessions
///
/// An empty input yields an all-zero report, matching the live
/// aggregator's view of a room with no submissions.
pub fn build_report(rows: &[(u32, u64)]) -> RoomReport {
    if rows.is_empty() {
        return RoomReport {
            total_submissions: 0,
            highest_score: 0,
            average_score: 0.0,
            lowest_time: 0,
        };
    }

    let total = rows.len() as u32;
    let sum: u64 = rows.iter().map(|(score, _)| u64::from(*score)).sum();

    RoomReport {
        total_submissions: total,
        highest_score: rows.iter().map(|(score, _)| *score).max().unwrap_or(0),
        average_score: round2(sum as f64 / f64::from(total)),
        lowest_time: rows.iter().map(|(_, time)| *time).min().unwrap_or(0),
    }
}
