use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SkipReason;
use crate::history::History;
use crate::matches::TeamId;
use crate::standings::PositionLog;

/// Days since `team` last played before `date`; 0 for a first appearance.
pub fn rest_days(history: &History<'_>, team: &TeamId, date: NaiveDate) -> i64 {
    history
        .last_before(team, date)
        .map_or(0, |prev| (date - prev.date).num_days())
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleStrength {
    pub opponents: u32,
    pub avg_opponent_position: f64,
    pub avg_opponent_points: f64,
    /// Mean of `field + 1 - opponent position` over the meetings; higher
    /// means stronger opposition whatever the size of the league.
    pub index: f64,
}

/// Average standing of the opponents `team` met in its last `n` matches,
/// read from the pre-match snapshots logged when each meeting was played.
pub fn strength_of_schedule(
    history: &History<'_>,
    positions: &PositionLog,
    team: &TeamId,
    date: NaiveDate,
    n: usize,
) -> Result<ScheduleStrength, SkipReason> {
    let mut opponents = 0u32;
    let mut position_sum = 0u64;
    let mut points_sum = 0u64;
    let mut index_sum = 0i64;
    for (slot, m) in history.last_n_slots(team, date, n) {
        let snapshot = positions
            .get(slot)
            .ok_or(SkipReason::MissingSnapshot { match_id: m.id })?;
        let Some(opponent) = snapshot.opponent_of(m, team) else {
            continue;
        };
        opponents += 1;
        position_sum += u64::from(opponent.position);
        points_sum += u64::from(opponent.points);
        index_sum += i64::from(snapshot.field) + 1 - i64::from(opponent.position);
    }
    if opponents == 0 {
        return Ok(ScheduleStrength::default());
    }
    Ok(ScheduleStrength {
        opponents,
        avg_opponent_position: position_sum as f64 / f64::from(opponents),
        avg_opponent_points: points_sum as f64 / f64::from(opponents),
        index: index_sum as f64 / f64::from(opponents),
    })
}
