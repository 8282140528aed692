#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use liga_features::{MatchLedger, MatchRecord};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

/// Double round robin over `teams` teams for each season in `seasons`,
/// one matchday per week with all fixtures of a matchday on the same date.
pub fn synthetic_league(teams: usize, seasons: &[i32], seed: u64) -> Vec<MatchRecord> {
    assert!(teams >= 2 && teams % 2 == 0);
    let mut rng = StdRng::seed_from_u64(seed);
    let names: Vec<String> = (0..teams).map(|i| format!("Team {i:02}")).collect();
    let mut out = Vec::new();
    let mut next_id = 1u64;

    for &year in seasons {
        let start = d(year, 8, 15);
        let rounds = teams - 1;
        for leg in 0..2 {
            for round in 0..rounds {
                let matchday = leg * rounds + round;
                let date = start + Duration::days(7 * matchday as i64);
                for k in 0..teams / 2 {
                    let (a, b) = if k == 0 {
                        (teams - 1, round)
                    } else {
                        ((round + k) % rounds, (round + rounds - k) % rounds)
                    };
                    let (home, away) = if (leg + round + k) % 2 == 0 { (a, b) } else { (b, a) };
                    out.push(
                        MatchRecord::new(
                            date,
                            names[home].as_str(),
                            names[away].as_str(),
                            rng.gen_range(0..5),
                            rng.gen_range(0..4),
                        )
                        .with_id(next_id)
                        .with_matchday(matchday as u32 + 1),
                    );
                    next_id += 1;
                }
            }
        }
    }
    out
}

pub fn ledger_of(records: impl IntoIterator<Item = MatchRecord>) -> MatchLedger {
    let mut ledger = MatchLedger::new();
    for record in records {
        ledger.append(record).expect("synthetic match accepted");
    }
    ledger
}
