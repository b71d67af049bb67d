use crate::clock::day_boundary;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::rank::RankTable;
use chrono::{DateTime, FixedOffset, Utc};

/// Whether today's diamonds are still uncollected.
pub fn can_collect(ledger: &Ledger, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    ledger.last_sp_collect < day_boundary(now, offset)
}

/// Credit the daily diamond reward at most once per local day.
///
/// Returns the new diamond total. A second call on the same day fails with
/// [`LedgerError::AlreadyCollected`] and leaves the ledger untouched.
pub fn collect_diamonds(
    ledger: &mut Ledger,
    now: DateTime<Utc>,
    offset: FixedOffset,
    reward: u64,
    table: &RankTable,
) -> Result<u64, LedgerError> {
    if !can_collect(ledger, now, offset) {
        return Err(LedgerError::AlreadyCollected(
            "Error: Daily 💎 already collected!".to_string(),
        ));
    }

    let sp_points = ledger.sp_points.saturating_add(reward);
    let rank = table.resolve(sp_points)?.clone();
    ledger.sp_points = sp_points;
    ledger.last_sp_collect = now.timestamp();
    ledger.rank = rank;
    Ok(sp_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DAILY_CHECKIN_REWARD;
    use crate::ledger::test_ledger;
    use chrono::{Duration, TimeZone};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[test]
    fn collects_once_then_reports_already_collected() {
        let table = RankTable::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 4, 12, 0, 0).unwrap();
        let mut ledger = test_ledger("alice");
        ledger.last_sp_collect = (now - Duration::days(1)).timestamp();

        let total =
            collect_diamonds(&mut ledger, now, ist(), DAILY_CHECKIN_REWARD, &table).unwrap();
        assert_eq!(total, DAILY_CHECKIN_REWARD);
        assert_eq!(ledger.last_sp_collect(), now.timestamp());

        let before = ledger.clone();
        let later = now + Duration::minutes(5);
        let err =
            collect_diamonds(&mut ledger, later, ist(), DAILY_CHECKIN_REWARD, &table).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCollected(_)));
        assert_eq!(ledger, before);
    }

    #[test]
    fn collection_reopens_after_local_midnight() {
        let table = RankTable::default();
        // 18:00 UTC is 23:30 IST; 19:00 UTC is 00:30 IST the next day.
        let evening = Utc.with_ymd_and_hms(2026, 7, 4, 18, 0, 0).unwrap();
        let after_midnight = Utc.with_ymd_and_hms(2026, 7, 4, 19, 0, 0).unwrap();
        let mut ledger = test_ledger("alice");

        collect_diamonds(&mut ledger, evening, ist(), 10, &table).unwrap();
        assert!(!can_collect(&ledger, evening, ist()));
        assert!(can_collect(&ledger, after_midnight, ist()));
        assert_eq!(
            collect_diamonds(&mut ledger, after_midnight, ist(), 10, &table).unwrap(),
            20
        );
    }

    #[test]
    fn crossing_a_threshold_updates_rank() {
        let table = RankTable::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 4, 12, 0, 0).unwrap();
        let mut ledger = test_ledger("alice");
        ledger.sp_points = 45;

        collect_diamonds(&mut ledger, now, ist(), 10, &table).unwrap();
        assert_eq!(ledger.rank().title, "Trainee Coder 🌱");
    }
}
