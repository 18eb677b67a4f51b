use proptest::prelude::*;
use questbuddy::domain::models::completion_fraction;
use questbuddy::domain::models::UserProgress;
use questbuddy::infrastructure::templates::default_catalog;

proptest! {
    /// Completion stays within [0, 1] and is rounded to two decimals.
    #[test]
    fn prop_completion_bounded_and_rounded(total in 1usize..50, index_seed in 0usize..50) {
        let index = index_seed % total;
        let fraction = completion_fraction(index, total);

        prop_assert!(fraction > 0.0);
        prop_assert!(fraction <= 1.0);
        let cents = fraction * 100.0;
        prop_assert!((cents - cents.round()).abs() < 1e-9);
    }

    /// The last task of a quest always reports full completion.
    #[test]
    fn prop_last_task_is_complete(total in 1usize..50) {
        prop_assert!((completion_fraction(total - 1, total) - 1.0).abs() < f64::EPSILON);
    }

    /// Completion never decreases while walking a quest in order.
    #[test]
    fn prop_completion_monotonic(total in 1usize..50) {
        let fractions: Vec<f64> = (0..total).map(|i| completion_fraction(i, total)).collect();
        prop_assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Rewards accumulate exactly once per task in the guarded mode, and
    /// the level follows XP.
    #[test]
    fn prop_rewards_counted_once(repeats in proptest::collection::vec(0usize..5, 1..20)) {
        let catalog = default_catalog().unwrap();
        let quest = catalog.quests[0].clone();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &quest.id).unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut expected_points = 0;
        for i in repeats {
            let task = &quest.tasks[i];
            progress.complete_task(&catalog, &quest.id, &task.id, false).unwrap();
            if seen.insert(i) {
                expected_points += task.points;
            }
        }

        prop_assert_eq!(progress.points, expected_points);
        prop_assert_eq!(progress.level(), progress.xp / 100 + 1);
    }
}

#[test]
fn test_completion_examples() {
    assert!((completion_fraction(0, 3) - 0.33).abs() < f64::EPSILON);
    assert!((completion_fraction(1, 3) - 0.67).abs() < f64::EPSILON);
    assert!((completion_fraction(2, 5) - 0.6).abs() < f64::EPSILON);
    assert!(completion_fraction(0, 0).abs() < f64::EPSILON);
}
