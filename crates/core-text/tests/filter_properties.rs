//! Property tests for the token filter and the input line.

use core_text::{InputLine, match_indices};
use proptest::prelude::*;

proptest! {
    // Results are strictly ascending and every result contains every token.
    #[test]
    fn results_are_ordered_and_complete(
        items in prop::collection::vec("[a-cA-C ]{0,8}", 0..40),
        query in "[a-c ]{0,5}",
    ) {
        let got = match_indices(&items, &query);
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
        let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        for &i in &got {
            let lowered = items[i].to_lowercase();
            prop_assert!(tokens.iter().all(|t| lowered.contains(t.as_str())));
        }
        // Nothing that matches is left out.
        for (i, item) in items.iter().enumerate() {
            let lowered = item.to_lowercase();
            if tokens.iter().all(|t| lowered.contains(t.as_str())) {
                prop_assert!(got.contains(&i));
            }
        }
    }

    #[test]
    fn empty_query_returns_everything(items in prop::collection::vec(".{0,6}", 0..30)) {
        let got = match_indices(&items, "");
        prop_assert_eq!(got, (0..items.len()).collect::<Vec<_>>());
    }

    // Arbitrary edit sequences keep the caret inside the text.
    #[test]
    fn caret_stays_in_bounds(ops in prop::collection::vec(0u8..6, 0..60), ascii in any::<bool>()) {
        let mut line = InputLine::new("", "", ascii);
        for op in ops {
            match op {
                0 => { line.insert('a'); }
                1 => { line.insert('é'); }
                2 => line.backspace(),
                3 => line.move_left(),
                4 => line.move_right(),
                _ => line.clear(),
            }
            prop_assert!(line.caret_pos() <= line.text().chars().count());
            if ascii {
                prop_assert!(line.text().is_ascii());
            }
        }
    }
}
