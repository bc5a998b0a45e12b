//! Step stream reduction
//!
//! Typing into a field produces one input event per keystroke. Two passes
//! collapse those into a single `fill` per field:
//!
//! - the live pass ([`Reducer`]) runs as events arrive and holds at most one
//!   pending fill per selector until the next non-fill step
//! - the batch pass ([`collapse_fills`]) runs once at save time over the live
//!   output
//!
//! Both flush collapsed fills in ascending selector order. Only "last value per
//! selector wins" is guaranteed; arrival order between different fields that
//! were collapsed together is not kept.

use std::collections::BTreeMap;

use crate::recipe::Step;

/// Live deduplication state for one recording session
#[derive(Debug, Default)]
pub struct Reducer {
    pending: BTreeMap<String, Step>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one step into the stream.
    ///
    /// A fill replaces the pending fill for its selector and emits nothing.
    /// Any other step emits every pending fill followed by the step itself.
    pub fn submit(&mut self, step: Step) -> Option<Vec<Step>> {
        match step.fill_selector().map(str::to_owned) {
            Some(selector) => {
                self.pending.insert(selector, step);
                None
            }
            None => {
                let mut emitted = self.flush();
                emitted.push(step);
                Some(emitted)
            }
        }
    }

    /// Drain all pending fills
    pub fn flush(&mut self) -> Vec<Step> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

/// Collapse each run of consecutive fills to one fill per selector, keeping the
/// last value. Running it on its own output changes nothing.
pub fn collapse_fills(steps: Vec<Step>) -> Vec<Step> {
    let mut collapsed = Vec::with_capacity(steps.len());
    let mut last_fills: BTreeMap<String, Step> = BTreeMap::new();

    for step in steps {
        match step.fill_selector().map(str::to_owned) {
            Some(selector) => {
                last_fills.insert(selector, step);
            }
            None => {
                collapsed.extend(std::mem::take(&mut last_fills).into_values());
                collapsed.push(step);
            }
        }
    }

    collapsed.extend(last_fills.into_values());
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Action;
    use proptest::prelude::*;

    fn fill(selector: &str, value: &str) -> Step {
        Step {
            action: Action::Fill {
                selector: selector.to_string(),
                value: value.to_string(),
            },
            timestamp: None,
        }
    }

    fn click(selector: &str) -> Step {
        Step {
            action: Action::Click {
                selector: selector.to_string(),
                text: String::new(),
            },
            timestamp: None,
        }
    }

    fn navigate(url: &str) -> Step {
        Step {
            action: Action::Navigate {
                url: url.to_string(),
            },
            timestamp: None,
        }
    }

    fn prompt(message: &str) -> Step {
        Step {
            action: Action::Prompt {
                message: message.to_string(),
            },
            timestamp: None,
        }
    }

    fn live(steps: &[Step]) -> Vec<Step> {
        let mut reducer = Reducer::new();
        let mut output = Vec::new();
        for step in steps.iter().cloned() {
            if let Some(emitted) = reducer.submit(step) {
                output.extend(emitted);
            }
        }
        output.extend(reducer.flush());
        output
    }

    /// Live pass over a whole stream, then the batch pass
    fn reduce_stream(steps: Vec<Step>) -> Vec<Step> {
        collapse_fills(live(&steps))
    }

    fn has_adjacent_same_selector_fills(steps: &[Step]) -> bool {
        steps.windows(2).any(|pair| {
            matches!(
                (pair[0].fill_selector(), pair[1].fill_selector()),
                (Some(a), Some(b)) if a == b
            )
        })
    }

    /// Streams covering interleaved fields, repeated fields and every non-fill kind
    fn sample_streams() -> Vec<Vec<Step>> {
        vec![
            vec![],
            vec![fill("#x", "a")],
            vec![fill("#x", "a"), fill("#x", "b")],
            vec![fill("#b", "1"), fill("#a", "2"), fill("#b", "3")],
            vec![
                navigate("https://example.test"),
                fill("#q", "a"),
                fill("#q", "ab"),
                fill("#q", "abc"),
                click("#submit"),
            ],
            vec![
                fill("#x", "1"),
                prompt("check"),
                fill("#x", "2"),
                fill("#y", "3"),
                fill("#x", "4"),
                navigate("https://example.test/next"),
                fill("#y", "5"),
            ],
            vec![click("#a"), click("#a"), fill("#z", ""), click("#b")],
        ]
    }

    #[test]
    fn test_consecutive_fills_collapse_to_last_value() {
        let mut reducer = Reducer::new();
        assert!(reducer.submit(fill("#x", "a")).is_none());
        assert!(reducer.submit(fill("#x", "b")).is_none());

        assert_eq!(reducer.flush(), vec![fill("#x", "b")]);
        assert!(reducer.flush().is_empty());
    }

    #[test]
    fn test_non_fill_flushes_pending_before_itself() {
        let mut reducer = Reducer::new();
        reducer.submit(fill("#q", "abc"));
        let emitted = reducer.submit(click("#submit")).unwrap();
        assert_eq!(emitted, vec![fill("#q", "abc"), click("#submit")]);
        assert!(reducer.flush().is_empty());
    }

    #[test]
    fn test_prompt_is_never_collapsed() {
        let emitted = reduce_stream(vec![prompt("one"), prompt("one")]);
        assert_eq!(emitted, vec![prompt("one"), prompt("one")]);
    }

    #[test]
    fn test_empty_stream_is_empty() {
        assert!(reduce_stream(Vec::new()).is_empty());
        assert!(collapse_fills(Vec::new()).is_empty());
    }

    #[test]
    fn test_fill_only_stream_keeps_one_step_per_selector() {
        let stream = vec![
            fill("#c", "1"),
            fill("#a", "1"),
            fill("#b", "1"),
            fill("#a", "2"),
        ];
        let reduced = reduce_stream(stream);
        assert_eq!(reduced.len(), 3);
        assert_eq!(reduced, vec![fill("#a", "2"), fill("#b", "1"), fill("#c", "1")]);
    }

    #[test]
    fn test_batch_pass_on_live_output_equals_batch_pass_on_raw_stream() {
        for stream in sample_streams() {
            assert_eq!(collapse_fills(live(&stream)), collapse_fills(stream.clone()));
        }
    }

    #[test]
    fn test_batch_pass_is_idempotent() {
        for stream in sample_streams() {
            let once = collapse_fills(stream);
            assert_eq!(collapse_fills(once.clone()), once);
        }
    }

    #[test]
    fn test_no_adjacent_same_selector_fills() {
        for stream in sample_streams() {
            assert!(!has_adjacent_same_selector_fills(&reduce_stream(stream)));
        }
    }

    #[test]
    fn test_recording_example_reduces_to_three_steps() {
        let stream = vec![
            navigate("https://example.test"),
            fill("#q", "a"),
            fill("#q", "ab"),
            fill("#q", "abc"),
            click("#submit"),
        ];
        assert_eq!(
            reduce_stream(stream),
            vec![
                navigate("https://example.test"),
                fill("#q", "abc"),
                click("#submit")
            ]
        );
    }

    /// Fill-heavy steps over a few shared selectors
    fn any_step() -> impl Strategy<Value = Step> {
        let selector = prop::sample::select(vec!["#a", "#b", "#c"]);
        prop_oneof![
            4 => (selector.clone(), "[a-c]{0,3}").prop_map(|(s, v)| fill(s, &v)),
            1 => selector.prop_map(click),
            1 => "[a-z]{1,4}".prop_map(|p| navigate(&format!("https://example.test/{}", p))),
            1 => "[a-z ]{0,6}".prop_map(|m| prompt(&m)),
        ]
    }

    fn non_fills(steps: &[Step]) -> Vec<Step> {
        steps
            .iter()
            .filter(|s| s.fill_selector().is_none())
            .cloned()
            .collect()
    }

    fn any_stream() -> impl Strategy<Value = Vec<Step>> {
        prop::collection::vec(any_step(), 0..32)
    }

    proptest! {
        #[test]
        fn batch_of_live_output_matches_batch_of_stream(stream in any_stream()) {
            prop_assert_eq!(collapse_fills(live(&stream)), collapse_fills(stream.clone()));
        }

        #[test]
        fn batch_pass_is_idempotent_for_any_stream(stream in any_stream()) {
            let once = collapse_fills(stream);
            prop_assert_eq!(collapse_fills(once.clone()), once);
        }

        #[test]
        fn reduced_stream_never_repeats_a_fill_selector(stream in any_stream()) {
            prop_assert!(!has_adjacent_same_selector_fills(&reduce_stream(stream)));
        }

        #[test]
        fn non_fill_steps_survive_in_order(stream in any_stream()) {
            prop_assert_eq!(non_fills(&reduce_stream(stream.clone())), non_fills(&stream));
        }
    }
}
