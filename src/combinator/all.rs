//! All combinator: every input must fulfill.

use std::sync::{Arc, Mutex};

use crate::realm::Realm;
use crate::resolve::Step;
use crate::view::View;

struct Gather<T> {
    slots: Vec<Option<T>>,
    settled: usize,
}

/// Fulfills with the ordered results of every input once all have fulfilled;
/// rejects with the reason of the first input to reject.
///
/// Results are positionally aligned to the inputs regardless of settlement
/// order. Zero inputs fulfill immediately with an empty vec.
#[must_use]
pub fn all<T>(realm: &Realm, views: impl IntoIterator<Item = View<T>>) -> View<Vec<T>>
where
    T: Send + Clone + 'static,
{
    let views: Vec<View<T>> = views.into_iter().collect();
    let total = views.len();
    let aggregate = realm.resolver::<Vec<T>>();
    let out = aggregate.view();

    if total == 0 {
        aggregate.fulfill(Vec::new());
        return out;
    }

    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; total],
        settled: 0,
    }));

    for (index, view) in views.into_iter().enumerate() {
        let on_value = {
            let aggregate = aggregate.clone();
            let gather = Arc::clone(&gather);
            move |value: T| {
                let results = {
                    let mut board = gather.lock().expect("all gather lock poisoned");
                    board.slots[index] = Some(value);
                    board.settled += 1;
                    if board.settled == total {
                        Some(
                            board
                                .slots
                                .iter_mut()
                                .map(|slot| slot.take().expect("every input settled"))
                                .collect::<Vec<T>>(),
                        )
                    } else {
                        None
                    }
                };
                if let Some(results) = results {
                    aggregate.fulfill(results);
                }
                Step::Value(())
            }
        };
        let on_reason = {
            let aggregate = aggregate.clone();
            move |reason| {
                // First rejection wins; later settlements are no-ops.
                aggregate.reject(reason);
                Step::Value(())
            }
        };
        let _observer = view.then_else(on_value, on_reason);
    }

    out
}
