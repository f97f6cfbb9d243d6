//! Race combinator: first settlement of either kind wins.

use crate::realm::Realm;
use crate::resolve::Step;
use crate::view::View;

/// Settles with the outcome of whichever input settles first, fulfillment or
/// rejection alike. Later settlements of other inputs are discarded by the
/// winner cell's once-only settlement.
///
/// A race over zero inputs stays pending forever.
#[must_use]
pub fn race<T>(realm: &Realm, views: impl IntoIterator<Item = View<T>>) -> View<T>
where
    T: Send + Clone + 'static,
{
    let winner = realm.resolver::<T>();
    let out = winner.view();

    for view in views {
        let on_value = {
            let winner = winner.clone();
            move |value| {
                winner.fulfill(value);
                Step::Value(())
            }
        };
        let on_reason = {
            let winner = winner.clone();
            move |reason| {
                winner.reject(reason);
                Step::Value(())
            }
        };
        let _observer = view.then_else(on_value, on_reason);
    }

    out
}
