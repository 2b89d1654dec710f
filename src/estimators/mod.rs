/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Cardinality estimators: implementations populate a `JoinOrder`'s
//! `cardinality`/`support`/`epsilon`/`estimation_time` in place (§4.4-§4.7).

mod exact_count;
mod random_walks;
mod void;

pub use exact_count::ExactCountEstimator;
pub use random_walks::RandomWalksEstimator;
pub use void::VoidEstimator;

use std::rc::Rc;

use crate::join_order::{self, Gearing, JoinOrder};
use crate::pattern::PatternKind;
use crate::Result;

/// Populates a plan node's cardinality-related fields in place. Implemented
/// by each of the closed-form, sampling-based, and collaborator estimators.
pub trait CardinalityEstimator {
    fn estimate(&self, join_order: &JoinOrder) -> Result<()>;
}

/// The prefix an estimator should actually price: for a star join
/// (`gearing != Plain`) with relaxation enabled, the last extension is
/// replaced by its relaxed form so a bound endpoint does not distort the
/// estimate (§4.6). Shared by the VoID, random-walks, and exact-count
/// estimators, all three of which relax the same way before pricing.
pub(crate) fn relaxed_star_plan(join_order: &JoinOrder, relax_stars: bool) -> JoinOrder {
    if join_order.gearing() == Gearing::Plain || join_order.size() == 1 || !relax_stars {
        return Rc::clone(join_order);
    }
    let parent = match join_order.previous() {
        Some(parent) => parent.clone(),
        None => return Rc::clone(join_order),
    };
    let pattern = match join_order.pattern() {
        Some(PatternKind::Triple(t)) => t,
        _ => return Rc::clone(join_order),
    };
    match join_order.gearing() {
        Gearing::Forward => {
            let (relaxed, _filter) = pattern.relax_object();
            join_order::extend(&parent, PatternKind::Triple(Rc::new(relaxed)), Gearing::Forward, false)
        }
        Gearing::Reverse => {
            let (relaxed, _filter) = pattern.relax_subject();
            join_order::extend(&parent, PatternKind::Triple(Rc::new(relaxed)), Gearing::Reverse, false)
        }
        Gearing::Plain => unreachable!(),
    }
}
