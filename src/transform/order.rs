use slog::Logger;

use super::{collapse, BooleanTree, Transform};
use crate::error::EquivalenceError;

/// Sort AND/OR operands by the structural order and drop duplicates.
/// Operators without boolean laws (FOLLOWEDBY) keep their operand order.
pub struct OrderDedupe;

pub(crate) fn order_dedupe_step<T: BooleanTree>(op: T::Op, operands: Vec<T>) -> (T, bool) {
    if T::junction(op).is_none() || operands.windows(2).all(|w| w[0] < w[1]) {
        return (T::compound(op, operands), false);
    }

    let mut operands = operands;
    operands.sort();
    operands.dedup();
    collapse(op, operands, true)
}

impl<T: BooleanTree + Send + Sync> Transform<T> for OrderDedupe {
    fn name(&self) -> &'static str {
        "order-dedupe"
    }

    fn transform(&self, _logger: &Logger, expr: &T) -> Result<(T, bool), EquivalenceError> {
        Ok(expr.rewrite_compounds(&mut order_dedupe_step::<T>))
    }
}
