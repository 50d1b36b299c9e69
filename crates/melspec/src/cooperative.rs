//! Cooperative yield points.
//!
//! The pipeline runs to completion on one task. On a cooperative scheduler it
//! must hand control back periodically or it starves other tasks and trips
//! the watchdog; the orchestrator decides when, a [`CooperativeYield`] decides how.

pub trait CooperativeYield {
    fn yield_now(&mut self);
}

impl<Y: CooperativeYield + ?Sized> CooperativeYield for &mut Y {
    fn yield_now(&mut self) {
        (**self).yield_now();
    }
}

/// Never yields. For hosts with preemptive scheduling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

impl CooperativeYield for NoYield {
    fn yield_now(&mut self) {}
}

/// `std::thread::yield_now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadYield;

impl CooperativeYield for ThreadYield {
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Adapts a closure, e.g. an RTOS `delay(1)` binding.
#[derive(Debug, Clone)]
pub struct FnYield<F>(pub F);

impl<F: FnMut()> CooperativeYield for FnYield<F> {
    fn yield_now(&mut self) {
        (self.0)();
    }
}

/// True when a yield is due before item `index` at cadence `every` (0 = never).
#[inline]
#[must_use]
pub fn yield_due(index: usize, every: usize) -> bool {
    every != 0 && index % every == 0
}
