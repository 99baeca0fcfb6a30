// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! External file-descriptor watches folded into the event loop.

use std::os::unix::io::RawFd;

use bitflags::bitflags;

bitflags! {
    /// Which conditions on a watched descriptor wake the event loop.
    pub struct FdInterest: u8 {
        const READ = 1;
        const WRITE = 4;
        const EXCEPT = 8;
    }
}

/// A watch callback.
///
/// Runs on the event-loop thread when the descriptor is ready. It
/// receives the set so it can add or remove watches (including its own),
/// the ready descriptor, and the `data` word it was registered with.
pub type FdHandler = fn(&mut FdSet, RawFd, usize);

#[derive(Copy, Clone)]
struct Watch {
    fd: RawFd,
    interest: FdInterest,
    handler: FdHandler,
    data: usize,
}

/// The set of externally watched descriptors.
///
/// The event loop polls these alongside the display connection, so data
/// arriving on an application pipe or socket wakes the loop exactly like
/// an input event. One entry exists per descriptor; re-adding a
/// descriptor widens its interest mask and replaces its callback.
#[derive(Default)]
pub struct FdSet {
    watches: Vec<Watch>,
}

impl FdSet {
    pub fn new() -> FdSet {
        FdSet::default()
    }

    /// Watches `fd` for readability.
    pub fn add(&mut self, fd: RawFd, handler: FdHandler, data: usize) {
        self.add_with(fd, FdInterest::READ, handler, data);
    }

    /// Watches `fd` for the given conditions.
    pub fn add_with(&mut self, fd: RawFd, interest: FdInterest, handler: FdHandler, data: usize) {
        if interest.is_empty() {
            return;
        }
        if let Some(w) = self.watches.iter_mut().find(|w| w.fd == fd) {
            w.interest |= interest;
            w.handler = handler;
            w.data = data;
        } else {
            self.watches.push(Watch {
                fd,
                interest,
                handler,
                data,
            });
        }
    }

    /// Stops watching `fd` entirely.
    pub fn remove(&mut self, fd: RawFd) {
        self.watches.retain(|w| w.fd != fd);
    }

    /// Withdraws part of the interest mask for `fd`.
    ///
    /// Conditions not named stay registered; the watch is dropped only
    /// when nothing remains of its mask.
    pub fn remove_interest(&mut self, fd: RawFd, interest: FdInterest) {
        if let Some(w) = self.watches.iter_mut().find(|w| w.fd == fd) {
            w.interest -= interest;
        }
        self.watches.retain(|w| !w.interest.is_empty());
    }

    /// The interest currently registered for `fd`.
    pub fn interest(&self, fd: RawFd) -> Option<FdInterest> {
        self.watches.iter().find(|w| w.fd == fd).map(|w| w.interest)
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Registered `(fd, interest)` pairs, for building the poll set.
    pub fn poll_set(&self) -> Vec<(RawFd, FdInterest)> {
        self.watches.iter().map(|w| (w.fd, w.interest)).collect()
    }

    /// Invokes the callback of each descriptor reported ready.
    ///
    /// A callback may mutate the set; registration is re-checked before
    /// every invocation, so a watch removed by an earlier callback in the
    /// same batch is not called with a stale descriptor. Returns how many
    /// callbacks ran.
    pub fn dispatch_ready(&mut self, ready: &[(RawFd, FdInterest)]) -> usize {
        let mut dispatched = 0;
        for &(fd, conditions) in ready {
            let watch = self
                .watches
                .iter()
                .find(|w| w.fd == fd && w.interest.intersects(conditions))
                .copied();
            if let Some(w) = watch {
                (w.handler)(self, fd, w.data);
                dispatched += 1;
            }
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static LOG: RefCell<Vec<(RawFd, usize)>> = const { RefCell::new(Vec::new()) };
    }

    fn log(_set: &mut FdSet, fd: RawFd, data: usize) {
        LOG.with(|l| l.borrow_mut().push((fd, data)));
    }

    fn take_log() -> Vec<(RawFd, usize)> {
        LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
    }

    #[test]
    fn partial_interest_removal_keeps_the_rest() {
        let mut set = FdSet::new();
        set.add_with(5, FdInterest::READ | FdInterest::WRITE, log, 0);
        set.remove_interest(5, FdInterest::WRITE);
        assert_eq!(set.interest(5), Some(FdInterest::READ));

        // withdrawing the rest drops the watch
        set.remove_interest(5, FdInterest::READ);
        assert_eq!(set.interest(5), None);
        assert!(set.is_empty());
    }

    #[test]
    fn re_adding_widens_the_mask() {
        let mut set = FdSet::new();
        set.add(7, log, 1);
        set.add_with(7, FdInterest::WRITE, log, 2);
        assert_eq!(set.interest(7), Some(FdInterest::READ | FdInterest::WRITE));
        // one entry per descriptor, carrying the latest data word
        set.dispatch_ready(&[(7, FdInterest::READ)]);
        assert_eq!(take_log(), vec![(7, 2)]);
    }

    #[test]
    fn dispatch_skips_watches_removed_by_earlier_callbacks() {
        fn remove_nine(set: &mut FdSet, fd: RawFd, data: usize) {
            LOG.with(|l| l.borrow_mut().push((fd, data)));
            set.remove(9);
        }
        let mut set = FdSet::new();
        set.add(8, remove_nine, 0);
        set.add(9, log, 0);

        let ready = set.poll_set();
        let ran = set.dispatch_ready(&ready);
        assert_eq!(ran, 1);
        assert_eq!(take_log(), vec![(8, 0)]);
        assert_eq!(set.interest(9), None);
    }

    #[test]
    fn dispatch_matches_conditions_against_interest() {
        let mut set = FdSet::new();
        set.add_with(3, FdInterest::WRITE, log, 0);
        // readable is not what this watch asked for
        assert_eq!(set.dispatch_ready(&[(3, FdInterest::READ)]), 0);
        assert_eq!(set.dispatch_ready(&[(3, FdInterest::WRITE)]), 1);
        take_log();
    }
}
