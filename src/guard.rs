// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Atomic register access.
//!
//! Timer1's 16-bit registers are reached through two 8-bit transfers and a
//! shared TEMP register, so an interrupt landing between the two halves
//! tears the value. Every multi-byte access happens under an [AtomicGuard].

use core::marker::PhantomData;

use critical_section::{CriticalSection, RestoreState};

/// Interrupts stay disabled for as long as this is alive.
///
/// Acquiring saves the current interrupt enable state, dropping restores
/// that saved state. It never unconditionally enables interrupts, so
/// guards nest, and can be taken inside the overflow handler.
pub struct AtomicGuard {
    state: RestoreState,
    // Must be released on the same core/context it was acquired on
    _not_send: PhantomData<*mut ()>,
}

impl AtomicGuard {
    pub fn acquire() -> Self {
        // SAFETY: released exactly once, in Drop
        let state = unsafe { critical_section::acquire() };
        Self {
            state,
            _not_send: PhantomData,
        }
    }

    /// Token for borrowing `critical_section::Mutex` data
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: interrupts are disabled for the lifetime of self
        unsafe { CriticalSection::new() }
    }
}

impl Drop for AtomicGuard {
    fn drop(&mut self) {
        // SAFETY: state came from the matching acquire
        unsafe { critical_section::release(self.state) }
    }
}

/// Run `f` with interrupts disabled, restoring the previous state after.
pub fn atomic<T>(f: impl FnOnce(CriticalSection<'_>) -> T) -> T {
    let guard = AtomicGuard::acquire();
    let cs = guard.token();
    f(cs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use critical_section::Mutex;

    #[test]
    fn test_nested_guards() {
        let shared = Mutex::new(Cell::new(0u16));
        let out = atomic(|cs| {
            shared.borrow(cs).set(0x1234);
            // taken again, as from inside the overflow handler
            let inner = atomic(|cs| shared.borrow(cs).get());
            inner + 1
        });
        assert_eq!(out, 0x1235);
        // and usable again after both were released
        assert_eq!(atomic(|cs| shared.borrow(cs).get()), 0x1234);
    }

    #[test]
    fn test_explicit_guard() {
        let shared = Mutex::new(Cell::new(7u8));
        {
            let guard = AtomicGuard::acquire();
            shared.borrow(guard.token()).set(9);
        }
        assert_eq!(critical_section::with(|cs| shared.borrow(cs).get()), 9);
    }
}
