//! Hotkey and hotstring admission.
//!
//! Triggers are registered with one or more variants. When the hook reports
//! that a trigger fired, [`TriggerRegistry::process_hotkey`] decides whether
//! a new thread may run it now, later, or not at all.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::sender::ledger::ModifierLedger;
use crate::sender::types::input_level_from_info;

pub type TriggerId = u32;

pub const DEFAULT_MAX_THREADS: u32 = 10;
pub const DEFAULT_MAX_THREADS_PER_HOTKEY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Hotkey,
    Hotstring,
}

/// Condition a variant re-checks at the moment it fires.
#[derive(Clone, Default)]
pub enum Criterion {
    #[default]
    Always,
    When(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Criterion {
    pub fn when(check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Criterion::When(Arc::new(check))
    }

    fn holds(&self) -> bool {
        match self {
            Criterion::Always => true,
            Criterion::When(check) => check(),
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Always => f.write_str("Always"),
            Criterion::When(_) => f.write_str("When(..)"),
        }
    }
}

/// One way a trigger can fire.
#[derive(Debug, Clone, Default)]
pub struct Variant {
    pub criterion: Criterion,
    pub priority: i32,
    /// Only input sent above this level fires the variant.
    pub input_level: u32,
    /// `None` takes the registry's per-hotkey default.
    pub max_threads: Option<u32>,
    running: u32,
    run_again: bool,
}

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input_level(mut self, level: u32) -> Self {
        self.input_level = level;
        self
    }

    pub fn with_max_threads(mut self, max_threads: u32) -> Self {
        self.max_threads = Some(max_threads.max(1));
        self
    }

    #[inline]
    pub fn running(&self) -> u32 {
        self.running
    }

    /// A run was requested while the variant was saturated.
    #[inline]
    pub fn run_again(&self) -> bool {
        self.run_again
    }

    /// Whether input tagged with `info` can fire this variant.
    #[inline]
    pub fn input_level_allows(&self, info: u32) -> bool {
        input_level_from_info(info) > self.input_level as i32
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub kind: TriggerKind,
    pub variants: Vec<Variant>,
}

impl Trigger {
    pub fn hotkey(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TriggerKind::Hotkey,
            variants: Vec::new(),
        }
    }

    pub fn hotstring(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TriggerKind::Hotstring,
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }
}

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new thread runs the variant now.
    Launched { id: TriggerId, variant: usize },
    /// The variant is saturated; it runs once more when a thread finishes.
    RunAgainAfterFinished,
    /// Held back by the global limit or a higher-priority thread.
    Queued,
    /// No variant may fire for this input.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct PendingLaunch {
    id: TriggerId,
    variant: usize,
    info: u32,
}

pub struct TriggerRegistry {
    triggers: scc::HashMap<TriggerId, Trigger>,
    next_id: AtomicU32,
    max_threads: u32,
    max_threads_per_hotkey: u32,
    /// Priorities of running threads, oldest first.
    running: Mutex<Vec<i32>>,
    pending_tx: Sender<PendingLaunch>,
    pending_rx: Receiver<PendingLaunch>,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_THREADS, DEFAULT_MAX_THREADS_PER_HOTKEY)
    }
}

impl TriggerRegistry {
    pub fn new(max_threads: u32, max_threads_per_hotkey: u32) -> Self {
        let (pending_tx, pending_rx) = unbounded();
        Self {
            triggers: scc::HashMap::new(),
            next_id: AtomicU32::new(0),
            max_threads: max_threads.max(1),
            max_threads_per_hotkey: max_threads_per_hotkey.max(1),
            running: Mutex::new(Vec::new()),
            pending_tx,
            pending_rx,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_threads, config.max_threads_per_hotkey)
    }

    pub fn add(&self, mut trigger: Trigger) -> TriggerId {
        for variant in &mut trigger.variants {
            variant.max_threads.get_or_insert(self.max_threads_per_hotkey);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, name = %trigger.name, kind = ?trigger.kind, "trigger added");
        let _ = self.triggers.insert_sync(id, trigger);
        id
    }

    pub fn remove(&self, id: TriggerId) -> Result<Trigger> {
        self.triggers
            .remove_sync(&id)
            .map(|(_, trigger)| trigger)
            .ok_or(Error::UnknownTrigger(id))
    }

    pub fn get(&self, id: TriggerId) -> Option<Trigger> {
        self.triggers.read_sync(&id, |_, trigger| trigger.clone())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Threads currently running across all triggers.
    pub fn running_threads(&self) -> usize {
        self.running_stack().len()
    }

    /// Decides what happens to input tagged `info` that fired trigger `id`.
    ///
    /// `variant` is the one the hook matched, if any; it is re-checked and
    /// another variant is tried when it no longer applies. A launch records
    /// the start time in `ledger` for modifier restoration.
    pub fn process_hotkey(
        &self,
        id: TriggerId,
        info: u32,
        variant: Option<usize>,
        ledger: &mut ModifierLedger,
        now: Duration,
    ) -> Result<Admission> {
        let variants = self
            .triggers
            .read_sync(&id, |_, trigger| trigger.variants.clone())
            .ok_or(Error::UnknownTrigger(id))?;

        let eligible = |v: &Variant| v.input_level_allows(info) && v.criterion.holds();
        let chosen = variant
            .filter(|&idx| variants.get(idx).is_some_and(eligible))
            .or_else(|| variants.iter().position(eligible));
        let Some(idx) = chosen else {
            debug!(id, info, "no variant admits this input");
            return Ok(Admission::Ignored);
        };

        let admission = self
            .triggers
            .update_sync(&id, |_, trigger| {
                let Some(variant) = trigger.variants.get_mut(idx) else {
                    return Admission::Ignored;
                };
                let mut running = self.running_stack();
                if running.len() >= self.max_threads as usize {
                    return Admission::Queued;
                }
                if variant.running >= variant.max_threads.unwrap_or(self.max_threads_per_hotkey) {
                    variant.run_again = true;
                    return Admission::RunAgainAfterFinished;
                }
                if running.last().is_some_and(|&top| variant.priority < top) {
                    return Admission::Queued;
                }
                variant.running += 1;
                running.push(variant.priority);
                Admission::Launched { id, variant: idx }
            })
            .ok_or(Error::UnknownTrigger(id))?;

        match admission {
            Admission::Launched { .. } => ledger.this_hotkey_start = Some(now),
            Admission::Queued => {
                let _ = self.pending_tx.send(PendingLaunch {
                    id,
                    variant: idx,
                    info,
                });
            }
            _ => {}
        }
        debug!(id, variant = idx, ?admission, "hotkey admission");
        Ok(admission)
    }

    /// Marks a thread of `id`/`variant` as finished.
    ///
    /// Returns the relaunch when a run was requested while it was saturated.
    pub fn finish_thread(
        &self,
        id: TriggerId,
        variant: usize,
        ledger: &mut ModifierLedger,
        now: Duration,
    ) -> Result<Option<Admission>> {
        let relaunch = self
            .triggers
            .update_sync(&id, |_, trigger| {
                let variant_ref = trigger.variants.get_mut(variant)?;
                let mut running = self.running_stack();
                variant_ref.running = variant_ref.running.saturating_sub(1);
                if let Some(pos) = running.iter().rposition(|&p| p == variant_ref.priority) {
                    running.remove(pos);
                }
                if !variant_ref.run_again {
                    return None;
                }
                variant_ref.run_again = false;
                variant_ref.running += 1;
                running.push(variant_ref.priority);
                Some(Admission::Launched { id, variant })
            })
            .ok_or(Error::UnknownTrigger(id))?;

        if relaunch.is_some() {
            ledger.this_hotkey_start = Some(now);
            debug!(id, variant, "relaunching after finish");
        }
        Ok(relaunch)
    }

    /// Re-offers queued admissions; those still blocked are queued again.
    pub fn drain_pending(&self, ledger: &mut ModifierLedger, now: Duration) -> Vec<Admission> {
        let pending: Vec<PendingLaunch> = self.pending_rx.try_iter().collect();
        pending
            .into_iter()
            .filter_map(|launch| {
                self.process_hotkey(launch.id, launch.info, Some(launch.variant), ledger, now)
                    .ok()
            })
            .collect()
    }

    fn running_stack(&self) -> std::sync::MutexGuard<'_, Vec<i32>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}
