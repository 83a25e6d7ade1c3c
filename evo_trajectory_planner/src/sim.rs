//! Simulated machine: spindle with encoder and index, rotary indexers and
//! output banks.
//!
//! Stands in for the motion controller's HAL so the planner can run
//! stand-alone, in tests and in benchmarks. Call [`SimulatedMachine::inputs`]
//! before each cycle and [`SimulatedMachine::step`] after it.

use evo_common::consts::{MAX_ROTARY_AXES, MAX_SYNCED_AIO, MAX_SYNCED_DIO};
use evo_common::trajectory::config::SimulationConfig;
use serde::Serialize;
use static_assertions::const_assert;
use tracing::trace;

use crate::io::{CycleInputs, MachineIo, SpindleFeedback};

// ─── Spindle ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct SimSpindle {
    /// Commanded speed [rev/s], signed.
    commanded: f64,
    /// Actual speed [rev/s], signed.
    speed: f64,
    /// Raw encoder position [rev].
    revs: f64,
    /// Direction latched at spindle-on. Reversals do not change it.
    direction: i8,
    index_enable: bool,
    accel: f64,
    at_speed_tolerance: f64,
}

impl SimSpindle {
    fn at_speed(&self) -> bool {
        (self.speed - self.commanded).abs() <= self.at_speed_tolerance * self.commanded.abs() + 1e-9
    }

    fn step(&mut self, dt: f64) {
        let old_speed = self.speed;
        let max_dv = self.accel * dt;
        self.speed += (self.commanded - self.speed).clamp(-max_dv, max_dv);

        let old_revs = self.revs;
        self.revs += 0.5 * (old_speed + self.speed) * dt;

        if self.index_enable {
            let (lo, hi) = if self.revs >= old_revs {
                (old_revs, self.revs)
            } else {
                (self.revs, old_revs)
            };
            // Index pulse once per revolution at integer encoder counts.
            if lo.floor() != hi.floor() {
                let index = if self.revs >= old_revs { hi.floor() } else { lo.ceil() };
                self.revs -= index;
                self.index_enable = false;
                trace!(index, "spindle index latched");
            }
        }
    }
}

// ─── Rotary Indexer ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RotaryIndexer {
    requested: bool,
    unlocked: bool,
    countdown: u32,
}

// ─── Machine ────────────────────────────────────────────────────────

// `dout_mask` packs the whole digital bank.
const_assert!(MAX_SYNCED_DIO <= 64);

/// Output bank state and write counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputSnapshot {
    pub dout_mask: u64,
    pub dout_writes: u64,
    pub aout_writes: u64,
}

/// Deterministic machine model driven one cycle at a time.
#[derive(Debug, Clone)]
pub struct SimulatedMachine {
    spindle: SimSpindle,
    rotary: [RotaryIndexer; MAX_ROTARY_AXES],
    rotary_axes: usize,
    unlock_cycles: u32,
    dout: [bool; MAX_SYNCED_DIO],
    aout: [f64; MAX_SYNCED_AIO],
    dout_writes: u64,
    aout_writes: u64,
    spindle_reversals: u64,
    feed_scale: f64,
    stepping: bool,
}

impl SimulatedMachine {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            spindle: SimSpindle {
                commanded: 0.0,
                speed: 0.0,
                revs: 0.0,
                direction: 0,
                index_enable: false,
                accel: config.spindle_accel,
                at_speed_tolerance: config.at_speed_tolerance,
            },
            rotary: [RotaryIndexer::default(); MAX_ROTARY_AXES],
            rotary_axes: config.rotary_axes.min(MAX_ROTARY_AXES),
            unlock_cycles: config.rotary_unlock_cycles,
            dout: [false; MAX_SYNCED_DIO],
            aout: [0.0; MAX_SYNCED_AIO],
            dout_writes: 0,
            aout_writes: 0,
            spindle_reversals: 0,
            feed_scale: config.feed_scale,
            stepping: false,
        }
    }

    // ─── Operator Controls ──────────────────────────────────────────

    /// Start the spindle at `rps` (negative turns in reverse).
    pub fn spindle_on(&mut self, rps: f64) {
        self.spindle.commanded = rps;
        self.spindle.direction = if rps > 0.0 {
            1
        } else if rps < 0.0 {
            -1
        } else {
            0
        };
    }

    pub fn spindle_off(&mut self) {
        self.spindle.commanded = 0.0;
        self.spindle.direction = 0;
    }

    pub fn set_feed_scale(&mut self, scale: f64) {
        self.feed_scale = scale;
    }

    pub fn set_stepping(&mut self, stepping: bool) {
        self.stepping = stepping;
    }

    // ─── Cycle ──────────────────────────────────────────────────────

    /// Feedback snapshot for the next planner cycle.
    pub fn inputs(&self) -> CycleInputs {
        CycleInputs {
            spindle: SpindleFeedback {
                revs: self.spindle.revs,
                direction: self.spindle.direction,
                speed_in: self.spindle.speed,
                at_speed: self.spindle.at_speed(),
                index_enable: self.spindle.index_enable,
            },
            net_feed_scale: self.feed_scale,
            stepping: self.stepping,
        }
    }

    /// Advance the machine by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.spindle.step(dt);
        for indexer in self.rotary.iter_mut().take(self.rotary_axes) {
            if indexer.countdown > 0 {
                indexer.countdown -= 1;
                if indexer.countdown == 0 {
                    indexer.unlocked = indexer.requested;
                }
            }
        }
    }

    // ─── Observation ────────────────────────────────────────────────

    /// Commanded spindle speed [rev/s].
    pub fn spindle_command(&self) -> f64 {
        self.spindle.commanded
    }

    /// Actual spindle speed [rev/s].
    pub fn spindle_speed(&self) -> f64 {
        self.spindle.speed
    }

    pub fn spindle_reversals(&self) -> u64 {
        self.spindle_reversals
    }

    pub fn dout(&self, index: usize) -> bool {
        self.dout.get(index).copied().unwrap_or(false)
    }

    pub fn aout(&self, index: usize) -> f64 {
        self.aout.get(index).copied().unwrap_or(0.0)
    }

    pub fn outputs(&self) -> OutputSnapshot {
        let dout_mask = self
            .dout
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u64, |mask, (i, _)| mask | (1 << i));
        OutputSnapshot {
            dout_mask,
            dout_writes: self.dout_writes,
            aout_writes: self.aout_writes,
        }
    }
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new(&SimulationConfig::default())
    }
}

impl MachineIo for SimulatedMachine {
    fn request_spindle_index(&mut self) {
        self.spindle.index_enable = true;
    }

    fn reverse_spindle(&mut self) {
        self.spindle.commanded = -self.spindle.commanded;
        self.spindle_reversals += 1;
    }

    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool) {
        if axis >= self.rotary_axes {
            return;
        }
        let indexer = &mut self.rotary[axis];
        if indexer.requested == unlock && (indexer.countdown > 0 || indexer.unlocked == unlock) {
            return;
        }
        indexer.requested = unlock;
        if self.unlock_cycles == 0 {
            indexer.unlocked = unlock;
            indexer.countdown = 0;
        } else {
            indexer.countdown = self.unlock_cycles;
        }
    }

    fn rotary_is_unlocked(&self, axis: usize) -> bool {
        axis < self.rotary_axes && self.rotary[axis].unlocked
    }

    fn write_dout(&mut self, index: usize, on: bool) {
        if let Some(slot) = self.dout.get_mut(index) {
            *slot = on;
            self.dout_writes += 1;
        }
    }

    fn write_aout(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.aout.get_mut(index) {
            *slot = value;
            self.aout_writes += 1;
        }
    }
}
