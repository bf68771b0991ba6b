// ============================================================
// Layer 5 — Learning Rate Schedules
// ============================================================
// Two schedules with different clocks:
//
//   Noam        — advances every BATCH: linear warmup from
//                 init_lr to max_lr over warmup_epochs worth of
//                 steps, then exponential decay down to final_lr
//                 by the last step
//   Exponential — advances every EPOCH: lr = init_lr * gamma^epoch
//
// The trainer calls `batch_lr()` before every optimizer step and
// `epoch_finished()` at each epoch boundary; each variant reacts
// to the clock it cares about and ignores the other.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Noam,
    Exponential,
}

#[derive(Debug, Clone)]
pub enum LrScheduler {
    Noam {
        step:         usize,
        warmup_steps: f64,
        total_steps:  f64,
        init_lr:      f64,
        max_lr:       f64,
        final_lr:     f64,
    },
    Exponential {
        current_lr: f64,
        gamma:      f64,
    },
}

impl LrScheduler {
    pub fn noam(
        init_lr: f64,
        max_lr: f64,
        final_lr: f64,
        warmup_epochs: f64,
        epochs: usize,
        steps_per_epoch: usize,
    ) -> Self {
        let steps_per_epoch = steps_per_epoch.max(1) as f64;
        LrScheduler::Noam {
            step: 0,
            warmup_steps: (warmup_epochs * steps_per_epoch).max(1.0),
            total_steps: (epochs as f64 * steps_per_epoch).max(1.0),
            init_lr,
            max_lr,
            final_lr,
        }
    }

    pub fn exponential(init_lr: f64, gamma: f64) -> Self {
        LrScheduler::Exponential {
            current_lr: init_lr,
            gamma,
        }
    }

    /// Learning rate for the next batch. Noam advances its step
    /// counter here.
    pub fn batch_lr(&mut self) -> f64 {
        match self {
            LrScheduler::Noam {
                step,
                warmup_steps,
                total_steps,
                init_lr,
                max_lr,
                final_lr,
            } => {
                let s = *step as f64;
                *step += 1;
                if s < *warmup_steps {
                    *init_lr + s * (*max_lr - *init_lr) / *warmup_steps
                } else {
                    // Decay chosen so the last step lands on final_lr
                    let progress =
                        (s - *warmup_steps) / (*total_steps - *warmup_steps).max(1.0);
                    *max_lr * (*final_lr / *max_lr).powf(progress)
                }
            }
            LrScheduler::Exponential { current_lr, .. } => *current_lr,
        }
    }

    /// Epoch-boundary hook; only the exponential schedule reacts.
    pub fn epoch_finished(&mut self) {
        if let LrScheduler::Exponential { current_lr, gamma } = self {
            *current_lr *= *gamma;
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noam_warms_up_then_decays() {
        // 2 warmup epochs of 10 steps, 10 epochs total
        let mut sched = LrScheduler::noam(1e-4, 1e-3, 1e-5, 2.0, 10, 10);

        let first = sched.batch_lr();
        assert!((first - 1e-4).abs() < 1e-12);

        let mut lrs = vec![first];
        for _ in 1..100 {
            lrs.push(sched.batch_lr());
        }
        // Monotone rise through warmup
        for window in lrs[..20].windows(2) {
            assert!(window[1] > window[0]);
        }
        // Peak at the end of warmup
        assert!((lrs[20] - 1e-3).abs() < 1e-9);
        // Monotone decay after, approaching final_lr
        for window in lrs[20..].windows(2) {
            assert!(window[1] < window[0]);
        }
        assert!(lrs[99] > 1e-5 && lrs[99] < 1e-4);
    }

    #[test]
    fn test_exponential_steps_per_epoch_only() {
        let mut sched = LrScheduler::exponential(0.1, 0.5);
        assert_eq!(sched.batch_lr(), 0.1);
        assert_eq!(sched.batch_lr(), 0.1);
        sched.epoch_finished();
        assert_eq!(sched.batch_lr(), 0.05);
        sched.epoch_finished();
        assert!((sched.batch_lr() - 0.025).abs() < 1e-12);
    }
}
