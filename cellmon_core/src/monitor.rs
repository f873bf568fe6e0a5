//! The owned acquisition session.
//!
//! A `Monitor` owns the sampler (and through it the device handle), the
//! calibration model, the decomposer, the calibration store and the epoch
//! that sample timestamps count from. Nothing is global; two monitors over
//! two devices do not interact.
use std::time::Instant;

use cellmon_traits::{AdcBus, CHANNELS, Clock};
use tracing::{debug, error, info, warn};

use crate::calibration::{CalibrationModel, CalibrationParameters};
use crate::config::MonitorCfg;
use crate::decompose::Decomposer;
use crate::error::{CalibrationInputError, MonitorError, StoreError};
use crate::sample::{CellSample, SampleReport};
use crate::sampler::{RawReading, RawSampler};
use crate::store::CalibrationStore;

pub struct Monitor<A, C, S> {
    sampler: RawSampler<A, C>,
    model: CalibrationModel,
    decomposer: Decomposer,
    store: S,
    epoch: Instant,
    /// First point of a pending two-point calibration.
    anchor: Option<RawReading>,
}

impl<A: AdcBus, C: Clock, S: CalibrationStore> Monitor<A, C, S> {
    /// Build a session; calibration comes from `store` when it has something
    /// usable, otherwise from `cfg.defaults`. The device is not touched until
    /// [`Monitor::init`].
    pub fn new(adc: A, clock: C, store: S, cfg: MonitorCfg) -> Self {
        let params = match store.load(&cfg.defaults) {
            Ok(p) => {
                info!(gains = ?p.gains(), offsets_mv = ?p.offsets_mv(), "calibration loaded");
                p
            }
            Err(StoreError::NotFound(what)) => {
                info!(%what, "no stored calibration, using defaults");
                cfg.defaults
            }
            Err(e) => {
                warn!(error = %e, "stored calibration unusable, using defaults");
                cfg.defaults
            }
        };
        let epoch = clock.now();
        Self {
            sampler: RawSampler::new(adc, clock, cfg.sampler),
            model: CalibrationModel::new(params, cfg.limits),
            decomposer: Decomposer::new(cfg.windows),
            store,
            epoch,
            anchor: None,
        }
    }

    pub fn init(&mut self) -> Result<(), MonitorError> {
        self.sampler.init()
    }

    pub fn is_initialized(&self) -> bool {
        self.sampler.is_initialized()
    }

    pub fn clock(&self) -> &C {
        self.sampler.clock()
    }

    /// ms since the session started, wrapping at `u32::MAX`.
    pub fn epoch_ms(&self) -> u32 {
        self.sampler.clock().ms_since(self.epoch) as u32
    }

    pub fn calibration(&self) -> &CalibrationParameters {
        self.model.params()
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    pub fn decomposer(&self) -> &Decomposer {
        &self.decomposer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Raw codes held for the next two-point calibration, if any.
    pub fn anchor(&self) -> Option<&RawReading> {
        self.anchor.as_ref()
    }

    /// One full acquisition cycle: sample, convert, decompose, estimate.
    pub fn cycle(&mut self) -> Result<SampleReport, MonitorError> {
        let raw = self.sampler.sample()?;
        let cumulative_mv = self.model.to_absolute_mv(&raw);
        let d = self.decomposer.decompose(&cumulative_mv);
        let sample = CellSample::from_decomposition(self.epoch_ms(), &d);

        for (ch, w) in d.warnings.iter().enumerate().filter(|(_, w)| w.any()) {
            warn!(
                channel = ch,
                tap_mv = cumulative_mv[ch],
                below = w.below_window,
                above = w.above_window,
                not_increasing = w.not_increasing,
                "implausible tap voltage"
            );
        }
        debug!(epoch_ms = sample.epoch_ms, mv = ?sample.mv, soc = ?sample.soc, total = sample.total, "cycle");

        Ok(SampleReport {
            sample,
            raw,
            cumulative_mv,
            cells_mv: d.cells_mv,
            warnings: d.warnings,
        })
    }

    /// A single non-averaged pass; failing channels are flagged, not fatal.
    pub fn read_raw(&mut self) -> Result<RawReading, MonitorError> {
        self.sampler.read_once()
    }

    /// Acquire and hold the first point of a two-point calibration.
    pub fn capture_point(&mut self) -> Result<RawReading, MonitorError> {
        let raw = self.sampler.sample()?;
        info!(codes = ?raw.codes, "calibration point captured");
        self.anchor = Some(raw);
        Ok(raw)
    }

    /// Shift offsets so the current reading matches `reference_mv`.
    ///
    /// The reading used becomes the anchor for a following two-point fit.
    pub fn calibrate_one_point(
        &mut self,
        reference_mv: &[f32; CHANNELS],
    ) -> Result<CalibrationParameters, MonitorError> {
        let raw = self.sampler.sample()?;
        let params = self.model.fit_one_point(&raw, reference_mv)?;
        self.commit(params)?;
        self.anchor = Some(raw);
        Ok(params)
    }

    /// Pair the anchor with `ref1_mv` and a fresh reading with `ref2_mv`.
    pub fn calibrate_two_point(
        &mut self,
        ref1_mv: &[f32; CHANNELS],
        ref2_mv: &[f32; CHANNELS],
    ) -> Result<CalibrationParameters, MonitorError> {
        let raw1 = self.anchor.ok_or(CalibrationInputError::MissingFirstPoint)?;
        let raw2 = self.sampler.sample()?;
        self.calibrate_two_point_with(&raw1, ref1_mv, &raw2, ref2_mv)
    }

    /// Two-point fit over readings the caller already holds.
    pub fn calibrate_two_point_with(
        &mut self,
        raw1: &RawReading,
        ref1_mv: &[f32; CHANNELS],
        raw2: &RawReading,
        ref2_mv: &[f32; CHANNELS],
    ) -> Result<CalibrationParameters, MonitorError> {
        let params = self.model.fit_two_point(raw1, ref1_mv, raw2, ref2_mv)?;
        self.commit(params)?;
        self.anchor = None;
        Ok(params)
    }

    /// Persist, then swap. The model is untouched when the save fails.
    fn commit(&mut self, params: CalibrationParameters) -> Result<(), MonitorError> {
        if let Err(e) = self.store.save(&params) {
            error!(error = %e, "calibration not saved, keeping previous parameters");
            return Err(e.into());
        }
        self.model.replace(params);
        info!(gains = ?params.gains(), offsets_mv = ?params.offsets_mv(), "calibration updated");
        Ok(())
    }
}
