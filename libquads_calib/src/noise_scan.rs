use serde_json::Value;
use std::sync::mpsc::Sender;

use super::config::NoiseScanConfig;
use super::constants::SEQUENCER_STOP_IMMEDIATELY;
use super::error::{NoiseScanError, SessionError};
use super::scan_status::ScanStatus;
use super::session::SequencerSession;

/// Chip id which addresses every chip at once
const BROADCAST_CHIP: u32 = 999;

/// Noise figures reported by the minalyzer for one chip in one iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipNoiseResult {
    pub threshold: u32,
    pub iteration: u32,
    pub global_iteration: u32,
    pub chip: u32,
    pub tot_noisy: u64,
    pub unmaskable: u64,
}

/// Everything a finished scan collected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub results: Vec<ChipNoiseResult>,
    /// (global iteration, chip) pairs for which the minalyzer gave nothing
    pub missing: Vec<(u32, u32)>,
    pub iterations: u32,
}

impl ScanReport {
    /// Results for a single threshold, across iterations and chips
    pub fn for_threshold(&self, threshold: u32) -> impl Iterator<Item = &ChipNoiseResult> {
        self.results
            .iter()
            .filter(move |r| r.threshold == threshold)
    }
}

fn field_as_u64(record: &Value, field: &str) -> u64 {
    record.get(field).and_then(Value::as_u64).unwrap_or(0)
}

/// The threshold noise scan.
///
/// Walks the threshold down from the start value. For every threshold the chips are
/// reconfigured and a short run is analysed by the minalyzer `max_iterations` times,
/// logging how many pixels were noisy and how many of those could not be masked.
#[derive(Debug, Clone)]
pub struct NoiseScan<'a> {
    config: &'a NoiseScanConfig,
}

impl<'a> NoiseScan<'a> {
    pub fn new(config: &'a NoiseScanConfig) -> Self {
        Self { config }
    }

    fn command_path(&self, command: &str) -> String {
        format!("{}/{}", self.config.odb.commands, command)
    }

    fn send_command<S: SequencerSession>(
        &self,
        session: &mut S,
        command: &str,
    ) -> Result<(), SessionError> {
        session.odb_set(&self.command_path(command), Value::from(true))
    }

    /// Hand the scan settings to the minalyzer
    pub fn setup_minalyzer<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        let settings = &self.config.odb.minalyzer_settings;
        session.odb_set(
            &format!("{settings}/max_hits"),
            Value::from(self.config.max_hits),
        )?;
        session.odb_set(
            &format!("{settings}/max_link_errors"),
            Value::from(self.config.max_link_errors),
        )?;
        session.odb_set(
            &format!("{settings}/do_tuning"),
            Value::from(self.config.do_tuning),
        )?;
        Ok(())
    }

    pub fn set_chip_dac<S: SequencerSession>(
        &self,
        session: &mut S,
        chip: u32,
        dac: &str,
        value: u32,
    ) -> Result<(), SessionError> {
        session.odb_set(
            &format!("{}/{dac}[{chip}]", self.config.odb.vdacs),
            Value::from(value),
        )
    }

    pub fn configure_chips<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        session.odb_set(
            &self.command_path("MupixChipToConfigure"),
            Value::from(BROADCAST_CHIP),
        )?;
        self.send_command(session, "MupixConfig")
    }

    pub fn configure_tdacs<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        session.odb_set(
            &self.command_path("MupixChipToConfigure"),
            Value::from(BROADCAST_CHIP),
        )?;
        self.send_command(session, "MupixTDACConfig")
    }

    /// Configure once with the PLL enabled, let it settle, then disable it again
    pub fn reset_pll<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        let confdacs = &self.config.odb.confdacs;
        for chip in self.config.chips.iter() {
            session.odb_set(&format!("{confdacs}/EnPLL[{chip}]"), Value::from(1))?;
        }
        self.configure_chips(session)?;
        session.wait(self.config.pll_settle_time)?;
        for chip in self.config.chips.iter() {
            session.odb_set(&format!("{confdacs}/EnPLL[{chip}]"), Value::from(0))?;
        }
        Ok(())
    }

    pub fn feb_set_to_running<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        self.send_command(session, "Set FEBs into running")
    }

    /// Tell the minalyzer which iteration this is and take data for `run_time` seconds
    pub fn run_minalyzer<S: SequencerSession>(
        &self,
        session: &mut S,
        global_iteration: u32,
    ) -> Result<(), SessionError> {
        session.odb_set(
            &format!("{}/iteration", self.config.odb.minalyzer_settings),
            Value::from(global_iteration),
        )?;
        session.wait(self.config.run_time)
    }

    /// Read the minalyzer record of a chip. None if the minalyzer wrote nothing for it.
    pub fn read_chip_output<S: SequencerSession>(
        &self,
        session: &S,
        chip: u32,
    ) -> Result<Option<(u64, u64)>, SessionError> {
        let record = session.odb_get(&format!("{}{chip}", self.config.odb.minalyzer_output))?;
        Ok(record
            .filter(|r| !r.is_null())
            .map(|r| (field_as_u64(&r, "tot_noisy"), field_as_u64(&r, "unmaskable"))))
    }

    fn sequence<S: SequencerSession>(
        &self,
        session: &mut S,
        tx: Option<&Sender<ScanStatus>>,
    ) -> Result<ScanReport, NoiseScanError> {
        let config = self.config;
        config.validate()?;
        let thresholds = config.thresholds();
        let total_iterations = config.total_iterations().max(1);
        let mut report = ScanReport::default();

        self.setup_minalyzer(session)?;
        session.start_run()?;

        let mut global_iteration: u32 = 0;
        for threshold in thresholds {
            for iteration in 1..=config.max_iterations {
                session.msg(&format!(
                    "Running threshold {threshold} (iteration {iteration}/{})",
                    config.max_iterations
                ))?;

                for chip in config.chips.iter() {
                    self.set_chip_dac(session, *chip, "ThHigh", threshold)?;
                    self.set_chip_dac(session, *chip, "ThLow", threshold - 1)?;
                }

                self.configure_chips(session)?;
                self.configure_tdacs(session)?;
                self.reset_pll(session)?;
                self.feb_set_to_running(session)?;

                self.run_minalyzer(session, global_iteration)?;

                for chip in config.chips.iter() {
                    match self.read_chip_output(session, *chip)? {
                        Some((tot_noisy, unmaskable)) => {
                            session.msg(&format!(
                                "Chip {chip}: noisy={tot_noisy}, unmaskable={unmaskable}"
                            ))?;
                            report.results.push(ChipNoiseResult {
                                threshold,
                                iteration,
                                global_iteration,
                                chip: *chip,
                                tot_noisy,
                                unmaskable,
                            });
                        }
                        None => {
                            session.msg(&format!("Chip {chip}: No tuning output found"))?;
                            report.missing.push((global_iteration, *chip));
                        }
                    }
                }

                global_iteration += 1;
                if let Some(tx) = tx {
                    tx.send(ScanStatus::new(
                        global_iteration as f32 / total_iterations as f32,
                        threshold,
                        iteration,
                    ))?;
                }
            }
        }

        report.iterations = global_iteration;
        Ok(report)
    }

    /// Stop the sequencer and the run. Always called when the scan ends.
    pub fn at_exit<S: SequencerSession>(&self, session: &mut S) -> Result<(), SessionError> {
        session.odb_set(SEQUENCER_STOP_IMMEDIATELY, Value::from(true))?;
        session.stop_run()?;
        log::info!("Noise scan sequence cleanup");
        Ok(())
    }

    /// Run the full scan, then the cleanup hook.
    ///
    /// If both the scan and the cleanup fail, the scan's error is returned.
    pub fn run<S: SequencerSession>(
        &self,
        session: &mut S,
        tx: Option<&Sender<ScanStatus>>,
    ) -> Result<ScanReport, NoiseScanError> {
        let result = self.sequence(session, tx);
        if let Err(e) = self.at_exit(session) {
            log::error!("Noise scan cleanup failed: {e}");
            if result.is_ok() {
                return Err(NoiseScanError::SessionError(e));
            }
        }
        result
    }
}
