//! The shadow synchronisation state machine.
//!
//! Each exchange runs `WAIT_MESSAGE -> [REALIGN] -> APPLY_BUS ->
//! STEP_AND_SAMPLE -> RESPOND`. The session holds the leased message from
//! [`receive`](ShadowSession::receive) until the step on which the pixel-dot
//! clock rises, then writes the response fields and releases it. The main
//! loop performs the settle and sample between `apply_bus` and `respond`.

use vicsim_common::{FramePoint, DOTS_PER_CYCLE};

use super::link::ShadowLink;
use super::state::{ShadowFlags, ShadowState};
use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};
use crate::stepper::{Stepper, EDGES_PER_DOT, PHASE_EDGES};

/// Outcome of [`ShadowSession::respond`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exchange {
    /// The designated edge has not happened yet; the lease is still held.
    Pending,
    /// The message was answered and released.
    Released,
    /// The message was answered and the reference asked to stop.
    Stopped,
    /// One full frame was captured; the message was released.
    FrameCaptured,
}

/// Drives the shadow protocol over a [`ShadowLink`].
pub struct ShadowSession<'a> {
    link: &'a mut dyn ShadowLink,
    lease: Option<ShadowState>,
    open: bool,
    capture_flag: bool,
    capture_frame: bool,
    exchanges: u64,
}

impl<'a> ShadowSession<'a> {
    /// Wraps a link. Call [`open`](Self::open) before the first receive.
    pub fn new(link: &'a mut dyn ShadowLink) -> Self {
        Self {
            link,
            lease: None,
            open: false,
            capture_flag: false,
            capture_frame: false,
            exchanges: 0,
        }
    }

    /// Opens the link.
    pub fn open(&mut self) -> Result<(), SimError> {
        self.link.open()?;
        self.open = true;
        log::info!("shadow link open");
        Ok(())
    }

    /// Whether a message is currently leased.
    pub fn holds_lease(&self) -> bool {
        self.lease.is_some()
    }

    /// Whether the latest message requested capture.
    pub fn capture_flag(&self) -> bool {
        self.capture_flag
    }

    /// Whether a one-frame capture has been requested. Once set it stays set.
    pub fn capture_frame(&self) -> bool {
        self.capture_frame
    }

    /// Messages answered so far.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// WAIT_MESSAGE: blocks for the next message, latches its capture flags
    /// and realigns the model if asked. Returns `false` when the link has
    /// nothing more to deliver.
    pub fn receive<E: Evaluator>(&mut self, stepper: &mut Stepper<E>) -> Result<bool, SimError> {
        let Some(mut state) = self.link.acquire()? else {
            log::info!("shadow link delivered stop");
            return Ok(false);
        };
        log::debug!(
            "shadow message {}: flags {} cycle {} line {} xpos {:03x} addr {:03x} ce {} rw {} data {:02x}",
            self.exchanges,
            state.flags,
            state.cycle_num,
            state.raster_line,
            state.xpos,
            state.addr,
            state.ce,
            state.rw,
            state.data
        );

        self.capture_flag = state.flags.contains(ShadowFlags::CAPTURE_START);
        if state.flags.contains(ShadowFlags::CAPTURE_ONE_FRAME) {
            self.capture_frame = true;
        }
        let sync = state.flags.contains(ShadowFlags::SYNC_STATE);
        state.flags.remove(ShadowFlags::SYNC_STATE);
        let bus_access = state.flags.contains(ShadowFlags::BUS_ACCESS);
        let (cycle, line, xpos) = (state.cycle_num, state.raster_line, state.xpos);
        self.lease = Some(state);

        if sync {
            realign(stepper, cycle, line, xpos)?;
        }
        if bus_access && stepper.read(Pin::ClkPhi) == 0 {
            return Err(SimError::ConsistencyCheck {
                time: stepper.now(),
                condition: "bus access received with phi low".to_string(),
            });
        }
        Ok(true)
    }

    /// APPLY_BUS: forwards the leased bus fields onto the model inputs.
    ///
    /// Address, chip enable and direction are always driven together, then
    /// data for writes. At dot4x phase 31 of the first clock phase the bus is
    /// returned to idle first.
    pub fn apply_bus<E: Evaluator>(&mut self, stepper: &mut Stepper<E>) {
        let Some(state) = self.lease.as_mut() else {
            return;
        };
        if stepper.read(Pin::ClkPhi) == 0 && u64::from(stepper.phase()) == PHASE_EDGES - 1 {
            state.idle_bus();
        }
        stepper.set_input(Pin::AddrIn, state.addr);
        stepper.set_input(Pin::Ce, u16::from(state.ce));
        stepper.set_input(Pin::Rw, u16::from(state.rw));
        if state.is_write() {
            stepper.set_input(Pin::DataIn, u16::from(state.data));
        }
    }

    /// RESPOND: writes the response fields into the leased message and
    /// releases it once the pixel-dot clock has risen.
    pub fn respond<E: Evaluator>(&mut self, stepper: &Stepper<E>) -> Result<Exchange, SimError> {
        let rising = stepper.dot_rising();
        let position = stepper.position();
        let frame_end = stepper.profile().frame_end;
        let phi = stepper.read(Pin::ClkPhi);
        let selected_read = stepper.read(Pin::Ce) == 0 && stepper.read(Pin::Rw) == 1;
        let data_out = stepper.read(Pin::DataOut);

        let Some(state) = self.lease.as_mut() else {
            return Ok(Exchange::Pending);
        };
        state.phi = (phi & 1) as u8;
        if selected_read {
            state.data = (data_out & 0xff) as u8;
        }
        if !rising {
            return Ok(Exchange::Pending);
        }

        if self.capture_frame && position == frame_end {
            state.flags.remove(ShadowFlags::CAPTURE_START);
            self.release()?;
            log::info!("captured one frame at {}", stepper.now());
            return Ok(Exchange::FrameCaptured);
        }

        let stop = state.flags.contains(ShadowFlags::CAPTURE_END);
        self.release()?;
        if stop {
            log::info!("shadow reference requested stop at {}", stepper.now());
            Ok(Exchange::Stopped)
        } else {
            Ok(Exchange::Released)
        }
    }

    fn release(&mut self) -> Result<(), SimError> {
        if let Some(state) = self.lease.take() {
            self.link.release(state)?;
            self.exchanges += 1;
        }
        Ok(())
    }

    /// Releases any message still leased, exactly once, and closes the link.
    pub fn finish(&mut self) -> Result<(), SimError> {
        let released = self.release();
        if self.open {
            self.open = false;
            self.link.close()?;
            log::info!("shadow link closed after {} exchanges", self.exchanges);
        }
        released
    }
}

/// REALIGN: fast-forwards the model so that the next pixel-dot rising edge
/// lands on `cycle * 8` of `raster_line`.
///
/// Steps until the dot clock rises onto the dot just before the target, then
/// through the next six dot4x edges and advances once more, leaving the clock
/// on the unsettled edge that raises the target dot. The main loop's next
/// settle is therefore that rising edge. Nothing is traced while realigning.
fn realign<E: Evaluator>(
    stepper: &mut Stepper<E>,
    cycle: u16,
    raster_line: u16,
    xpos: u16,
) -> Result<(), SimError> {
    let target = FramePoint {
        raster_x: cycle.saturating_mul(DOTS_PER_CYCLE),
        raster_line,
    };
    let profile = stepper.profile();
    let before = profile.previous_dot(target);
    let expected_xpos = profile.xpos_at(target.raster_x);
    let frame_dots =
        u64::from(profile.dots_per_line()) * u64::from(profile.lines_per_frame) + 1;
    let budget = frame_dots * EDGES_PER_DOT;
    let start = stepper.dot4x_edges();

    loop {
        stepper.settle();
        stepper.log_state();
        if stepper.dot_rising() && stepper.position() == before {
            break;
        }
        if stepper.dot4x_edges() - start >= budget {
            return Err(SimError::RealignTimeout {
                time: stepper.now(),
                cycle,
                raster_line,
            });
        }
        stepper.store_previous();
        stepper.advance()?;
    }

    let handoff = stepper.dot4x_edges() + EDGES_PER_DOT - 1;
    stepper.store_previous();
    while stepper.dot4x_edges() < handoff {
        stepper.advance()?;
        stepper.settle();
        stepper.log_state();
        stepper.store_previous();
    }

    if stepper.read(Pin::ClkPhi) == 0 {
        return Err(SimError::ConsistencyCheck {
            time: stepper.now(),
            condition: format!(
                "phi low at realignment handoff to cycle {cycle}, raster line {raster_line}"
            ),
        });
    }
    if expected_xpos != xpos {
        log::warn!(
            "reference xpos {xpos:03x} differs from model xpos {expected_xpos:03x} \
             at cycle {cycle}, raster line {raster_line}"
        );
    }
    stepper.advance()?;
    log::info!(
        "synced to cycle={cycle}, raster_line={raster_line}, xpos={xpos:03x} at {}",
        stepper.now()
    );
    Ok(())
}
