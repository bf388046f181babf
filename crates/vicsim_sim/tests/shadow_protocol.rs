//! End-to-end runs of the shadow protocol against the timing model.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::thread;

use vicsim_common::{ChipModel, FramePoint};
use vicsim_sim::shadow::{read_frame, write_frame};
use vicsim_sim::{
    EndReason, Evaluator, HookOutcome, MemoryLink, Pin, ShadowFlags, ShadowLink, ShadowState,
    SimConfig, SimError, SimKernel, SimTime, StepHook, TcpLink, TimingModel, TraceSink,
    VcdTimescale, VcdTraceSink,
};

fn pal() -> SimConfig {
    SimConfig::new(ChipModel::Mos6569.profile())
}

fn idle(n: usize) -> Vec<ShadowState> {
    vec![ShadowState::default(); n]
}

/// Records the raster coordinate of every pixel-dot rising edge and the time
/// of every settle.
#[derive(Default)]
struct DotRecorder {
    last_dot: bool,
    rises: Vec<FramePoint>,
    settles: Vec<SimTime>,
}

impl StepHook for DotRecorder {
    fn after_settle(&mut self, eval: &dyn Evaluator, now: SimTime) -> HookOutcome {
        self.settles.push(now);
        let dot = eval.read_pin(Pin::ClkDot) != 0;
        if dot && !self.last_dot {
            self.rises.push(FramePoint {
                raster_x: eval.read_pin(Pin::RasterX),
                raster_line: eval.read_pin(Pin::RasterLine),
            });
        }
        self.last_dot = dot;
        HookOutcome::Continue
    }
}

/// Wraps the timing model and records the inputs driven before each settle.
struct RecordingModel {
    inner: TimingModel,
    pending: Vec<(Pin, u16)>,
    batches: Vec<Vec<(Pin, u16)>>,
}

impl RecordingModel {
    fn new(inner: TimingModel) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            batches: Vec::new(),
        }
    }
}

impl Evaluator for RecordingModel {
    fn set_input(&mut self, pin: Pin, value: u16) {
        self.pending.push((pin, value));
        self.inner.set_input(pin, value);
    }

    fn read_pin(&self, pin: Pin) -> u16 {
        self.inner.read_pin(pin)
    }

    fn settle(&mut self) {
        self.batches.push(std::mem::take(&mut self.pending));
        self.inner.settle();
    }
}

#[test]
fn realign_delivers_the_requested_dot() {
    let profile = ChipModel::Mos6569.profile();
    let xpos = profile.xpos_at(96);
    let mut states = vec![ShadowState::sync_to(12, 100, xpos)];
    states.extend(idle(1));
    let mut link = MemoryLink::new(states);
    let mut hook = DotRecorder::default();

    let config = pal();
    let mut kernel = SimKernel::new(TimingModel::new(profile), config).unwrap();
    kernel.set_shadow(&mut link);
    kernel.set_hook(&mut hook);
    let summary = kernel.run().unwrap();
    drop(kernel);

    assert_eq!(summary.end_reason, EndReason::LinkClosed);
    assert_eq!(summary.exchanges, 2);
    assert_eq!(
        hook.rises,
        vec![
            FramePoint {
                raster_x: 96,
                raster_line: 100
            },
            FramePoint {
                raster_x: 97,
                raster_line: 100
            },
        ]
    );
    let first = &link.released()[0];
    assert!(!first.flags.contains(ShadowFlags::SYNC_STATE));
    assert_eq!(first.phi, 0);

    // The first settle after realigning is the target edge itself.
    assert_eq!(summary.steps, 9);
    assert_eq!(hook.settles.len(), 9);
    assert!(hook.settles.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn one_frame_capture_stops_at_frame_start() {
    let mut first = ShadowState::sync_to(62, 311, 0);
    first.flags.insert(ShadowFlags::CAPTURE_ONE_FRAME | ShadowFlags::CAPTURE_START);
    let mut states = vec![first];
    states.extend(idle(19));
    let mut link = MemoryLink::new(states);
    let mut sink = VcdTraceSink::new(Vec::new(), VcdTimescale::Ps, "6569");

    let config = pal();
    let mut kernel = SimKernel::new(TimingModel::new(config.profile.clone()), config).unwrap();
    kernel.set_shadow(&mut link);
    kernel.set_trace(&mut sink);
    let summary = kernel.run().unwrap();
    assert_eq!(kernel.stepper().position(), FramePoint::ORIGIN);
    drop(kernel);

    assert_eq!(summary.end_reason, EndReason::FrameCaptured);
    assert_eq!(summary.exchanges, 9);
    assert!(summary.trace_records >= 9);
    assert_eq!(link.released().len(), 9);
    assert_eq!(link.pending(), 11);
    assert!(!link.is_leased());
    assert_eq!(link.open_close_counts(), (1, 1));
    let last = link.released().last().unwrap();
    assert!(!last.flags.contains(ShadowFlags::CAPTURE_START));
}

#[test]
fn capture_end_wins_when_reached_first() {
    let mut first = ShadowState::sync_to(62, 311, 0);
    first.flags.insert(ShadowFlags::CAPTURE_ONE_FRAME);
    let mut states = vec![first, ShadowState::default()];
    states.push(ShadowState::with_flags(ShadowFlags::CAPTURE_END));
    states.extend(idle(10));
    let mut link = MemoryLink::new(states);

    let summary = vicsim_sim::simulate(
        TimingModel::new(ChipModel::Mos6569.profile()),
        &pal(),
        None,
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap();

    assert_eq!(summary.end_reason, EndReason::ShadowStopped);
    assert_eq!(summary.exchanges, 3);
    let ack = &link.released()[2];
    assert!(ack.flags.contains(ShadowFlags::CAPTURE_END));
}

#[test]
fn capture_end_is_acknowledged() {
    let mut states = idle(2);
    states.push(ShadowState::with_flags(ShadowFlags::CAPTURE_END));
    states.extend(idle(5));
    let mut link = MemoryLink::new(states);

    let summary = vicsim_sim::simulate(
        TimingModel::new(ChipModel::Mos6569.profile()),
        &pal(),
        None,
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap();

    assert_eq!(summary.end_reason, EndReason::ShadowStopped);
    assert_eq!(summary.exchanges, 3);
    assert_eq!(link.released().len(), 3);
    assert_eq!(link.pending(), 5);
    assert!(link.released()[2].flags.contains(ShadowFlags::CAPTURE_END));
    assert_eq!(link.open_close_counts(), (1, 1));
}

#[test]
fn bus_transactions_are_forwarded_whole() {
    let write = ShadowState {
        ce: 0,
        rw: 0,
        addr: 0x20,
        data: 0x0e,
        ..ShadowState::default()
    };
    let read = ShadowState {
        ce: 0,
        rw: 1,
        addr: 0x20,
        ..ShadowState::default()
    };
    let mut link = MemoryLink::new([write, ShadowState::default(), read]);

    let config = pal();
    let model = RecordingModel::new(TimingModel::new(config.profile.clone()));
    let mut kernel = SimKernel::new(model, config).unwrap();
    kernel.set_shadow(&mut link);
    let summary = kernel.run().unwrap();
    let model = kernel.into_evaluator();

    assert_eq!(summary.exchanges, 3);
    assert_eq!(model.inner.register(0x20), Some(0x0e));
    assert_eq!(link.released()[2].data, 0x0e);

    let bus = [Pin::AddrIn, Pin::Ce, Pin::Rw];
    let mut forwarded = 0;
    for batch in &model.batches {
        let order: Vec<Pin> = batch
            .iter()
            .map(|(pin, _)| *pin)
            .filter(|pin| bus.contains(pin) || *pin == Pin::DataIn)
            .collect();
        let control = order.iter().filter(|pin| bus.contains(pin)).count();
        assert!(control == 0 || control == 3, "partial bus update: {order:?}");
        if let Some(data_at) = order.iter().position(|pin| *pin == Pin::DataIn) {
            if control == 3 {
                assert_eq!(data_at, 3, "data driven before control: {order:?}");
            }
        }
        if control == 3 {
            forwarded += 1;
        }
    }
    assert!(forwarded >= 3);
}

#[test]
fn bus_access_with_phi_low_aborts_and_releases() {
    let mut link = MemoryLink::new([ShadowState::with_flags(ShadowFlags::BUS_ACCESS)]);
    let err = vicsim_sim::simulate(
        TimingModel::new(ChipModel::Mos6569.profile()),
        &pal(),
        None,
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap_err();

    assert!(matches!(err, SimError::ConsistencyCheck { .. }));
    assert_eq!(link.released().len(), 1);
    assert_eq!(link.open_close_counts(), (1, 1));
}

#[test]
fn unreachable_target_times_out_and_releases() {
    let mut link = MemoryLink::new([ShadowState::sync_to(70, 10, 0)]);
    let err = vicsim_sim::simulate(
        TimingModel::new(ChipModel::Mos6569.profile()),
        &pal(),
        None,
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SimError::RealignTimeout {
            cycle: 70,
            raster_line: 10,
            ..
        }
    ));
    assert_eq!(link.released().len(), 1);
}

#[test]
fn tcp_reference_drives_a_run() {
    let mut link = TcpLink::bind("127.0.0.1:0").unwrap();
    let addr = link.local_addr().unwrap();

    let reference = thread::spawn(move || {
        let stream = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = BufWriter::new(stream);

        let profile = ChipModel::Mos6567R8.profile();
        write_frame(&mut writer, &ShadowState::sync_to(20, 50, profile.xpos_at(160))).unwrap();
        let synced = read_frame(&mut reader).unwrap().unwrap();
        assert!(!synced.flags.contains(ShadowFlags::SYNC_STATE));

        write_frame(&mut writer, &ShadowState::with_flags(ShadowFlags::CAPTURE_END)).unwrap();
        let ack = read_frame(&mut reader).unwrap().unwrap();
        assert!(ack.flags.contains(ShadowFlags::CAPTURE_END));
    });

    let config = SimConfig::new(ChipModel::Mos6567R8.profile());
    let summary = vicsim_sim::simulate(
        TimingModel::new(config.profile.clone()),
        &config,
        None,
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap();
    reference.join().unwrap();

    assert_eq!(summary.end_reason, EndReason::ShadowStopped);
    assert_eq!(summary.exchanges, 2);
}

#[test]
fn flag_capture_traces_only_flagged_exchanges() {
    let mut states = idle(4);
    states.extend(vec![ShadowState::with_flags(ShadowFlags::CAPTURE_START); 2]);
    let mut link = MemoryLink::new(states);
    let mut sink = VcdTraceSink::new(Vec::new(), VcdTimescale::Ps, "6569");

    let config = pal();
    let summary = vicsim_sim::simulate(
        TimingModel::new(config.profile.clone()),
        &config,
        Some(&mut sink as &mut dyn TraceSink),
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap();
    assert_eq!(summary.exchanges, 6);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let stamps: Vec<u64> = text
        .lines()
        .filter_map(|l| l.strip_prefix('#'))
        .filter_map(|t| t.parse().ok())
        .collect();
    // The header is stamped on the first edge after the fourth exchange.
    let half = 15_859;
    assert_eq!(stamps[0], 4 * 8 * half);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    assert!(stamps.len() > 2);
}

#[test]
fn flag_capture_ignores_a_late_time_window() {
    let states = vec![ShadowState::with_flags(ShadowFlags::CAPTURE_START); 4];
    let mut link = MemoryLink::new(states);
    let mut sink = VcdTraceSink::new(Vec::new(), VcdTimescale::Ps, "6569");

    let config = SimConfig {
        capture_start: SimTime::from_us(10),
        monitor: vec!["phi".into()],
        ..pal()
    };
    let summary = vicsim_sim::simulate(
        TimingModel::new(config.profile.clone()),
        &config,
        Some(&mut sink as &mut dyn TraceSink),
        Some(&mut link as &mut dyn ShadowLink),
    )
    .unwrap();
    assert_eq!(summary.end_reason, EndReason::LinkClosed);
    assert_eq!(summary.exchanges, 4);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let stamps: Vec<u64> = text
        .lines()
        .filter_map(|l| l.strip_prefix('#'))
        .filter_map(|t| t.parse().ok())
        .collect();
    assert_eq!(stamps[0], 0);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    assert!(stamps.iter().all(|&t| t < SimTime::from_us(10).ps));
    assert_eq!(summary.trace_records, stamps.len() as u64 - 1);
}
